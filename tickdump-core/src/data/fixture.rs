//! Scripted page source for tests and offline runs.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use super::records::PageBody;
use super::source::{FetchError, PageSource, RawPage};

/// Serves canned responses keyed by exact path and query.
///
/// Unknown routes answer 404. Every request is logged so tests can assert on
/// the order and number of fetches.
#[derive(Debug, Default)]
pub struct FixtureSource {
    routes: HashMap<String, Route>,
    requests: Mutex<Vec<String>>,
}

#[derive(Debug, Clone)]
enum Route {
    Page(RawPage),
    Unreachable(String),
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a canned response.
    pub fn route(mut self, path_and_query: impl Into<String>, page: RawPage) -> Self {
        self.insert(path_and_query, page);
        self
    }

    /// Make a route fail as if the host were unreachable.
    pub fn unreachable(
        mut self,
        path_and_query: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        self.routes
            .insert(path_and_query.into(), Route::Unreachable(reason.into()));
        self
    }

    pub fn insert(&mut self, path_and_query: impl Into<String>, page: RawPage) {
        self.routes.insert(path_and_query.into(), Route::Page(page));
    }

    /// Paths requested so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// A 200 page whose body is `{"results": [...], "next_url": ...}`.
    pub fn json_page<T: Serialize>(records: &[T], next_url: Option<&str>) -> RawPage {
        let body = PageBody::new(records.iter().collect::<Vec<&T>>(), next_url.map(str::to_string));
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        RawPage::ok(bytes).with_header("content-type", "application/json")
    }
}

impl PageSource for FixtureSource {
    fn name(&self) -> &str {
        "fixture"
    }

    fn get(&self, path_and_query: &str) -> Result<RawPage, FetchError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path_and_query.to_string());

        match self.routes.get(path_and_query) {
            Some(Route::Page(page)) => Ok(page.clone()),
            Some(Route::Unreachable(reason)) => Err(FetchError::Network {
                url: path_and_query.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(RawPage::with_status(
                404,
                format!("{{\"status\":\"NOT_FOUND\",\"message\":\"no fixture for {path_and_query}\"}}"),
            )),
        }
    }
}
