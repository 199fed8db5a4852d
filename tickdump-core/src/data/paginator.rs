//! Cursor-following traversal of one listing query.
//!
//! A `Paginator` is a lazy, finite, non-restartable iterator over the pages of
//! one query. It stops after the first page without a cursor, or right after
//! yielding an error. The same traversal serves the ticker universe, trades and
//! quotes; only the record type differs.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};
use url::Url;

use super::counter::ErrorCounter;
use super::records::PageBody;
use super::source::{FetchError, PageSource};

/// Which listing a query targets. Used for log context only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Tickers,
    Trades,
    Quotes,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKind::Tickers => write!(f, "tickers"),
            QueryKind::Trades => write!(f, "trades"),
            QueryKind::Quotes => write!(f, "quotes"),
        }
    }
}

/// Description of the first page of a traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub kind: QueryKind,
    /// Symbol or day the query is about, for diagnostics.
    pub context: String,
    /// Path and query string of the first page, without credentials.
    pub path_and_query: String,
    /// Page size requested from the source.
    pub limit: usize,
}

impl PageQuery {
    pub fn new(
        kind: QueryKind,
        context: impl Into<String>,
        path_and_query: impl Into<String>,
        limit: usize,
    ) -> Self {
        Self {
            kind,
            context: context.into(),
            path_and_query: path_and_query.into(),
            limit: limit.max(1),
        }
    }
}

/// One decoded page.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Zero-based position of the page in the traversal.
    pub index: usize,
    pub records: Vec<T>,
    pub request_id: Option<String>,
    /// The page was full but carried no cursor. Treated as the final page.
    pub suspected_truncation: bool,
}

/// Totals for a completed traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    pub pages: usize,
    pub records: usize,
    pub suspected_truncations: usize,
}

/// Iterator over the pages of one query.
pub struct Paginator<'a, T> {
    source: &'a dyn PageSource,
    query: PageQuery,
    errors: &'a ErrorCounter,
    next: Option<String>,
    fetches: usize,
    _records: PhantomData<fn() -> T>,
}

impl<'a, T: DeserializeOwned> Paginator<'a, T> {
    pub fn new(source: &'a dyn PageSource, query: PageQuery, errors: &'a ErrorCounter) -> Self {
        let first = query.path_and_query.clone();
        Self {
            source,
            query,
            errors,
            next: Some(first),
            fetches: 0,
            _records: PhantomData,
        }
    }

    /// Drain the traversal, handing every record to `sink` in page order.
    ///
    /// Stops at the first error.
    pub fn for_each_record(
        mut self,
        mut sink: impl FnMut(T),
    ) -> Result<TraversalStats, FetchError> {
        let mut stats = TraversalStats::default();
        while let Some(page) = self.next() {
            let page = page?;
            stats.pages += 1;
            stats.records += page.records.len();
            if page.suspected_truncation {
                stats.suspected_truncations += 1;
            }
            page.records.into_iter().for_each(&mut sink);
        }
        Ok(stats)
    }

    fn fetch_page(&mut self, path: String) -> Result<Page<T>, FetchError> {
        let index = self.fetches;
        self.fetches += 1;

        let raw = match self.source.get(&path) {
            Ok(raw) => raw,
            Err(err) => {
                let total = self.errors.record();
                error!(
                    kind = %self.query.kind,
                    context = %self.query.context,
                    url = %path,
                    error_count = total,
                    "page request failed: {err}"
                );
                return Err(err);
            }
        };

        if !raw.is_success() {
            let total = self.errors.record();
            error!(
                kind = %self.query.kind,
                context = %self.query.context,
                status = raw.status,
                url = %path,
                body = %raw.body_preview(),
                headers = %raw.header_dump(),
                error_count = total,
                "non-success response"
            );
            return Err(FetchError::Status {
                status: raw.status,
                url: path,
                body: raw.body_preview(),
            });
        }

        let body: PageBody<T> = match serde_json::from_slice(&raw.body) {
            Ok(body) => body,
            Err(err) => {
                let total = self.errors.record();
                warn!(
                    kind = %self.query.kind,
                    context = %self.query.context,
                    url = %path,
                    error_count = total,
                    "page body did not decode: {err}"
                );
                return Err(FetchError::Decode {
                    url: path,
                    reason: err.to_string(),
                });
            }
        };

        let records = body.results.unwrap_or_default();
        let mut suspected_truncation = false;
        match body.next_url.filter(|next| !next.is_empty()) {
            Some(next) => match cursor_request_uri(&next) {
                Ok(uri) => self.next = Some(uri),
                Err(err) => {
                    let total = self.errors.record();
                    warn!(
                        kind = %self.query.kind,
                        context = %self.query.context,
                        url = %path,
                        error_count = total,
                        "{err}"
                    );
                    return Err(err);
                }
            },
            None if records.len() == self.query.limit => {
                suspected_truncation = true;
                warn!(
                    kind = %self.query.kind,
                    context = %self.query.context,
                    url = %path,
                    limit = self.query.limit,
                    request_id = body.request_id.as_deref().unwrap_or("-"),
                    headers = %raw.header_dump(),
                    "full page without a cursor; results may be truncated"
                );
            }
            None => {}
        }

        debug!(
            kind = %self.query.kind,
            context = %self.query.context,
            page = index,
            records = records.len(),
            request_id = body.request_id.as_deref().unwrap_or("-"),
            "page fetched"
        );

        Ok(Page {
            index,
            records,
            request_id: body.request_id,
            suspected_truncation,
        })
    }
}

impl<T: DeserializeOwned> Iterator for Paginator<'_, T> {
    type Item = Result<Page<T>, FetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.next.take()?;
        Some(self.fetch_page(path))
    }
}

/// Reduce a `next_url` to its path and query.
///
/// The source's cursor URLs are absolute and have been seen with a duplicated
/// port (`host:443:443`), which no URL parser accepts, so scheme and authority
/// are cut off as text before anything is parsed. Any `apiKey` parameter is
/// dropped; sources append their own credential.
pub fn cursor_request_uri(next_url: &str) -> Result<String, FetchError> {
    let cursor_err = |reason: String| FetchError::Cursor {
        cursor: next_url.to_string(),
        reason,
    };

    let request_uri = match next_url.split_once("://") {
        Some((_, rest)) => match rest.find(|c: char| c == '/' || c == '?') {
            Some(i) if rest[i..].starts_with('?') => format!("/{}", &rest[i..]),
            Some(i) => rest[i..].to_string(),
            None => "/".to_string(),
        },
        None if next_url.starts_with('/') => next_url.to_string(),
        None => return Err(cursor_err("neither an absolute URL nor a path".into())),
    };

    let url = Url::parse("http://cursor.invalid")
        .and_then(|base| base.join(&request_uri))
        .map_err(|err| cursor_err(err.to_string()))?;

    let mut uri = url.path().to_string();
    let kept: Vec<&str> = url
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|pair| {
            let key = pair.split_once('=').map_or(*pair, |(k, _)| k);
            !pair.is_empty() && !key.eq_ignore_ascii_case("apikey")
        })
        .collect();
    if !kept.is_empty() {
        uri.push('?');
        uri.push_str(&kept.join("&"));
    }
    Ok(uri)
}
