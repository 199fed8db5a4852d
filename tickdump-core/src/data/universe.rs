//! Symbol universe for one trading day.
//!
//! The universe is the set of active tickers the reference endpoint lists for
//! the day, filtered by market and security type, in ascending ticker order.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::counter::ErrorCounter;
use super::paginator::Paginator;
use super::polygon::tickers_query;
use super::records::TickerRecord;
use super::source::{FetchError, PageSource};

/// Filter applied to the ticker listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseFilter {
    pub market: String,
    /// Security type code; `CS` is common stock.
    pub ticker_type: String,
    pub page_limit: usize,
}

impl Default for UniverseFilter {
    fn default() -> Self {
        Self {
            market: "stocks".into(),
            ticker_type: "CS".into(),
            page_limit: 1000,
        }
    }
}

/// List the day's symbols in source order.
///
/// Empty tickers are dropped and repeats across pages keep only their first
/// occurrence.
pub fn list_symbols(
    source: &dyn PageSource,
    day: NaiveDate,
    filter: &UniverseFilter,
    errors: &ErrorCounter,
) -> Result<Vec<String>, FetchError> {
    let mut seen = HashSet::new();
    let mut symbols = Vec::new();
    let mut dropped = 0usize;

    let stats = Paginator::<TickerRecord>::new(source, tickers_query(filter, day), errors)
        .for_each_record(|record| {
            let ticker = record.ticker.trim();
            if ticker.is_empty() || !seen.insert(ticker.to_string()) {
                dropped += 1;
                return;
            }
            symbols.push(ticker.to_string());
        })?;

    if dropped > 0 {
        warn!(%day, dropped, "ignored empty or repeated tickers in listing");
    }
    info!(
        %day,
        source = source.name(),
        symbols = symbols.len(),
        pages = stats.pages,
        "universe listed"
    );
    Ok(symbols)
}
