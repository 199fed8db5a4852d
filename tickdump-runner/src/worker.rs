//! Per-symbol work unit: fetch trades and quotes, merge, sort, write.
//!
//! A worker owns its event buffer for the duration of one symbol and drops it
//! once the archive is on disk. Nothing it accumulates is shared with other
//! workers; only the page source, the store and the error counter are.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use tickdump_core::data::{
    quotes_query, trades_query, ArchiveError, ArchiveInfo, ArchiveStore, ErrorCounter, FetchError,
    IntoEvent, PageSource, Paginator, QuoteRecord, TradeRecord,
};
use tickdump_core::domain::SymbolArchive;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("{symbol}: {source}")]
    Fetch {
        symbol: String,
        #[source]
        source: FetchError,
    },

    #[error("{symbol}: archive write failed: {source}")]
    Write {
        symbol: String,
        #[source]
        source: ArchiveError,
    },
}

impl WorkerError {
    pub fn symbol(&self) -> &str {
        match self {
            WorkerError::Fetch { symbol, .. } | WorkerError::Write { symbol, .. } => symbol,
        }
    }

    /// True for network and HTTP status failures, the ones subject to the
    /// run's failure policy.
    pub fn is_transport(&self) -> bool {
        matches!(self, WorkerError::Fetch { source, .. } if source.is_transport())
    }
}

/// Page sizes requested from the tick endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub trades: usize,
    pub quotes: usize,
}

/// What one symbol produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolReport {
    pub symbol: String,
    pub trades: usize,
    pub quotes: usize,
    pub pages: usize,
    pub suspected_truncations: usize,
    pub archive: ArchiveInfo,
}

/// Runs the fetch → merge → write sequence for one (symbol, day).
pub struct SymbolWorker<'a> {
    source: &'a dyn PageSource,
    store: &'a ArchiveStore,
    errors: &'a ErrorCounter,
    day: NaiveDate,
    limits: PageLimits,
}

impl<'a> SymbolWorker<'a> {
    pub fn new(
        source: &'a dyn PageSource,
        store: &'a ArchiveStore,
        errors: &'a ErrorCounter,
        day: NaiveDate,
        limits: PageLimits,
    ) -> Self {
        Self {
            source,
            store,
            errors,
            day,
            limits,
        }
    }

    /// Fetch all trades, then all quotes, and write the sorted archive.
    ///
    /// Trades are appended before quotes so that, at equal timestamps, the
    /// stable sort leaves trades first. Any fetch error abandons the symbol
    /// before anything is written.
    pub fn run(&self, symbol: &str) -> Result<SymbolReport, WorkerError> {
        let fetch_err = |source| WorkerError::Fetch {
            symbol: symbol.to_string(),
            source,
        };
        debug!(symbol, day = %self.day, "symbol started");

        let mut events = Vec::new();
        let trade_stats = Paginator::<TradeRecord>::new(
            self.source,
            trades_query(symbol, self.day, self.limits.trades),
            self.errors,
        )
        .for_each_record(|record| events.push(record.into_event(symbol)))
        .map_err(fetch_err)?;

        let quote_stats = Paginator::<QuoteRecord>::new(
            self.source,
            quotes_query(symbol, self.day, self.limits.quotes),
            self.errors,
        )
        .for_each_record(|record| events.push(record.into_event(symbol)))
        .map_err(fetch_err)?;

        let archive = SymbolArchive::from_appended(symbol, self.day, events);
        let info = self.store.write(&archive).map_err(|source| WorkerError::Write {
            symbol: symbol.to_string(),
            source,
        })?;

        let suspected_truncations =
            trade_stats.suspected_truncations + quote_stats.suspected_truncations;
        if suspected_truncations > 0 {
            warn!(
                symbol,
                day = %self.day,
                suspected_truncations,
                "archive may be missing events"
            );
        }
        info!(
            symbol,
            day = %self.day,
            trades = trade_stats.records,
            quotes = quote_stats.records,
            bytes = info.bytes,
            "archive written"
        );

        Ok(SymbolReport {
            symbol: symbol.to_string(),
            trades: trade_stats.records,
            quotes: quote_stats.records,
            pages: trade_stats.pages + quote_stats.pages,
            suspected_truncations,
            archive: info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickdump_core::data::{FixtureSource, RawPage};
    use tickdump_core::domain::EventKind;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 12, 23).unwrap()
    }

    const LIMITS: PageLimits = PageLimits {
        trades: 2,
        quotes: 2,
    };

    fn trade(t: i64, price: f64) -> TradeRecord {
        TradeRecord {
            sip_timestamp: t,
            price,
            size: 100,
            ..Default::default()
        }
    }

    fn quote(t: i64, bid: f64) -> QuoteRecord {
        QuoteRecord {
            sip_timestamp: t,
            bid_price: bid,
            ..Default::default()
        }
    }

    #[test]
    fn writes_merged_archive_across_pages() {
        let trades_path = trades_query("AAA", day(), 2).path_and_query;
        let quotes_path = quotes_query("AAA", day(), 2).path_and_query;
        let source = FixtureSource::new()
            .route(
                trades_path,
                FixtureSource::json_page(
                    &[trade(1000, 10.0), trade(1000, 11.0)],
                    Some("https://api.polygon.io/v3/trades/AAA?cursor=t2"),
                ),
            )
            .route(
                "/v3/trades/AAA?cursor=t2",
                FixtureSource::json_page(&[trade(1500, 12.0)], None),
            )
            .route(quotes_path, FixtureSource::json_page(&[quote(999, 9.0)], None));
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        let errors = ErrorCounter::new();

        let report = SymbolWorker::new(&source, &store, &errors, day(), LIMITS)
            .run("AAA")
            .unwrap();

        assert_eq!(report.trades, 3);
        assert_eq!(report.quotes, 1);
        assert_eq!(report.pages, 3);
        assert_eq!(report.suspected_truncations, 0);

        let archive = store.load("AAA", day()).unwrap();
        let kinds: Vec<EventKind> = archive.events().iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Quote,
                EventKind::Trade,
                EventKind::Trade,
                EventKind::Trade
            ]
        );
        assert_eq!(archive.events()[1].as_trade().unwrap().price, 10.0);
    }

    #[test]
    fn trade_failure_skips_quotes_and_writes_nothing() {
        let source = FixtureSource::new().route(
            trades_query("BAD", day(), 2).path_and_query,
            RawPage::with_status(500, "boom"),
        );
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        let errors = ErrorCounter::new();

        let err = SymbolWorker::new(&source, &store, &errors, day(), LIMITS)
            .run("BAD")
            .unwrap_err();

        assert!(err.is_transport());
        assert_eq!(err.symbol(), "BAD");
        assert_eq!(source.fetch_count(), 1);
        assert_eq!(errors.count(), 1);
        assert!(!store.archive_path("BAD", day()).exists());
    }

    #[test]
    fn malformed_quote_page_fails_symbol_without_transport_flag() {
        let source = FixtureSource::new()
            .route(
                trades_query("AAA", day(), 2).path_and_query,
                FixtureSource::json_page(&[trade(1, 1.0)], None),
            )
            .route(
                quotes_query("AAA", day(), 2).path_and_query,
                RawPage::ok("{\"results\": 7}"),
            );
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        let errors = ErrorCounter::new();

        let err = SymbolWorker::new(&source, &store, &errors, day(), LIMITS)
            .run("AAA")
            .unwrap_err();

        assert!(!err.is_transport());
        assert!(!store.archive_path("AAA", day()).exists());
    }

    #[test]
    fn full_last_page_is_reported_as_truncation() {
        let source = FixtureSource::new()
            .route(
                trades_query("AAA", day(), 2).path_and_query,
                FixtureSource::json_page(&[trade(1, 1.0), trade(2, 1.0)], None),
            )
            .route(
                quotes_query("AAA", day(), 2).path_and_query,
                FixtureSource::json_page::<QuoteRecord>(&[], None),
            );
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        let errors = ErrorCounter::new();

        let report = SymbolWorker::new(&source, &store, &errors, day(), LIMITS)
            .run("AAA")
            .unwrap();
        assert_eq!(report.suspected_truncations, 1);
        assert_eq!(source.fetch_count(), 2);
    }
}
