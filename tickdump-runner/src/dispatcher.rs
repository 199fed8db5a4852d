//! Bounded per-day dispatch of symbol workers.
//!
//! Symbols run on a private rayon pool whose thread count is the concurrency
//! ceiling, so at most that many workers execute at once. Work is queued FIFO
//! and `dispatch` returns only after every queued symbol has finished or been
//! skipped, which is the end-of-day barrier.
//!
//! Under the abort policy the first transport failure raises a flag. Workers
//! already running finish normally; symbols still queued are skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::FetchFailurePolicy;
use crate::worker::{SymbolReport, WorkerError};

#[derive(Debug, Error)]
#[error("failed to build worker pool: {0}")]
pub struct PoolError(#[from] rayon::ThreadPoolBuildError);

/// Progress callback for a day's dispatch. Called from worker threads.
pub trait DispatchProgress: Send + Sync {
    /// Called when a worker picks up a symbol.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called when a symbol finishes, successfully or not.
    fn on_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: &Result<SymbolReport, WorkerError>,
    );

    /// Called once every symbol has finished or been skipped.
    fn on_batch_complete(&self, summary: &DispatchSummary);
}

/// Progress reporter that writes to the tracing log.
pub struct LogProgress;

impl DispatchProgress for LogProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        info!(symbol, "[{}/{}] fetching", index + 1, total);
    }

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: &Result<SymbolReport, WorkerError>,
    ) {
        if let Err(e) = result {
            error!(symbol, "symbol failed: {e}");
        }
    }

    fn on_batch_complete(&self, summary: &DispatchSummary) {
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            total = summary.total,
            "dispatch complete"
        );
    }
}

/// Progress reporter that does nothing.
pub struct NoProgress;

impl DispatchProgress for NoProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {}

    fn on_complete(
        &self,
        _symbol: &str,
        _index: usize,
        _total: usize,
        _result: &Result<SymbolReport, WorkerError>,
    ) {
    }

    fn on_batch_complete(&self, _summary: &DispatchSummary) {}
}

/// How one symbol ended.
#[derive(Debug)]
pub enum SymbolOutcome {
    Written(SymbolReport),
    Failed(WorkerError),
    /// Never started because the run was aborting.
    Skipped,
}

#[derive(Debug)]
pub struct SymbolResult {
    pub symbol: String,
    pub outcome: SymbolOutcome,
}

/// Results of one dispatch, in the order symbols were queued.
#[derive(Debug, Default)]
pub struct DispatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// A transport failure stopped the dispatch under the abort policy.
    pub aborted: bool,
    pub results: Vec<SymbolResult>,
}

/// Counts only, for logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl DispatchSummary {
    pub fn counts(&self) -> DispatchCounts {
        DispatchCounts {
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
            skipped: self.skipped,
        }
    }

    /// The failure that triggered an abort, if any.
    pub fn abort_cause(&self) -> Option<&WorkerError> {
        if !self.aborted {
            return None;
        }
        self.results.iter().find_map(|r| match &r.outcome {
            SymbolOutcome::Failed(e) if e.is_transport() => Some(e),
            _ => None,
        })
    }
}

/// Runs symbols with at most `concurrency` in flight.
pub struct Dispatcher {
    pool: rayon::ThreadPool,
    concurrency: usize,
    policy: FetchFailurePolicy,
}

impl Dispatcher {
    pub fn new(concurrency: usize, policy: FetchFailurePolicy) -> Result<Self, PoolError> {
        let concurrency = concurrency.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("tickdump-worker-{i}"))
            .build()?;
        Ok(Self {
            pool,
            concurrency,
            policy,
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn policy(&self) -> FetchFailurePolicy {
        self.policy
    }

    /// Run `work` for every symbol and wait for all of them.
    pub fn dispatch<F>(
        &self,
        symbols: &[String],
        progress: &dyn DispatchProgress,
        work: F,
    ) -> DispatchSummary
    where
        F: Fn(&str) -> Result<SymbolReport, WorkerError> + Sync,
    {
        let total = symbols.len();
        let abort = AtomicBool::new(false);
        let policy = self.policy;
        let (tx, rx) = mpsc::channel::<(usize, SymbolOutcome)>();

        self.pool.scope_fifo(|scope| {
            for (index, symbol) in symbols.iter().enumerate() {
                let tx = tx.clone();
                let abort = &abort;
                let work = &work;
                scope.spawn_fifo(move |_| {
                    if abort.load(Ordering::SeqCst) {
                        let _ = tx.send((index, SymbolOutcome::Skipped));
                        return;
                    }

                    progress.on_start(symbol, index, total);
                    let result = work(symbol);
                    progress.on_complete(symbol, index, total, &result);

                    let outcome = match result {
                        Ok(report) => SymbolOutcome::Written(report),
                        Err(e) => {
                            if policy == FetchFailurePolicy::Abort
                                && e.is_transport()
                                && !abort.swap(true, Ordering::SeqCst)
                            {
                                warn!(symbol, "aborting: queued symbols will be skipped");
                            }
                            SymbolOutcome::Failed(e)
                        }
                    };
                    let _ = tx.send((index, outcome));
                });
            }
        });
        drop(tx);

        let mut indexed: Vec<(usize, SymbolOutcome)> = rx.into_iter().collect();
        indexed.sort_by_key(|(index, _)| *index);

        let mut summary = DispatchSummary {
            total,
            aborted: abort.load(Ordering::SeqCst),
            ..Default::default()
        };
        for (index, outcome) in indexed {
            match &outcome {
                SymbolOutcome::Written(_) => summary.succeeded += 1,
                SymbolOutcome::Failed(_) => summary.failed += 1,
                SymbolOutcome::Skipped => summary.skipped += 1,
            }
            summary.results.push(SymbolResult {
                symbol: symbols[index].clone(),
                outcome,
            });
        }

        progress.on_batch_complete(&summary);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;
    use tickdump_core::data::{ArchiveInfo, FetchError};

    fn symbols(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("S{i:03}")).collect()
    }

    fn report(symbol: &str) -> SymbolReport {
        SymbolReport {
            symbol: symbol.to_string(),
            trades: 0,
            quotes: 0,
            pages: 2,
            suspected_truncations: 0,
            archive: ArchiveInfo {
                path: format!("{symbol}.msgpack.lz4").into(),
                events: 0,
                bytes: 0,
                checksum: String::new(),
            },
        }
    }

    fn http_500(symbol: &str) -> WorkerError {
        WorkerError::Fetch {
            symbol: symbol.to_string(),
            source: FetchError::Status {
                status: 500,
                url: format!("/v3/trades/{symbol}"),
                body: String::new(),
            },
        }
    }

    #[test]
    fn never_exceeds_concurrency() {
        let dispatcher = Dispatcher::new(3, FetchFailurePolicy::Abort).unwrap();
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let summary = dispatcher.dispatch(&symbols(20), &NoProgress, |symbol| {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            running.fetch_sub(1, Ordering::SeqCst);
            Ok(report(symbol))
        });

        assert_eq!(summary.succeeded, 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn single_slot_runs_symbols_one_at_a_time() {
        let dispatcher = Dispatcher::new(1, FetchFailurePolicy::Abort).unwrap();
        let log = Mutex::new(Vec::new());

        dispatcher.dispatch(&["AAA".to_string(), "BBB".to_string()], &NoProgress, |symbol| {
            log.lock().unwrap().push(format!("start {symbol}"));
            std::thread::sleep(Duration::from_millis(5));
            log.lock().unwrap().push(format!("end {symbol}"));
            Ok(report(symbol))
        });

        assert_eq!(
            log.into_inner().unwrap(),
            vec!["start AAA", "end AAA", "start BBB", "end BBB"]
        );
    }

    #[test]
    fn transport_failure_under_abort_skips_queued_symbols() {
        let dispatcher = Dispatcher::new(1, FetchFailurePolicy::Abort).unwrap();
        let started = Mutex::new(Vec::new());
        let queued = vec!["BAD".to_string(), "AAA".to_string(), "BBB".to_string()];

        let summary = dispatcher.dispatch(&queued, &NoProgress, |symbol| {
            started.lock().unwrap().push(symbol.to_string());
            if symbol == "BAD" {
                Err(http_500(symbol))
            } else {
                Ok(report(symbol))
            }
        });

        assert!(summary.aborted);
        assert_eq!(started.into_inner().unwrap(), vec!["BAD"]);
        assert_eq!((summary.failed, summary.skipped, summary.succeeded), (1, 2, 0));
        assert_eq!(summary.abort_cause().unwrap().symbol(), "BAD");
        assert!(matches!(summary.results[1].outcome, SymbolOutcome::Skipped));
    }

    #[test]
    fn skip_policy_keeps_going() {
        let dispatcher = Dispatcher::new(2, FetchFailurePolicy::SkipSymbol).unwrap();
        let queued = vec!["BAD".to_string(), "AAA".to_string(), "BBB".to_string()];

        let summary = dispatcher.dispatch(&queued, &NoProgress, |symbol| {
            if symbol == "BAD" {
                Err(http_500(symbol))
            } else {
                Ok(report(symbol))
            }
        });

        assert!(!summary.aborted);
        assert!(summary.abort_cause().is_none());
        assert_eq!(summary.counts().succeeded, 2);
        assert_eq!(summary.counts().failed, 1);
    }

    #[test]
    fn non_transport_failure_does_not_abort() {
        let dispatcher = Dispatcher::new(1, FetchFailurePolicy::Abort).unwrap();
        let queued = vec!["AAA".to_string(), "BBB".to_string()];

        let summary = dispatcher.dispatch(&queued, &NoProgress, |symbol| {
            if symbol == "AAA" {
                Err(WorkerError::Fetch {
                    symbol: symbol.to_string(),
                    source: FetchError::Decode {
                        url: "/v3/quotes/AAA".into(),
                        reason: "eof".into(),
                    },
                })
            } else {
                Ok(report(symbol))
            }
        });

        assert!(!summary.aborted);
        assert_eq!((summary.failed, summary.succeeded), (1, 1));
    }

    #[test]
    fn results_keep_queue_order() {
        let dispatcher = Dispatcher::new(4, FetchFailurePolicy::Abort).unwrap();
        let queued = symbols(12);

        let summary = dispatcher.dispatch(&queued, &NoProgress, |symbol| Ok(report(symbol)));

        let order: Vec<&str> = summary.results.iter().map(|r| r.symbol.as_str()).collect();
        let expected: Vec<&str> = queued.iter().map(String::as_str).collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn empty_symbol_list_completes() {
        let dispatcher = Dispatcher::new(2, FetchFailurePolicy::Abort).unwrap();
        let summary = dispatcher.dispatch(&[], &LogProgress, |symbol| Ok(report(symbol)));
        assert_eq!(summary.total, 0);
        assert!(summary.results.is_empty());
    }
}
