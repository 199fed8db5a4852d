//! Day-by-day driver.
//!
//! For each configured day, in order: resolve the symbol universe, create the
//! day directory, dispatch one worker per symbol, wait for all of them, then
//! write the day manifest. Days never overlap.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use tickdump_core::data::{
    list_symbols, ArchiveError, ArchiveStore, ErrorCounter, FetchError, PageSource, PolygonSource,
    SyntheticSource, UniverseFilter,
};

use crate::config::{ConfigError, DownloadConfig, FetchFailurePolicy, SourceKind};
use crate::dispatcher::{DispatchCounts, DispatchProgress, Dispatcher, PoolError};
use crate::manifest::{DayManifest, ManifestError};
use crate::worker::{PageLimits, SymbolWorker};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("could not set up page source: {0}")]
    Source(#[source] FetchError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("universe listing for {day} failed: {source}")]
    Universe {
        day: NaiveDate,
        #[source]
        source: FetchError,
    },

    #[error("output directory: {0}")]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("run aborted on {day}: {cause}")]
    Aborted { day: NaiveDate, cause: String },
}

/// How one day went.
#[derive(Debug, Clone, PartialEq)]
pub struct DayReport {
    pub day: NaiveDate,
    pub counts: DispatchCounts,
    /// None when the day was skipped because its universe could not be listed.
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub days: Vec<DayReport>,
    pub error_count: u64,
}

/// Build the page source a config asks for.
pub fn build_source(config: &DownloadConfig) -> Result<Box<dyn PageSource>, DriverError> {
    match config.api.source {
        SourceKind::Polygon => {
            let key = config.api_key().ok_or(ConfigError::MissingApiKey)?;
            let source = PolygonSource::new(&config.api.base_url, key, config.api.timeout())
                .map_err(DriverError::Source)?;
            Ok(Box::new(source))
        }
        SourceKind::Synthetic => {
            let (seed, events) = (config.api.seed, config.api.synthetic_events);
            let source = if config.universe.symbols.is_empty() {
                SyntheticSource::with_default_universe(seed, events)
            } else {
                SyntheticSource::new(seed, config.universe.symbols.clone(), events)
            };
            Ok(Box::new(source))
        }
    }
}

/// Trimmed, non-empty, first occurrence wins.
fn clean_symbols(symbols: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(symbols.len());
    for symbol in symbols.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !out.iter().any(|seen| seen == symbol) {
            out.push(symbol.to_string());
        }
    }
    out
}

pub struct DayDriver {
    source: Box<dyn PageSource>,
    store: ArchiveStore,
    errors: Arc<ErrorCounter>,
    dispatcher: Dispatcher,
    days: Vec<NaiveDate>,
    limits: PageLimits,
    filter: UniverseFilter,
    symbols: Vec<String>,
}

impl DayDriver {
    /// Validate the config and build the source it names.
    pub fn from_config(config: &DownloadConfig) -> Result<Self, DriverError> {
        config.validate()?;
        let source = build_source(config)?;
        Self::with_source(config, source)
    }

    /// Use an already-built source. The config is still validated.
    pub fn with_source(
        config: &DownloadConfig,
        source: Box<dyn PageSource>,
    ) -> Result<Self, DriverError> {
        config.validate()?;
        Ok(Self {
            source,
            store: ArchiveStore::new(&config.download.output_root),
            errors: Arc::new(ErrorCounter::new()),
            dispatcher: Dispatcher::new(
                config.download.concurrency,
                config.download.on_fetch_failure,
            )?,
            days: config.days()?,
            limits: PageLimits {
                trades: config.download.trade_page_limit,
                quotes: config.download.quote_page_limit,
            },
            filter: config.universe.filter(),
            symbols: clean_symbols(&config.universe.symbols),
        })
    }

    /// The run-wide failed fetch counter.
    pub fn errors(&self) -> Arc<ErrorCounter> {
        Arc::clone(&self.errors)
    }

    pub fn store(&self) -> &ArchiveStore {
        &self.store
    }

    /// Process every configured day in order.
    ///
    /// Stops at the first day that fails or aborts; later days are not
    /// attempted.
    pub fn run(&self, progress: &dyn DispatchProgress) -> Result<RunSummary, DriverError> {
        let mut days = Vec::with_capacity(self.days.len());
        for &day in &self.days {
            days.push(self.run_day(day, progress)?);
        }
        Ok(RunSummary {
            days,
            error_count: self.errors.count(),
        })
    }

    /// Download one day. Returns after every symbol has finished.
    pub fn run_day(
        &self,
        day: NaiveDate,
        progress: &dyn DispatchProgress,
    ) -> Result<DayReport, DriverError> {
        let symbols = match self.universe(day) {
            Ok(symbols) => symbols,
            Err(source) => {
                if self.dispatcher.policy() == FetchFailurePolicy::SkipSymbol {
                    warn!(%day, "skipping day, universe unavailable: {source}");
                    return Ok(DayReport {
                        day,
                        counts: DispatchCounts {
                            total: 0,
                            succeeded: 0,
                            failed: 0,
                            skipped: 0,
                        },
                        manifest: None,
                    });
                }
                return Err(DriverError::Universe { day, source });
            }
        };

        let day_dir = self.store.ensure_day_dir(day)?;
        info!(
            %day,
            symbols = symbols.len(),
            concurrency = self.dispatcher.concurrency(),
            source = self.source.name(),
            "day started"
        );

        let worker = SymbolWorker::new(
            self.source.as_ref(),
            &self.store,
            &self.errors,
            day,
            self.limits,
        );
        let summary = self
            .dispatcher
            .dispatch(&symbols, progress, |symbol| worker.run(symbol));

        let manifest =
            DayManifest::from_summary(day, self.source.name(), &summary, self.errors.count());
        let manifest_path = manifest.write(&day_dir)?;
        info!(
            %day,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            error_count = self.errors.count(),
            "day finished"
        );

        if summary.aborted {
            let cause = summary
                .abort_cause()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "transport failure".to_string());
            return Err(DriverError::Aborted { day, cause });
        }

        Ok(DayReport {
            day,
            counts: summary.counts(),
            manifest: Some(manifest_path),
        })
    }

    fn universe(&self, day: NaiveDate) -> Result<Vec<String>, FetchError> {
        if !self.symbols.is_empty() {
            return Ok(self.symbols.clone());
        }
        list_symbols(self.source.as_ref(), day, &self.filter, &self.errors)
    }
}
