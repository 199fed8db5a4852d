//! Tickdump runner: bounded per-symbol download runs.
//!
//! This crate builds on `tickdump-core` to provide:
//! - TOML download configuration with validation
//! - Per-symbol worker (trades, quotes, merge, sort, archive)
//! - Bounded dispatcher with an abort-or-skip failure policy
//! - Day driver and per-day JSON manifests

pub mod config;
pub mod dispatcher;
pub mod driver;
pub mod manifest;
pub mod worker;

pub use config::{
    ApiConfig, ConfigError, DownloadConfig, DownloadSection, FetchFailurePolicy, SourceKind,
    UniverseConfig,
};
pub use dispatcher::{
    DispatchCounts, DispatchProgress, DispatchSummary, Dispatcher, LogProgress, NoProgress,
    PoolError, SymbolOutcome, SymbolResult,
};
pub use driver::{build_source, DayDriver, DayReport, DriverError, RunSummary};
pub use manifest::{DayManifest, EntryStatus, ManifestEntry, ManifestError, MANIFEST_FILE};
pub use worker::{PageLimits, SymbolReport, SymbolWorker, WorkerError};
