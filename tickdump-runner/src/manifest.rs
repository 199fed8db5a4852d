//! Per-day manifest written next to the archives.
//!
//! `{root}/{day}/manifest.json` records how every queued symbol ended, with
//! the archive checksum for the ones that were written.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatcher::{DispatchSummary, SymbolOutcome};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest I/O on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest serialization: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Written,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub symbol: String,
    pub status: EntryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default)]
    pub trades: usize,
    #[serde(default)]
    pub quotes: usize,
    #[serde(default)]
    pub pages: usize,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default)]
    pub suspected_truncations: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayManifest {
    pub day: NaiveDate,
    pub source: String,
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub aborted: bool,
    /// Run-wide failed fetch count at the time the day finished.
    pub fetch_error_count: u64,
    pub entries: Vec<ManifestEntry>,
}

impl DayManifest {
    pub fn from_summary(
        day: NaiveDate,
        source: &str,
        summary: &DispatchSummary,
        fetch_error_count: u64,
    ) -> Self {
        let entries = summary
            .results
            .iter()
            .map(|result| match &result.outcome {
                SymbolOutcome::Written(report) => ManifestEntry {
                    symbol: result.symbol.clone(),
                    status: EntryStatus::Written,
                    file: report
                        .archive
                        .path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned()),
                    trades: report.trades,
                    quotes: report.quotes,
                    pages: report.pages,
                    bytes: report.archive.bytes,
                    checksum: Some(report.archive.checksum.clone()),
                    suspected_truncations: report.suspected_truncations,
                    error: None,
                },
                SymbolOutcome::Failed(e) => ManifestEntry {
                    error: Some(e.to_string()),
                    ..ManifestEntry::empty(&result.symbol, EntryStatus::Failed)
                },
                SymbolOutcome::Skipped => {
                    ManifestEntry::empty(&result.symbol, EntryStatus::Skipped)
                }
            })
            .collect();

        Self {
            day,
            source: source.to_string(),
            generated_at: Utc::now(),
            total: summary.total,
            succeeded: summary.succeeded,
            failed: summary.failed,
            skipped: summary.skipped,
            aborted: summary.aborted,
            fetch_error_count,
            entries,
        }
    }

    /// Write `manifest.json` into `day_dir`, via a temporary file.
    pub fn write(&self, day_dir: &Path) -> Result<PathBuf, ManifestError> {
        let path = day_dir.join(MANIFEST_FILE);
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;

        fs::write(&tmp_path, json).map_err(|source| ManifestError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            ManifestError::Io {
                path: path.clone(),
                source,
            }
        })?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl ManifestEntry {
    fn empty(symbol: &str, status: EntryStatus) -> Self {
        Self {
            symbol: symbol.to_string(),
            status,
            file: None,
            trades: 0,
            quotes: 0,
            pages: 0,
            bytes: 0,
            checksum: None,
            suspected_truncations: 0,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::SymbolResult;
    use crate::worker::{SymbolReport, WorkerError};
    use tickdump_core::data::{ArchiveInfo, FetchError};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 12, 23).unwrap()
    }

    fn summary() -> DispatchSummary {
        DispatchSummary {
            total: 3,
            succeeded: 1,
            failed: 1,
            skipped: 1,
            aborted: true,
            results: vec![
                SymbolResult {
                    symbol: "AAA".into(),
                    outcome: SymbolOutcome::Written(SymbolReport {
                        symbol: "AAA".into(),
                        trades: 2,
                        quotes: 1,
                        pages: 2,
                        suspected_truncations: 0,
                        archive: ArchiveInfo {
                            path: "/out/2022-12-23/AAA-2022-12-23.msgpack.lz4".into(),
                            events: 3,
                            bytes: 120,
                            checksum: "ab12".into(),
                        },
                    }),
                },
                SymbolResult {
                    symbol: "BAD".into(),
                    outcome: SymbolOutcome::Failed(WorkerError::Fetch {
                        symbol: "BAD".into(),
                        source: FetchError::Status {
                            status: 500,
                            url: "/v3/trades/BAD".into(),
                            body: "oops".into(),
                        },
                    }),
                },
                SymbolResult {
                    symbol: "CCC".into(),
                    outcome: SymbolOutcome::Skipped,
                },
            ],
        }
    }

    #[test]
    fn entries_mirror_outcomes() {
        let manifest = DayManifest::from_summary(day(), "fixture", &summary(), 1);

        assert_eq!(manifest.entries.len(), 3);
        let written = &manifest.entries[0];
        assert_eq!(written.status, EntryStatus::Written);
        assert_eq!(written.file.as_deref(), Some("AAA-2022-12-23.msgpack.lz4"));
        assert_eq!(written.checksum.as_deref(), Some("ab12"));
        assert_eq!(written.trades + written.quotes, 3);

        let failed = &manifest.entries[1];
        assert_eq!(failed.status, EntryStatus::Failed);
        assert!(failed.error.as_deref().unwrap().contains("HTTP 500"));

        assert_eq!(manifest.entries[2].status, EntryStatus::Skipped);
        assert!(manifest.aborted);
    }

    #[test]
    fn write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = DayManifest::from_summary(day(), "fixture", &summary(), 1);

        let path = manifest.write(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(MANIFEST_FILE));
        assert!(!dir.path().join("manifest.json.tmp").exists());
        assert_eq!(DayManifest::load(&path).unwrap(), manifest);
    }
}
