//! Download configuration loaded from TOML.
//!
//! ```toml
//! [api]
//! base_url = "https://api.polygon.io"
//! timeout_secs = 60
//!
//! [download]
//! output_root = "data"
//! days = ["2022-12-23"]
//! concurrency = 50
//! on_fetch_failure = "abort"
//!
//! [universe]
//! market = "stocks"
//! ticker_type = "CS"
//! ```
//!
//! Every field has a default. The API key may come from the file, but the CLI
//! normally supplies it from `POLYGON_API_KEY`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tickdump_core::data::polygon::{DEFAULT_BASE_URL, DEFAULT_TICK_PAGE_LIMIT};
use tickdump_core::data::UniverseFilter;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no API key: set [api].api_key, POLYGON_API_KEY or --api-key")]
    MissingApiKey,

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("{0} page limit must be at least 1")]
    ZeroPageLimit(&'static str),

    #[error("no trading days configured")]
    NoDays,

    #[error("invalid trading day '{day}': {reason}")]
    InvalidDay { day: String, reason: String },

    #[error("invalid value '{value}' for {field}")]
    InvalidValue { field: &'static str, value: String },
}

/// Where pages come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Polygon,
    /// Seeded offline generator.
    Synthetic,
}

/// What a transport failure on one symbol does to the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailurePolicy {
    /// Stop dispatching, drain in-flight symbols, end the run with an error.
    #[default]
    Abort,
    /// Mark the symbol failed and carry on.
    SkipSymbol,
}

impl fmt::Display for FetchFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailurePolicy::Abort => write!(f, "abort"),
            FetchFailurePolicy::SkipSymbol => write!(f, "skip_symbol"),
        }
    }
}

impl FromStr for FetchFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "abort" => Ok(FetchFailurePolicy::Abort),
            "skip_symbol" | "skip" => Ok(FetchFailurePolicy::SkipSymbol),
            _ => Err(ConfigError::InvalidValue {
                field: "on_fetch_failure",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub source: SourceKind,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Seed for the synthetic source.
    pub seed: u64,
    /// Trades and quotes generated per symbol by the synthetic source.
    pub synthetic_events: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Polygon,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 60,
            seed: 1,
            synthetic_events: 2_500,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSection {
    pub output_root: PathBuf,
    /// Trading days as `YYYY-MM-DD`, processed in order.
    pub days: Vec<String>,
    pub concurrency: usize,
    pub trade_page_limit: usize,
    pub quote_page_limit: usize,
    pub on_fetch_failure: FetchFailurePolicy,
}

impl Default for DownloadSection {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("data"),
            days: Vec::new(),
            concurrency: 50,
            trade_page_limit: DEFAULT_TICK_PAGE_LIMIT,
            quote_page_limit: DEFAULT_TICK_PAGE_LIMIT,
            on_fetch_failure: FetchFailurePolicy::Abort,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub market: String,
    pub ticker_type: String,
    pub page_limit: usize,
    /// Fixed symbol list. When non-empty the ticker listing is not queried.
    pub symbols: Vec<String>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        let filter = UniverseFilter::default();
        Self {
            market: filter.market,
            ticker_type: filter.ticker_type,
            page_limit: filter.page_limit,
            symbols: Vec::new(),
        }
    }
}

impl UniverseConfig {
    pub fn filter(&self) -> UniverseFilter {
        UniverseFilter {
            market: self.market.clone(),
            ticker_type: self.ticker_type.clone(),
            page_limit: self.page_limit,
        }
    }
}

/// Complete configuration for a download run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub api: ApiConfig,
    pub download: DownloadSection,
    pub universe: UniverseConfig,
}

impl DownloadConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Configured days, parsed and in configured order.
    pub fn days(&self) -> Result<Vec<NaiveDate>, ConfigError> {
        self.download
            .days
            .iter()
            .map(|day| {
                NaiveDate::parse_from_str(day.trim(), "%Y-%m-%d").map_err(|e| {
                    ConfigError::InvalidDay {
                        day: day.clone(),
                        reason: e.to_string(),
                    }
                })
            })
            .collect()
    }

    /// The API key, if one is configured and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Check the config is runnable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.download.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.download.trade_page_limit == 0 {
            return Err(ConfigError::ZeroPageLimit("trade"));
        }
        if self.download.quote_page_limit == 0 {
            return Err(ConfigError::ZeroPageLimit("quote"));
        }
        if self.universe.page_limit == 0 {
            return Err(ConfigError::ZeroPageLimit("ticker"));
        }
        if self.download.days.is_empty() {
            return Err(ConfigError::NoDays);
        }
        self.days()?;
        if self.api.source == SourceKind::Polygon && self.api_key().is_none() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }
}
