//! Run configuration.
//!
//! Resolved once at startup from command-line overrides and environment
//! variables, then passed by reference to the run coordinator.
//!
//! | Setting    | Env var              | Default                  |
//! |------------|----------------------|--------------------------|
//! | API key    | `BINANCE_API_KEY`    | required                 |
//! | Secret key | `BINANCE_SECRET_KEY` | required                 |
//! | Symbol     | `SYMBOL`             | `BTCUSDT`                |
//! | Interval   | `INTERVAL`           | `1h`                     |
//! | Start time | `START_TIME`         | now + 30 days (RFC 3339) |
//! | File name  | `FILE_NAME`          | `historical_data.csv`    |
//! | Base URL   | `BINANCE_BASE_URL`   | `https://api.binance.com`|

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::backfill::{BackfillConfig, BoundaryPolicy};
use crate::data::{KlineInterval, DEFAULT_BASE_URL, MAX_KLINES_PER_REQUEST};
use crate::output::{output_path, DEFAULT_FILE_NAME, DEFAULT_OUTPUT_DIR};

pub const API_KEY_VAR: &str = "BINANCE_API_KEY";
pub const SECRET_KEY_VAR: &str = "BINANCE_SECRET_KEY";
pub const SYMBOL_VAR: &str = "SYMBOL";
pub const INTERVAL_VAR: &str = "INTERVAL";
pub const START_TIME_VAR: &str = "START_TIME";
pub const FILE_NAME_VAR: &str = "FILE_NAME";
pub const BASE_URL_VAR: &str = "BINANCE_BASE_URL";

pub const DEFAULT_SYMBOL: &str = "BTCUSDT";
pub const DEFAULT_INTERVAL: KlineInterval = KlineInterval::OneHour;

/// Offset from "now" of the default start time, in days.
pub const DEFAULT_START_OFFSET_DAYS: i64 = 30;

/// A single-candle page cannot move the cursor past an inclusive bound.
pub const MIN_PAGE_LIMIT: u16 = 2;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    MissingCredential(&'static str),

    #[error("failed to parse START_TIME {value:?}: {source}")]
    InvalidStartTime {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("unsupported interval {0:?}")]
    InvalidInterval(String),

    #[error("page limit must be between 2 and 1000, got {0}")]
    InvalidPageLimit(u16),

    #[error("symbol must not be empty")]
    EmptySymbol,
}

/// Values given on the command line. `None` falls back to the environment,
/// then to the default.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub symbol: Option<String>,
    pub interval: Option<String>,
    pub start_time: Option<String>,
    pub file_name: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub page_limit: Option<u16>,
    pub base_url: Option<String>,
    pub dedup_boundary: bool,
}

/// Fully resolved settings for one run.
#[derive(Clone)]
pub struct RunConfig {
    pub api_key: String,
    pub secret_key: String,
    pub base_url: String,
    pub symbol: String,
    pub interval: KlineInterval,
    pub start_time: DateTime<Utc>,
    pub output_dir: PathBuf,
    pub file_name: String,
    pub page_limit: u16,
    pub boundary: BoundaryPolicy,
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("api_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("symbol", &self.symbol)
            .field("interval", &self.interval)
            .field("start_time", &self.start_time)
            .field("output_dir", &self.output_dir)
            .field("file_name", &self.file_name)
            .field("page_limit", &self.page_limit)
            .field("boundary", &self.boundary)
            .finish()
    }
}

impl RunConfig {
    /// Resolve from the process environment.
    pub fn from_env(overrides: &ConfigOverrides, now: DateTime<Utc>) -> Result<Self, ConfigError> {
        Self::resolve(overrides, |key| std::env::var(key).ok(), now)
    }

    /// Resolve from overrides and an arbitrary variable lookup.
    pub fn resolve<F>(overrides: &ConfigOverrides, env: F, now: DateTime<Utc>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            env(key)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingCredential(key))
        };
        let api_key = required(API_KEY_VAR)?;
        let secret_key = required(SECRET_KEY_VAR)?;

        let symbol = overrides
            .symbol
            .clone()
            .or_else(|| env(SYMBOL_VAR))
            .unwrap_or_else(|| DEFAULT_SYMBOL.to_string())
            .trim()
            .to_uppercase();
        if symbol.is_empty() {
            return Err(ConfigError::EmptySymbol);
        }

        let interval = match overrides.interval.clone().or_else(|| env(INTERVAL_VAR)) {
            Some(raw) => KlineInterval::from_str(&raw).ok_or(ConfigError::InvalidInterval(raw))?,
            None => DEFAULT_INTERVAL,
        };

        let start_time = match overrides.start_time.clone().or_else(|| env(START_TIME_VAR)) {
            Some(raw) => parse_start_time(&raw)?,
            None => now + Duration::days(DEFAULT_START_OFFSET_DAYS),
        };

        let file_name = overrides
            .file_name
            .clone()
            .or_else(|| env(FILE_NAME_VAR))
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());

        let page_limit = overrides.page_limit.unwrap_or(MAX_KLINES_PER_REQUEST);
        if !(MIN_PAGE_LIMIT..=MAX_KLINES_PER_REQUEST).contains(&page_limit) {
            return Err(ConfigError::InvalidPageLimit(page_limit));
        }

        Ok(Self {
            api_key,
            secret_key,
            base_url: overrides
                .base_url
                .clone()
                .or_else(|| env(BASE_URL_VAR))
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            symbol,
            interval,
            start_time,
            output_dir: overrides
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            file_name,
            page_limit,
            boundary: if overrides.dedup_boundary {
                BoundaryPolicy::Dedup
            } else {
                BoundaryPolicy::Keep
            },
        })
    }

    /// `<output_dir>/<file_name>`.
    pub fn output_path(&self) -> PathBuf {
        output_path(&self.output_dir, &self.file_name)
    }

    pub fn backfill_config(&self) -> BackfillConfig {
        BackfillConfig {
            symbol: self.symbol.clone(),
            interval: self.interval,
            start_time: self.start_time.timestamp_millis(),
            page_limit: self.page_limit,
            boundary: self.boundary,
        }
    }
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_start_time(raw: &str) -> Result<DateTime<Utc>, ConfigError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| ConfigError::InvalidStartTime {
            value: raw.to_string(),
            source,
        })
}
