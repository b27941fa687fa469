//! Market-data client abstraction.
//!
//! The backfill engine only needs two calls from an exchange: a
//! connectivity check and a bounded, end-time-addressed page of candles.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{Candle, PageRequest};

/// Market-data API errors.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("API returned an empty page for endTime={end_time}")]
    EmptyPage { end_time: i64 },
}

/// Source of historical candles.
///
/// `fetch_page` returns candles ordered oldest-to-newest, each with
/// `close_time <= request.end_time`.
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    /// Check that the API is reachable.
    async fn ping(&self) -> Result<(), ApiError>;

    /// Fetch at most `request.limit` candles closing at or before `request.end_time`.
    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<Candle>, ApiError>;
}
