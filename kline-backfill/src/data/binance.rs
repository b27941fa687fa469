//! Binance spot REST client for historical klines.
//!
//! API Constraints:
//! - Row limit: 1,000 klines per request
//! - `endTime` is inclusive: a kline closing exactly at `endTime` is returned
//! - Decimal fields are JSON strings and are passed through untouched

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::client::{ApiError, MarketDataClient};
use super::types::{Candle, PageRequest};

/// Binance spot API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Maximum klines per API request.
pub const MAX_KLINES_PER_REQUEST: u16 = 1000;

const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// Raw kline row as returned by `/api/v3/klines`.
///
/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume,
///   trades, takerBuyBase, takerBuyQuote, ignore]`
#[derive(Debug, Clone, Deserialize)]
pub struct RawKline(
    pub i64,    // open time
    pub String, // open
    pub String, // high
    pub String, // low
    pub String, // close
    pub String, // volume
    pub i64,    // close time
    pub String, // quote asset volume
    pub u64,    // number of trades
    pub String, // taker buy base volume
    pub String, // taker buy quote volume
    pub String, // ignore
);

impl From<RawKline> for Candle {
    fn from(raw: RawKline) -> Self {
        Candle {
            close_time: raw.6,
            open: raw.1,
            high: raw.2,
            low: raw.3,
            close: raw.4,
            volume: raw.5,
        }
    }
}

/// Decode a klines response body into candles, preserving API order.
pub fn parse_klines(body: &str) -> Result<Vec<Candle>, ApiError> {
    let rows: Vec<RawKline> = serde_json::from_str(body)
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse klines: {}", e)))?;
    Ok(rows.into_iter().map(Candle::from).collect())
}

/// Binance market-data client.
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl BinanceClient {
    /// Create a client against the given base URL.
    pub fn new(api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET helper returning the raw body of a successful response.
    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<String, ApiError> {
        let url = self.endpoint(path);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl MarketDataClient for BinanceClient {
    async fn ping(&self) -> Result<(), ApiError> {
        self.get("/api/v3/ping", &[]).await?;
        Ok(())
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<Candle>, ApiError> {
        let params = [
            ("symbol", request.symbol.clone()),
            ("interval", request.interval.as_str().to_string()),
            ("endTime", request.end_time.to_string()),
            ("limit", request.limit.to_string()),
        ];
        let body = self.get("/api/v3/klines", &params).await?;
        let candles = parse_klines(&body)?;
        debug!(
            symbol = %request.symbol,
            end_time = request.end_time,
            rows = candles.len(),
            "fetched klines page"
        );
        Ok(candles)
    }
}
