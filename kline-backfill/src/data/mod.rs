pub mod binance;
pub mod client;
pub mod types;

pub use binance::{parse_klines, BinanceClient, RawKline, DEFAULT_BASE_URL, MAX_KLINES_PER_REQUEST};
pub use client::{ApiError, MarketDataClient};
pub use types::{Candle, KlineInterval, PageRequest, HOUR_MS};
