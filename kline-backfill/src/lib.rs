pub mod backfill;
pub mod config;
pub mod data;
pub mod error;
pub mod output;
pub mod runner;

// Re-export commonly used types
pub use backfill::{BackfillConfig, BackfillCursor, BackfillEngine, BackfillSummary, BoundaryPolicy, StopReason};
pub use config::{ConfigError, ConfigOverrides, RunConfig};
pub use data::{ApiError, BinanceClient, Candle, KlineInterval, MarketDataClient, PageRequest};
pub use error::BackfillError;
pub use output::{SeriesWriter, SinkError};
pub use runner::{run, RunSummary};
