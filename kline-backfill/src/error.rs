//! Top-level failure type of a backfill run.
//!
//! Every failure is fatal: nothing is retried and nothing already written is
//! rolled back. The binary is the only place that turns one into an exit.

use thiserror::Error;

use crate::config::ConfigError;
use crate::data::ApiError;
use crate::output::SinkError;

#[derive(Error, Debug)]
pub enum BackfillError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("output error: {0}")]
    Sink(#[from] SinkError),

    #[error("market data error: {0}")]
    Api(#[from] ApiError),
}
