//! Binance kline backfill.
//!
//! Downloads the candle history of one pair, newest first, into a CSV file.
//!
//! # Usage
//!
//! ```bash
//! # Credentials (also read from a .env file in the working directory)
//! export BINANCE_API_KEY=your-key
//! export BINANCE_SECRET_KEY=your-secret
//!
//! # Hourly BTCUSDT back to the start of 2024, into out/historical_data.csv
//! kline-backfill --start-time 2024-01-01T00:00:00Z
//!
//! # Another pair and file, dropping the candle repeated at each page seam
//! kline-backfill --symbol ETHUSDT --file-name eth.csv --dedup-boundary
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::error;

use kline_backfill::runner::{run, RunSummary};
use kline_backfill::{BackfillError, BinanceClient, ConfigOverrides, RunConfig};

/// Kline backfill CLI.
#[derive(Parser)]
#[command(name = "kline-backfill")]
#[command(about = "Download the historical candles of a Binance pair into a CSV file")]
#[command(version)]
struct Cli {
    /// Trading pair (env: SYMBOL, default BTCUSDT)
    #[arg(long)]
    symbol: Option<String>,

    /// Kline interval (env: INTERVAL, default 1h)
    #[arg(long)]
    interval: Option<String>,

    /// Oldest time to reach, RFC 3339 (env: START_TIME, default now + 30 days)
    #[arg(long)]
    start_time: Option<String>,

    /// Output file name (env: FILE_NAME, default historical_data.csv)
    #[arg(long)]
    file_name: Option<String>,

    /// Output directory
    #[arg(long, default_value = "out")]
    output_dir: PathBuf,

    /// Candles per request (2-1000)
    #[arg(long, default_value_t = 1000)]
    limit: u16,

    /// Skip the candle shared by consecutive pages
    #[arg(long)]
    dedup_boundary: bool,

    /// API base URL (env: BINANCE_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Hide the progress spinner
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            symbol: self.symbol.clone(),
            interval: self.interval.clone(),
            start_time: self.start_time.clone(),
            file_name: self.file_name.clone(),
            output_dir: Some(self.output_dir.clone()),
            page_limit: Some(self.limit),
            base_url: self.base_url.clone(),
            dedup_boundary: self.dedup_boundary,
        }
    }
}

fn progress_bar(quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

async fn execute(cli: &Cli, progress: ProgressBar) -> Result<RunSummary, BackfillError> {
    let now = Utc::now();
    let config = RunConfig::from_env(&cli.overrides(), now)?;
    let client = BinanceClient::new(config.api_key.clone(), config.base_url.clone());
    run(&config, &client, now, progress).await
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kline_backfill=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let progress = progress_bar(cli.quiet)?;

    match execute(&cli, progress.clone()).await {
        Ok(summary) => {
            println!("Saved {} rows to {}", summary.backfill.rows_written, summary.path.display());
            Ok(())
        }
        Err(e) => {
            progress.abandon();
            error!(error = %e, "backfill aborted");
            Err(e).context("backfill aborted")
        }
    }
}
