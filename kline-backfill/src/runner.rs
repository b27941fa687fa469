//! Run coordinator.
//!
//! Owns the output file for the whole run: checks connectivity, truncates
//! the file, writes the header, and drives the backfill engine into it.
//! Any error aborts the run and leaves the file as it was at that moment.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use tracing::info;

use crate::backfill::{format_ms, BackfillEngine, BackfillSummary};
use crate::config::RunConfig;
use crate::data::MarketDataClient;
use crate::error::BackfillError;
use crate::output::{open_truncated, SeriesWriter, SinkError};

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub path: PathBuf,
    pub backfill: BackfillSummary,
}

/// Execute one backfill run ending at `now`.
pub async fn run<C>(
    config: &RunConfig,
    client: &C,
    now: DateTime<Utc>,
    progress: ProgressBar,
) -> Result<RunSummary, BackfillError>
where
    C: MarketDataClient + ?Sized,
{
    client.ping().await?;

    let path = config.output_path();
    let file = open_truncated(&path)?;
    let mut writer = SeriesWriter::new(file);

    info!(
        symbol = %config.symbol,
        interval = %config.interval,
        start = %format_ms(config.start_time.timestamp_millis()),
        end = %now.to_rfc3339(),
        path = %path.display(),
        "starting..."
    );

    writer.write_header()?;

    let engine = BackfillEngine::new(client, config.backfill_config()).with_progress(progress.clone());
    let backfill = engine.run(now.timestamp_millis(), &mut writer).await?;

    let file = writer.into_inner()?;
    file.sync_all().map_err(SinkError::Io)?;
    progress.finish_with_message(format!("{} rows written", backfill.rows_written));

    info!(path = %path.display(), rows = backfill.rows_written, "file saved");

    Ok(RunSummary { path, backfill })
}
