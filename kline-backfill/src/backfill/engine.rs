//! Backfill engine.
//!
//! Walks a kline history backward from "now":
//! 1. Request the page ending at the cursor bound
//! 2. Emit it newest-first (subject to the boundary policy)
//! 3. Move the bound to the page's oldest candle
//! 4. Stop once a page's newest candle is older than the start time
//!
//! Because every page is emitted in reverse and pages are requested in
//! descending time order, the whole output is newest-first.

use std::io::Write;

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data::{ApiError, Candle, KlineInterval, MarketDataClient, PageRequest, MAX_KLINES_PER_REQUEST};
use crate::error::BackfillError;
use crate::output::SeriesWriter;

use super::cursor::BackfillCursor;

/// What to do with the candle shared by two consecutive pages.
///
/// Page bounds are inclusive, so the oldest candle of one page normally
/// comes back as the newest candle of the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPolicy {
    /// Emit every candle the API returns, seam duplicates included.
    #[default]
    Keep,
    /// Skip candles that are not strictly older than the last one emitted.
    Dedup,
}

/// Configuration for a single backfill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillConfig {
    /// Trading pair, e.g. "BTCUSDT".
    pub symbol: String,

    /// Candle interval.
    pub interval: KlineInterval,

    /// Oldest close time the run must reach, epoch milliseconds.
    pub start_time: i64,

    /// Candles per page request.
    pub page_limit: u16,

    /// Seam handling.
    #[serde(default)]
    pub boundary: BoundaryPolicy,
}

impl BackfillConfig {
    pub fn new(symbol: impl Into<String>, interval: KlineInterval, start_time: i64) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            start_time,
            page_limit: MAX_KLINES_PER_REQUEST,
            boundary: BoundaryPolicy::default(),
        }
    }
}

/// Why a backfill stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// A page's newest candle was older than the start time.
    ReachedStart,
    /// The exchange had nothing older than the current bound.
    HistoryExhausted,
}

/// Outcome of one loop iteration.
#[derive(Debug, Clone)]
pub struct Step {
    /// Cursor for the next iteration.
    pub cursor: BackfillCursor,
    /// Candles to emit, already newest-first.
    pub batch: Vec<Candle>,
    /// Candles the page contained.
    pub received: usize,
    /// Seam candles dropped by `BoundaryPolicy::Dedup`.
    pub skipped: usize,
}

/// Result of a completed backfill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillSummary {
    pub pages: usize,
    pub rows_written: usize,
    pub duplicates_skipped: usize,
    pub newest_close_time: Option<i64>,
    pub oldest_close_time: Option<i64>,
    pub stop: StopReason,
}

/// Pulls pages from a market-data client and pushes rows to a series writer.
pub struct BackfillEngine<'a, C: MarketDataClient + ?Sized> {
    client: &'a C,
    config: BackfillConfig,
    progress: ProgressBar,
}

impl<'a, C: MarketDataClient + ?Sized> BackfillEngine<'a, C> {
    pub fn new(client: &'a C, config: BackfillConfig) -> Self {
        Self {
            client,
            config,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report page and row counts on the given progress bar.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &BackfillConfig {
        &self.config
    }

    fn page_request(&self, end_time: i64) -> PageRequest {
        PageRequest {
            symbol: self.config.symbol.clone(),
            interval: self.config.interval,
            end_time,
            limit: self.config.page_limit,
        }
    }

    /// Fetch the page ending at `cursor.end_time` and order it for output.
    pub async fn step(&self, cursor: BackfillCursor) -> Result<Step, ApiError> {
        let request = self.page_request(cursor.end_time);
        info!(
            from = %format_ms(request.end_time),
            to = %format_ms(request.window_start()),
            "processing..."
        );

        let page = self.client.fetch_page(&request).await?;
        let next = cursor.advance(&page, self.config.start_time)?;
        let received = page.len();

        let batch: Vec<Candle> = match self.config.boundary {
            BoundaryPolicy::Keep => page.into_iter().rev().collect(),
            // Past the first page, the bound is the oldest candle already
            // written, so anything at or above it has been emitted before.
            BoundaryPolicy::Dedup if cursor.pages > 0 => page
                .into_iter()
                .rev()
                .filter(|c| c.close_time < cursor.end_time)
                .collect(),
            BoundaryPolicy::Dedup => page.into_iter().rev().collect(),
        };

        Ok(Step {
            cursor: next,
            skipped: received - batch.len(),
            received,
            batch,
        })
    }

    /// Backfill from `now` back past the configured start time, writing every
    /// emitted candle to `writer`. The writer's header must already be written.
    pub async fn run<W: Write>(
        &self,
        now: i64,
        writer: &mut SeriesWriter<W>,
    ) -> Result<BackfillSummary, BackfillError> {
        let mut cursor = BackfillCursor::new(now);
        let mut summary = BackfillSummary {
            pages: 0,
            rows_written: 0,
            duplicates_skipped: 0,
            newest_close_time: None,
            oldest_close_time: None,
            stop: StopReason::ReachedStart,
        };

        loop {
            let step = self.step(cursor).await?;

            for candle in &step.batch {
                writer.write_row(candle)?;
            }

            summary.pages += 1;
            summary.rows_written += step.batch.len();
            summary.duplicates_skipped += step.skipped;
            if let (Some(first), Some(last)) = (step.batch.first(), step.batch.last()) {
                summary.newest_close_time.get_or_insert(first.close_time);
                summary.oldest_close_time = Some(last.close_time);
            }

            self.progress.inc(1);
            self.progress.set_message(format!(
                "{} pages, {} rows, back to {}",
                summary.pages,
                summary.rows_written,
                format_ms(step.cursor.end_time)
            ));

            if step.cursor.done {
                break;
            }

            if cursor.is_stalled_by(&step.cursor) {
                warn!(
                    end_time = %format_ms(step.cursor.end_time),
                    start_time = %format_ms(self.config.start_time),
                    "no older candles available before start time"
                );
                summary.stop = StopReason::HistoryExhausted;
                break;
            }

            cursor = step.cursor;
        }

        info!(
            pages = summary.pages,
            rows = summary.rows_written,
            skipped = summary.duplicates_skipped,
            stop = ?summary.stop,
            "backfill complete"
        );

        Ok(summary)
    }
}

/// Render epoch milliseconds as RFC 3339, falling back to the raw number.
pub fn format_ms(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::client::stub::{hourly_page, StubClient};
    use crate::data::HOUR_MS;
    use crate::output::SinkError;

    const T: i64 = 500_000;

    fn config(start_h: i64, boundary: BoundaryPolicy) -> BackfillConfig {
        BackfillConfig {
            boundary,
            ..BackfillConfig::new("BTCUSDT", KlineInterval::OneHour, start_h * HOUR_MS)
        }
    }

    fn scenario_client() -> StubClient {
        StubClient::with_pages(vec![
            hourly_page(T - 1000, T),
            hourly_page(T - 2000, T - 1000),
            hourly_page(T - 3000, T - 2000),
            hourly_page(T - 4000, T - 3000),
        ])
    }

    fn header_written() -> SeriesWriter<Vec<u8>> {
        let mut writer = SeriesWriter::new(Vec::new());
        writer.write_header().unwrap();
        writer
    }

    fn close_times(writer: SeriesWriter<Vec<u8>>) -> Vec<i64> {
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        out.lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap().parse().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_scenario_walks_back_until_start_is_passed() {
        let client = scenario_client();
        let engine = BackfillEngine::new(&client, config(T - 2500, BoundaryPolicy::Keep));
        let mut writer = header_written();

        let summary = engine.run(T * HOUR_MS, &mut writer).await.unwrap();

        assert_eq!(
            client.end_times(),
            vec![
                T * HOUR_MS,
                (T - 1000) * HOUR_MS,
                (T - 2000) * HOUR_MS,
                (T - 3000) * HOUR_MS
            ]
        );
        assert_eq!(summary.pages, 4);
        assert_eq!(summary.rows_written, 4 * 1001);
        assert_eq!(summary.duplicates_skipped, 0);
        assert_eq!(summary.stop, StopReason::ReachedStart);
        assert_eq!(summary.newest_close_time, Some(T * HOUR_MS));
        assert_eq!(summary.oldest_close_time, Some((T - 4000) * HOUR_MS));

        let times = close_times(writer);
        assert_eq!(times.first(), Some(&(T * HOUR_MS)));
        assert_eq!(times.last(), Some(&((T - 4000) * HOUR_MS)));

        // Non-increasing overall, with exactly one repeat per seam.
        assert!(times.windows(2).all(|w| w[0] >= w[1]));
        let repeats = times.windows(2).filter(|w| w[0] == w[1]).count();
        assert_eq!(repeats, 3);
    }

    #[tokio::test]
    async fn test_requests_carry_symbol_interval_and_limit() {
        let client = scenario_client();
        let engine = BackfillEngine::new(&client, config(T - 2500, BoundaryPolicy::Keep));
        engine.run(T * HOUR_MS, &mut header_written()).await.unwrap();

        for request in client.requests() {
            assert_eq!(request.symbol, "BTCUSDT");
            assert_eq!(request.interval, KlineInterval::OneHour);
            assert_eq!(request.limit, 1000);
        }
    }

    #[tokio::test]
    async fn test_dedup_drops_seam_candles() {
        let client = scenario_client();
        let engine = BackfillEngine::new(&client, config(T - 2500, BoundaryPolicy::Dedup));
        let mut writer = header_written();

        let summary = engine.run(T * HOUR_MS, &mut writer).await.unwrap();

        assert_eq!(summary.pages, 4);
        assert_eq!(summary.duplicates_skipped, 3);
        assert_eq!(summary.rows_written, 4001);

        let times = close_times(writer);
        assert_eq!(times.len(), 4001);
        assert!(times.windows(2).all(|w| w[0] > w[1]));
        assert!(times.windows(2).all(|w| w[0] - w[1] == HOUR_MS));
    }

    #[tokio::test]
    async fn test_dedup_keeps_candle_at_now_on_first_page() {
        let client = StubClient::with_pages(vec![hourly_page(T - 10, T)]);
        let engine = BackfillEngine::new(&client, config(T + 1, BoundaryPolicy::Dedup));
        let mut writer = header_written();

        let summary = engine.run(T * HOUR_MS, &mut writer).await.unwrap();

        assert_eq!(summary.rows_written, 11);
        assert_eq!(close_times(writer)[0], T * HOUR_MS);
    }

    #[tokio::test]
    async fn test_first_page_alone_can_finish() {
        // Start time in the future: the first page is already entirely older.
        let client = scenario_client();
        let engine = BackfillEngine::new(&client, config(T + 720, BoundaryPolicy::Keep));

        let summary = engine.run(T * HOUR_MS, &mut header_written()).await.unwrap();

        assert_eq!(summary.pages, 1);
        assert_eq!(summary.rows_written, 1001);
        assert_eq!(client.end_times(), vec![T * HOUR_MS]);
    }

    #[tokio::test]
    async fn test_does_not_stop_while_newest_is_at_or_after_start() {
        // Start exactly on the newest candle of the second page.
        let client = scenario_client();
        let engine = BackfillEngine::new(&client, config(T - 1000, BoundaryPolicy::Keep));

        let summary = engine.run(T * HOUR_MS, &mut header_written()).await.unwrap();

        assert_eq!(summary.pages, 3);
        assert_eq!(summary.stop, StopReason::ReachedStart);
    }

    #[tokio::test]
    async fn test_empty_page_is_fatal() {
        let client = StubClient::with_pages(vec![hourly_page(T - 1000, T), Vec::new()]);
        let engine = BackfillEngine::new(&client, config(T - 2500, BoundaryPolicy::Keep));
        let mut writer = header_written();

        let err = engine.run(T * HOUR_MS, &mut writer).await.unwrap_err();

        assert!(matches!(
            err,
            BackfillError::Api(ApiError::EmptyPage { end_time }) if end_time == (T - 1000) * HOUR_MS
        ));
        // Rows from the first page stay written.
        assert_eq!(writer.rows_written(), 1001);
    }

    #[tokio::test]
    async fn test_fetch_error_is_fatal_without_retry() {
        let client = StubClient::with_pages(vec![hourly_page(T - 1000, T)]);
        client.push_error(ApiError::InvalidResponse("boom".to_string()));
        let engine = BackfillEngine::new(&client, config(T - 2500, BoundaryPolicy::Keep));

        let err = engine.run(T * HOUR_MS, &mut header_written()).await.unwrap_err();

        assert!(matches!(err, BackfillError::Api(ApiError::InvalidResponse(_))));
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_stops_when_history_is_exhausted() {
        // Pair listed at T-1500: the second page ends at the listing candle and
        // the third request returns only that candle again.
        let client = StubClient::with_pages(vec![
            hourly_page(T - 1000, T),
            hourly_page(T - 1500, T - 1000),
            hourly_page(T - 1500, T - 1500),
        ]);
        let engine = BackfillEngine::new(&client, config(T - 2500, BoundaryPolicy::Keep));

        let summary = engine.run(T * HOUR_MS, &mut header_written()).await.unwrap();

        assert_eq!(summary.stop, StopReason::HistoryExhausted);
        assert_eq!(summary.pages, 3);
        assert_eq!(client.requests().len(), 3);
        assert_eq!(summary.oldest_close_time, Some((T - 1500) * HOUR_MS));
    }

    #[tokio::test]
    async fn test_write_without_header_is_fatal() {
        let client = scenario_client();
        let engine = BackfillEngine::new(&client, config(T - 2500, BoundaryPolicy::Keep));
        let mut writer = SeriesWriter::new(Vec::new());

        let err = engine.run(T * HOUR_MS, &mut writer).await.unwrap_err();
        assert!(matches!(err, BackfillError::Sink(SinkError::HeaderMissing)));
    }

    #[tokio::test]
    async fn test_step_reverses_page() {
        let client = StubClient::with_pages(vec![hourly_page(10, 12)]);
        let engine = BackfillEngine::new(&client, config(0, BoundaryPolicy::Keep));

        let step = engine.step(BackfillCursor::new(12 * HOUR_MS)).await.unwrap();

        let times: Vec<i64> = step.batch.iter().map(|c| c.close_time).collect();
        assert_eq!(times, vec![12 * HOUR_MS, 11 * HOUR_MS, 10 * HOUR_MS]);
        assert_eq!(step.received, 3);
        assert_eq!(step.skipped, 0);
        assert_eq!(step.cursor.end_time, 10 * HOUR_MS);
        assert!(!step.cursor.done);
    }

    #[test]
    fn test_format_ms() {
        assert_eq!(format_ms(0), "1970-01-01T00:00:00+00:00");
    }
}
