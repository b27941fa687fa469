//! CSV series writer.
//!
//! Layout is fixed: `Date,Close,Open,High,Low,Volume`, where `Date` is the
//! candle close time in epoch milliseconds. Values are written verbatim,
//! unquoted, one candle per line.

use std::io::Write;

use csv::{QuoteStyle, Writer, WriterBuilder};

use super::SinkError;
use crate::data::Candle;

/// Header line of every series file.
pub const HEADER: [&str; 6] = ["Date", "Close", "Open", "High", "Low", "Volume"];

/// Appends candle rows to a sink after a single header line.
pub struct SeriesWriter<W: Write> {
    inner: Writer<W>,
    header_written: bool,
    rows_written: u64,
}

impl<W: Write> SeriesWriter<W> {
    pub fn new(sink: W) -> Self {
        let inner = WriterBuilder::new()
            .has_headers(false)
            .quote_style(QuoteStyle::Never)
            .from_writer(sink);
        Self {
            inner,
            header_written: false,
            rows_written: 0,
        }
    }

    /// Write the header. Must be called exactly once, before any row.
    pub fn write_header(&mut self) -> Result<(), SinkError> {
        if self.header_written {
            return Err(SinkError::HeaderAlreadyWritten);
        }
        self.inner.write_record(HEADER)?;
        self.inner.flush()?;
        self.header_written = true;
        Ok(())
    }

    /// Append one candle as `close_time,close,open,high,low,volume`.
    pub fn write_row(&mut self, candle: &Candle) -> Result<(), SinkError> {
        if !self.header_written {
            return Err(SinkError::HeaderMissing);
        }
        let date = candle.close_time.to_string();
        self.inner.write_record([
            date.as_str(),
            candle.close.as_str(),
            candle.open.as_str(),
            candle.high.as_str(),
            candle.low.as_str(),
            candle.volume.as_str(),
        ])?;
        self.inner.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flush and hand back the underlying sink.
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.inner
            .into_inner()
            .map_err(|e| SinkError::Io(e.into_error()))
    }
}
