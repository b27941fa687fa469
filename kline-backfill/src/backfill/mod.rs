//! Backward-paginated candle backfill.
//!
//! - `cursor`: the inclusive upper bound walked back page by page
//! - `engine`: the fetch / reorder / emit loop and its termination rules

pub mod cursor;
pub mod engine;

pub use cursor::BackfillCursor;
pub use engine::{
    format_ms, BackfillConfig, BackfillEngine, BackfillSummary, BoundaryPolicy, Step, StopReason,
};
