//! Backward pagination cursor.
//!
//! Each page request is addressed by an inclusive upper bound. After a page
//! arrives, the next bound is the close time of the oldest candle in it, so
//! the cursor only ever walks backward in time.

use crate::data::{ApiError, Candle};

/// Progress of a backfill between two page requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillCursor {
    /// Upper bound for the next page request, epoch milliseconds.
    pub end_time: i64,
    /// Set once a page's newest candle is older than the start time.
    pub done: bool,
    /// Pages consumed so far.
    pub pages: usize,
}

impl BackfillCursor {
    /// Cursor for a fresh run ending at `now`.
    pub fn new(now: i64) -> Self {
        Self {
            end_time: now,
            done: false,
            pages: 0,
        }
    }

    /// Cursor after consuming `page` (oldest-first).
    ///
    /// An empty page has no boundary candle to move to and is rejected.
    pub fn advance(&self, page: &[Candle], start_time: i64) -> Result<Self, ApiError> {
        let (oldest, newest) = match (page.first(), page.last()) {
            (Some(oldest), Some(newest)) => (oldest, newest),
            _ => {
                return Err(ApiError::EmptyPage {
                    end_time: self.end_time,
                })
            }
        };

        Ok(Self {
            end_time: oldest.close_time,
            done: newest.close_time < start_time,
            pages: self.pages + 1,
        })
    }

    /// True when `next` would request the same (or a later) bound again.
    pub fn is_stalled_by(&self, next: &Self) -> bool {
        next.end_time >= self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::client::stub::hourly_page;
    use crate::data::HOUR_MS;

    #[test]
    fn test_new_cursor() {
        let cursor = BackfillCursor::new(5000 * HOUR_MS);
        assert_eq!(cursor.end_time, 5000 * HOUR_MS);
        assert!(!cursor.done);
        assert_eq!(cursor.pages, 0);
    }

    #[test]
    fn test_advance_moves_to_oldest_candle() {
        let cursor = BackfillCursor::new(5000 * HOUR_MS);
        let next = cursor
            .advance(&hourly_page(4000, 5000), 2500 * HOUR_MS)
            .unwrap();

        assert_eq!(next.end_time, 4000 * HOUR_MS);
        assert!(!next.done);
        assert_eq!(next.pages, 1);
        assert!(!cursor.is_stalled_by(&next));
    }

    #[test]
    fn test_done_only_when_newest_is_older_than_start() {
        let cursor = BackfillCursor::new(3000 * HOUR_MS);

        // Newest candle equal to start: not done yet.
        let at_start = cursor.advance(&hourly_page(2000, 2500), 2500 * HOUR_MS).unwrap();
        assert!(!at_start.done);

        // Oldest before start but newest after: not done.
        let straddling = cursor.advance(&hourly_page(2000, 3000), 2500 * HOUR_MS).unwrap();
        assert!(!straddling.done);

        let before = cursor.advance(&hourly_page(2000, 2499), 2500 * HOUR_MS).unwrap();
        assert!(before.done);
    }

    #[test]
    fn test_empty_page_is_rejected() {
        let cursor = BackfillCursor::new(42);
        let err = cursor.advance(&[], 0).unwrap_err();
        assert!(matches!(err, ApiError::EmptyPage { end_time: 42 }));
    }

    #[test]
    fn test_single_candle_at_bound_stalls() {
        let cursor = BackfillCursor::new(10 * HOUR_MS);
        let next = cursor.advance(&hourly_page(10, 10), 0).unwrap();
        assert_eq!(next.end_time, cursor.end_time);
        assert!(cursor.is_stalled_by(&next));
    }
}
