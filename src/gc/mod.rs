//! Garbage collection of dedup records.
//!
//! Dedup records are append-only; the only paths that remove them are the
//! retention pass here and an explicit `clear_all`. The cutoff comparison is
//! strict, and any sensible retention period is far wider than the dedup
//! window, so a cleanup racing a window lookup never removes a record the
//! lookup still needs.

mod retention;

pub use retention::{
    DEFAULT_RETENTION_DAYS, DedupRetention, MILLIS_PER_DAY, RETENTION_DAYS_ENV, RetentionConfig,
    RetentionResult,
};
