//! Dedup store trait.
//!
//! The store is the only shared mutable resource in the pipeline. Reads may
//! race writes; correctness rests on `insert` treating an existing
//! fingerprint as a non-error [`InsertOutcome::AlreadyExists`].
//!
//! # Error Modes
//!
//! | Error | Meaning | Engine behavior |
//! |-------|---------|-----------------|
//! | `Error::OperationFailed` | Query failed, store busy or unavailable | `Error` decision |
//! | `Error::StorageCorrupted` | Database file is corrupt or not a database | Escalated |

use crate::Result;
use crate::models::{DedupRecord, DedupStats};

/// Result of an insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was written.
    Inserted,
    /// A record with the same fingerprint already exists; nothing was written.
    AlreadyExists,
}

impl InsertOutcome {
    /// Returns true when the record was written.
    #[must_use]
    pub const fn is_inserted(self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Storage for committed payment identities.
///
/// # Implementor Notes
///
/// - Methods take `&self`; use interior mutability for connections
/// - Window queries are symmetric: `[center - window, center + window]`,
///   both ends inclusive
/// - Window queries must be index-backed on `(source_app, post_time)`
/// - `cleanup` removes records with `created_at` strictly below the cutoff
pub trait DedupStore: Send + Sync {
    /// Records from `source_app` whose post time is within `window_secs` of
    /// `center_millis`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn find_in_window(
        &self,
        source_app: &str,
        center_millis: i64,
        window_secs: u32,
    ) -> Result<Vec<DedupRecord>>;

    /// Number of records from `source_app` within the same symmetric window.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn count_in_window(&self, source_app: &str, center_millis: i64, window_secs: u32)
    -> Result<u64>;

    /// Whether a record with this fingerprint exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn exists(&self, fingerprint: &str) -> Result<bool>;

    /// The record stored under this fingerprint.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<DedupRecord>>;

    /// Atomically inserts a record unless its fingerprint already exists.
    ///
    /// # Errors
    ///
    /// Returns an error only when the write itself fails; a duplicate
    /// fingerprint is [`InsertOutcome::AlreadyExists`].
    fn insert(&self, record: &DedupRecord) -> Result<InsertOutcome>;

    /// Deletes records created strictly before `older_than_millis`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn cleanup(&self, older_than_millis: i64) -> Result<u64>;

    /// Counts what [`cleanup`](Self::cleanup) would remove.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn count_older_than(&self, older_than_millis: i64) -> Result<u64>;

    /// Deletes every record.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn clear_all(&self) -> Result<u64>;

    /// Total and per-source record counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn stats(&self) -> Result<DedupStats>;
}
