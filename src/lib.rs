//! # Notiledger
//!
//! Turns payment notifications into ledger entries without recording the
//! same real-world payment twice.
//!
//! Payment apps emit unstructured notification text, and a single payment
//! often produces several overlapping notifications within seconds. The
//! pipeline filters obvious non-payments, deduplicates in two phases (a cheap
//! raw-text window check before parsing and a semantic fingerprint after it),
//! applies per-source policy and burst protection, and only then hands a
//! parsed candidate to a ledger sink.
//!
//! ## Features
//!
//! - Source-specific parsers with a deterministic confidence score
//! - Provisional (pre-parse) and authoritative (post-parse) fingerprints
//! - `SQLite` dedup store with at-most-one record per fingerprint
//! - Per-source runtime configuration with typed keyword blacklists
//! - Retention-based cleanup of old dedup records
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use notiledger::{LedgerPipeline, RawNotificationEvent, SqliteDedupStore};
//!
//! let store = Arc::new(SqliteDedupStore::in_memory()?);
//! let pipeline = LedgerPipeline::with_defaults(store, sink);
//! let event = RawNotificationEvent::new("com.eg.android.AlipayGphone", now)
//!     .with_body("向【星巴克咖啡】付款28.50元");
//! let outcome = pipeline.process(&event)?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod config;
pub mod gc;
pub mod models;
pub mod observability;
pub mod parsers;
pub mod policy;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::{NotiledgerConfig, RuntimeSettings, SharedSettings, SourceMode, SourceRule};
pub use models::{
    DedupRecord, DedupStats, PaymentCandidate, PaymentDirection, PaymentSourceType,
    ProcessDecision, RawNotificationEvent, SkipReason, Stage,
};
pub use parsers::{ConfidenceWeights, NotificationParser, ParseOutcome, ParserRegistry};
pub use policy::PolicyFilter;
pub use services::{
    DecisionEngine, DedupConfig, FingerprintGenerator, LedgerEntry, LedgerPipeline, LedgerSink,
    PipelineOutcome,
};
pub use storage::{DedupStore, InsertOutcome, SqliteDedupStore};

/// Error type for notiledger operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed events, empty source ids, bad CLI arguments |
/// | `InvalidConfig` | Config file values out of range or unparseable |
/// | `OperationFailed` | Database queries fail, I/O errors, ledger sink failures |
/// | `StorageCorrupted` | `SQLite` reports a corrupt or foreign database file |
/// | `ParseFailed` | A parser hits an internal failure on an event |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be loaded or failed validation.
    ///
    /// Raised when:
    /// - The TOML file does not parse
    /// - A numeric value is outside its allowed range
    /// - A confidence weight is not in [0, 1]
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` database operations fail
    /// - Filesystem I/O errors occur
    /// - The ledger sink rejects an entry
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The dedup store is unreadable.
    ///
    /// This is the only fatal variant: the decision engine escalates it
    /// instead of folding it into an `Error` decision.
    #[error("storage corrupted: {cause}")]
    StorageCorrupted {
        /// The underlying cause.
        cause: String,
    },

    /// A parser failed internally while handling an event.
    #[error("parser '{parser}' failed: {cause}")]
    ParseFailed {
        /// The parser that failed.
        parser: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns true for failures that must reach the host instead of being
    /// reported as an `Error` decision.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::StorageCorrupted { .. })
    }
}

/// Result type alias for notiledger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in milliseconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
///
/// # Examples
///
/// ```rust
/// use notiledger::current_timestamp_millis;
///
/// let ts = current_timestamp_millis();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_millis()).ok())
        .unwrap_or(0)
}
