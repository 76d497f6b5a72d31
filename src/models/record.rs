//! Dedup store records and statistics.

use serde::{Deserialize, Serialize};

/// A committed payment identity.
///
/// Records are append-only: created by the commit path, removed only by
/// retention cleanup or a full clear, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRecord {
    /// Final parsed fingerprint, unique within the store.
    pub fingerprint: String,
    /// Hash of the normalized raw text.
    pub text_hash: String,
    /// Amount in minor units.
    pub amount_cents: i64,
    /// Hash of the normalized merchant.
    pub merchant_hash: String,
    /// Source application identifier.
    pub source_app: String,
    /// Event post time in epoch millis.
    pub post_time: i64,
    /// When the record was written, epoch millis.
    pub created_at: i64,
}

/// Record count for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    /// Source application identifier.
    pub source_app: String,
    /// Records stored for this source.
    pub record_count: u64,
}

/// Store-wide counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupStats {
    /// Total records.
    pub total_records: u64,
    /// Per-source counts, largest first.
    pub sources: Vec<SourceStats>,
}

impl DedupStats {
    /// Count for a single source, zero when absent.
    #[must_use]
    pub fn count_for(&self, source_app: &str) -> u64 {
        self.sources
            .iter()
            .find(|s| s.source_app == source_app)
            .map_or(0, |s| s.record_count)
    }
}
