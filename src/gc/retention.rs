//! Retention-based cleanup of the dedup store.
//!
//! Records only need to outlive the dedup window; keeping them for days
//! gives room for late redeliveries and diagnostics. Retention is read from:
//! - Environment variable: `NOTILEDGER_RETENTION_DAYS` (default: 30)
//! - Config file: `[retention] days_to_keep = 30`

use crate::storage::DedupStore;
use crate::{Error, Result, current_timestamp_millis};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Environment variable for the retention period in days.
pub const RETENTION_DAYS_ENV: &str = "NOTILEDGER_RETENTION_DAYS";

/// Default retention period in days.
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Milliseconds per day.
pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Retention policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Records created more than this many days ago are removed.
    pub days_to_keep: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days_to_keep: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl RetentionConfig {
    /// Loads the policy from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `NOTILEDGER_RETENTION_DAYS` from `lookup` on top of `self`.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(RETENTION_DAYS_ENV) {
            match value.trim().parse::<u32>() {
                Ok(days) if days >= 1 => self.days_to_keep = days,
                _ => tracing::warn!(value = %value, "Ignoring invalid {RETENTION_DAYS_ENV}"),
            }
        }
        self
    }

    /// Builder method to set the retention period.
    #[must_use]
    pub const fn with_days_to_keep(mut self, days: u32) -> Self {
        self.days_to_keep = days;
        self
    }

    /// Rejects a zero-day policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when `days_to_keep` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.days_to_keep == 0 {
            return Err(Error::InvalidConfig(
                "retention.days_to_keep must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of one retention pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetentionResult {
    /// Records removed (or that would be removed on a dry run).
    pub records_removed: u64,
    /// Cutoff in epoch millis; records created strictly before it qualify.
    pub cutoff_millis: i64,
    /// Retention period applied.
    pub days_to_keep: u32,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Duration of the pass in milliseconds.
    pub duration_ms: u64,
}

impl RetentionResult {
    /// Returns a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let cutoff = Utc
            .timestamp_millis_opt(self.cutoff_millis)
            .single()
            .map_or_else(|| self.cutoff_millis.to_string(), |t| t.to_rfc3339());

        if self.records_removed == 0 {
            return format!(
                "No dedup records older than {} days (cutoff {cutoff})",
                self.days_to_keep
            );
        }

        let action = if self.dry_run {
            "Would remove"
        } else {
            "Removed"
        };
        format!(
            "{action} {} dedup records older than {} days (cutoff {cutoff}) in {}ms",
            self.records_removed, self.days_to_keep, self.duration_ms
        )
    }
}

/// Removes dedup records past their retention period.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use notiledger::SqliteDedupStore;
/// use notiledger::gc::{DedupRetention, RetentionConfig};
///
/// let store = Arc::new(SqliteDedupStore::in_memory()?);
/// let retention = DedupRetention::new(store, RetentionConfig::default());
/// let result = retention.run(true)?;
/// assert_eq!(result.records_removed, 0);
/// # Ok::<(), notiledger::Error>(())
/// ```
pub struct DedupRetention<S: DedupStore> {
    store: Arc<S>,
    config: RetentionConfig,
}

impl<S: DedupStore> DedupRetention<S> {
    /// Creates a retention runner over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>, config: RetentionConfig) -> Self {
        Self { store, config }
    }

    /// Deletes records older than `now - days_to_keep` days.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for zero days, or the store's error.
    pub fn cleanup(&self, days_to_keep: u32) -> Result<RetentionResult> {
        self.cleanup_at(days_to_keep, current_timestamp_millis(), false)
    }

    /// Runs the configured policy.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the query or delete fails.
    pub fn run(&self, dry_run: bool) -> Result<RetentionResult> {
        self.cleanup_at(self.config.days_to_keep, current_timestamp_millis(), dry_run)
    }

    /// Cleanup relative to an explicit `now_millis`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for zero days, or the store's error.
    #[instrument(skip(self), fields(operation = "retention_cleanup"))]
    pub fn cleanup_at(
        &self,
        days_to_keep: u32,
        now_millis: i64,
        dry_run: bool,
    ) -> Result<RetentionResult> {
        if days_to_keep == 0 {
            return Err(Error::InvalidInput(
                "days to keep must be at least 1".to_string(),
            ));
        }

        let start = Instant::now();
        let cutoff_millis =
            now_millis.saturating_sub(i64::from(days_to_keep).saturating_mul(MILLIS_PER_DAY));

        let records_removed = if dry_run {
            self.store.count_older_than(cutoff_millis)?
        } else {
            self.store.cleanup(cutoff_millis)?
        };

        if !dry_run {
            metrics::counter!("notiledger_store_cleanup_removed_total").increment(records_removed);
        }

        let result = RetentionResult {
            records_removed,
            cutoff_millis,
            days_to_keep,
            dry_run,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        info!(
            records_removed,
            cutoff_millis, dry_run, "Retention cleanup finished"
        );
        Ok(result)
    }
}
