//! Cleanup and clear CLI commands.

use super::output_error;
use crate::gc::{DedupRetention, RetentionConfig, RetentionResult};
use crate::storage::DedupStore;
use crate::{Error, Result};
use std::io::Write;
use std::sync::Arc;

/// Removes (or counts, on a dry run) records past the retention period.
///
/// `days` overrides the configured retention period.
///
/// # Errors
///
/// Returns an error for a zero-day period, a store failure or an output
/// failure.
pub fn cmd_cleanup<S: DedupStore, W: Write>(
    store: Arc<S>,
    retention: RetentionConfig,
    days: Option<u32>,
    dry_run: bool,
    writer: &mut W,
) -> Result<RetentionResult> {
    let days_to_keep = days.unwrap_or(retention.days_to_keep);
    let runner = DedupRetention::new(store, retention);
    let result = runner.cleanup_at(days_to_keep, crate::current_timestamp_millis(), dry_run)?;
    writeln!(writer, "{}", result.summary()).map_err(output_error)?;
    Ok(result)
}

/// Removes every record. Refuses unless `confirmed`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] without confirmation, or the store's error.
pub fn cmd_clear<S: DedupStore, W: Write>(
    store: &S,
    confirmed: bool,
    writer: &mut W,
) -> Result<u64> {
    if !confirmed {
        return Err(Error::InvalidInput(
            "clear removes every dedup record; pass --yes to confirm".to_string(),
        ));
    }
    let removed = store.clear_all()?;
    tracing::info!(removed, "Dedup store cleared");
    writeln!(writer, "Removed {removed} dedup records").map_err(output_error)?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DedupRecord;
    use crate::storage::SqliteDedupStore;

    fn seeded() -> Arc<SqliteDedupStore> {
        let store = Arc::new(SqliteDedupStore::in_memory().unwrap());
        let now = crate::current_timestamp_millis();
        for (fingerprint, created_at) in [("old", 1_000), ("new", now)] {
            store
                .insert(&DedupRecord {
                    fingerprint: fingerprint.to_string(),
                    text_hash: "t".to_string(),
                    amount_cents: 100,
                    merchant_hash: "m".to_string(),
                    source_app: "wallet.app".to_string(),
                    post_time: created_at,
                    created_at,
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn test_cleanup_dry_run_then_real() {
        let store = seeded();
        let mut out = Vec::new();

        let preview = cmd_cleanup(
            Arc::clone(&store),
            RetentionConfig::default(),
            Some(1),
            true,
            &mut out,
        )
        .unwrap();
        assert_eq!(preview.records_removed, 1);
        assert!(String::from_utf8_lossy(&out).starts_with("Would remove 1"));
        assert!(store.exists("old").unwrap());

        let removed = cmd_cleanup(
            Arc::clone(&store),
            RetentionConfig::default(),
            None,
            false,
            &mut Vec::new(),
        )
        .unwrap();
        assert_eq!(removed.records_removed, 1);
        assert_eq!(removed.days_to_keep, 30);
        assert!(!store.exists("old").unwrap());
        assert!(store.exists("new").unwrap());
    }

    #[test]
    fn test_clear_requires_confirmation() {
        let store = seeded();
        let err = cmd_clear(store.as_ref(), false, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(store.stats().unwrap().total_records, 2);

        let mut out = Vec::new();
        assert_eq!(cmd_clear(store.as_ref(), true, &mut out).unwrap(), 2);
        assert_eq!(String::from_utf8(out).unwrap(), "Removed 2 dedup records\n");
        assert_eq!(store.stats().unwrap().total_records, 0);
    }
}
