//! `SQLite` implementation of [`DedupStore`].

use super::{acquire_lock, configure_connection, map_sqlite_error, record_operation_metrics};
use crate::models::{DedupRecord, DedupStats, SourceStats};
use crate::storage::traits::{DedupStore, InsertOutcome};
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const SELECT_COLUMNS: &str =
    "fingerprint, text_hash, amount_cents, merchant_hash, source_app, post_time, created_at";

/// Dedup store backed by a single `SQLite` connection.
///
/// Uniqueness of fingerprints is enforced by a `UNIQUE` constraint, and
/// [`insert`](DedupStore::insert) uses `INSERT OR IGNORE`, so concurrent
/// commits of the same payment converge to one row without any locking
/// above the store.
pub struct SqliteDedupStore {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the database file (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteDedupStore {
    /// Opens (or creates) a store at `db_path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageCorrupted`] if the file is not a valid
    /// database, or [`Error::OperationFailed`] if it cannot be opened.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                    operation: "create_data_dir".to_string(),
                    cause: format!("{}: {e}", parent.display()),
                })?;
            }
        }

        let conn = Connection::open(&db_path).map_err(|e| map_sqlite_error("open_sqlite", &e))?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| map_sqlite_error("open_sqlite_memory", &e))?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS dedup_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fingerprint TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL,
                source_app TEXT NOT NULL,
                text_hash TEXT NOT NULL,
                amount_cents INTEGER NOT NULL,
                merchant_hash TEXT NOT NULL,
                post_time INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_dedup_source_post_time
                ON dedup_records(source_app, post_time);
            CREATE INDEX IF NOT EXISTS idx_dedup_created_at
                ON dedup_records(created_at);",
        )
        .map_err(|e| map_sqlite_error("create_schema", &e))
    }

    /// Runs `f` under the connection lock and records operation metrics.
    fn run<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let start = Instant::now();
        let result = {
            let conn = acquire_lock(&self.conn);
            f(&conn).map_err(|e| map_sqlite_error(operation, &e))
        };
        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics(operation, start, status);
        result
    }
}

/// Inclusive bounds of the symmetric window around `center_millis`.
fn window_bounds(center_millis: i64, window_secs: u32) -> (i64, i64) {
    let width = i64::from(window_secs) * 1000;
    (
        center_millis.saturating_sub(width),
        center_millis.saturating_add(width),
    )
}

fn count_to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

fn changes_to_u64(changes: usize) -> u64 {
    u64::try_from(changes).unwrap_or(u64::MAX)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<DedupRecord> {
    Ok(DedupRecord {
        fingerprint: row.get(0)?,
        text_hash: row.get(1)?,
        amount_cents: row.get(2)?,
        merchant_hash: row.get(3)?,
        source_app: row.get(4)?,
        post_time: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl DedupStore for SqliteDedupStore {
    #[instrument(skip(self), fields(operation = "find_in_window", backend = "sqlite"))]
    fn find_in_window(
        &self,
        source_app: &str,
        center_millis: i64,
        window_secs: u32,
    ) -> Result<Vec<DedupRecord>> {
        let (from, to) = window_bounds(center_millis, window_secs);
        self.run("find_in_window", |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {SELECT_COLUMNS} FROM dedup_records
                 WHERE source_app = ?1 AND post_time BETWEEN ?2 AND ?3
                 ORDER BY ABS(post_time - ?4) ASC, id ASC"
            ))?;
            stmt.query_map(params![source_app, from, to, center_millis], record_from_row)?
                .collect()
        })
    }

    #[instrument(skip(self), fields(operation = "count_in_window", backend = "sqlite"))]
    fn count_in_window(
        &self,
        source_app: &str,
        center_millis: i64,
        window_secs: u32,
    ) -> Result<u64> {
        let (from, to) = window_bounds(center_millis, window_secs);
        let count: i64 = self.run("count_in_window", |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM dedup_records
                 WHERE source_app = ?1 AND post_time BETWEEN ?2 AND ?3",
                params![source_app, from, to],
                |row| row.get(0),
            )
        })?;
        Ok(count_to_u64(count))
    }

    #[instrument(skip(self), fields(operation = "exists", backend = "sqlite"))]
    fn exists(&self, fingerprint: &str) -> Result<bool> {
        self.run("exists", |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM dedup_records WHERE fingerprint = ?1)",
                params![fingerprint],
                |row| row.get(0),
            )
        })
    }

    #[instrument(skip(self), fields(operation = "find_by_fingerprint", backend = "sqlite"))]
    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<DedupRecord>> {
        self.run("find_by_fingerprint", |conn| {
            conn.query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM dedup_records WHERE fingerprint = ?1"),
                params![fingerprint],
                record_from_row,
            )
            .optional()
        })
    }

    #[instrument(
        skip(self, record),
        fields(operation = "insert", backend = "sqlite", fingerprint = %record.fingerprint)
    )]
    fn insert(&self, record: &DedupRecord) -> Result<InsertOutcome> {
        let changed = self.run("insert", |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO dedup_records
                 (fingerprint, created_at, source_app, text_hash, amount_cents, merchant_hash, post_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.fingerprint,
                    record.created_at,
                    record.source_app,
                    record.text_hash,
                    record.amount_cents,
                    record.merchant_hash,
                    record.post_time,
                ],
            )
        })?;

        if changed == 0 {
            tracing::debug!("Fingerprint already stored");
            Ok(InsertOutcome::AlreadyExists)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    #[instrument(skip(self), fields(operation = "cleanup", backend = "sqlite"))]
    fn cleanup(&self, older_than_millis: i64) -> Result<u64> {
        let removed = self.run("cleanup", |conn| {
            conn.execute(
                "DELETE FROM dedup_records WHERE created_at < ?1",
                params![older_than_millis],
            )
        })?;
        Ok(changes_to_u64(removed))
    }

    #[instrument(skip(self), fields(operation = "count_older_than", backend = "sqlite"))]
    fn count_older_than(&self, older_than_millis: i64) -> Result<u64> {
        let count: i64 = self.run("count_older_than", |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM dedup_records WHERE created_at < ?1",
                params![older_than_millis],
                |row| row.get(0),
            )
        })?;
        Ok(count_to_u64(count))
    }

    #[instrument(skip(self), fields(operation = "clear_all", backend = "sqlite"))]
    fn clear_all(&self) -> Result<u64> {
        let removed = self.run("clear_all", |conn| conn.execute("DELETE FROM dedup_records", []))?;
        Ok(changes_to_u64(removed))
    }

    #[instrument(skip(self), fields(operation = "stats", backend = "sqlite"))]
    fn stats(&self) -> Result<DedupStats> {
        let rows: Vec<(String, i64)> = self.run("stats", |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT source_app, COUNT(*) AS n FROM dedup_records
                 GROUP BY source_app ORDER BY n DESC, source_app ASC",
            )?;
            stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect()
        })?;

        let sources: Vec<SourceStats> = rows
            .into_iter()
            .map(|(source_app, count)| SourceStats {
                source_app,
                record_count: count_to_u64(count),
            })
            .collect();
        Ok(DedupStats {
            total_records: sources.iter().map(|s| s.record_count).sum(),
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use test_case::test_case;

    const T: i64 = 1_700_000_000_000;

    fn record(fingerprint: &str, source: &str, post_time: i64, created_at: i64) -> DedupRecord {
        DedupRecord {
            fingerprint: fingerprint.to_string(),
            text_hash: format!("hash-{fingerprint}"),
            amount_cents: 2850,
            merchant_hash: "0123456789abcdef".to_string(),
            source_app: source.to_string(),
            post_time,
            created_at,
        }
    }

    #[test]
    fn test_insert_duplicate_is_noop() {
        let store = SqliteDedupStore::in_memory().unwrap();
        let first = record("fp1", "wallet.app", T, T);

        assert_eq!(store.insert(&first).unwrap(), InsertOutcome::Inserted);
        let mut second = first.clone();
        second.amount_cents = 1;
        assert_eq!(store.insert(&second).unwrap(), InsertOutcome::AlreadyExists);

        let stored = store.find_by_fingerprint("fp1").unwrap().unwrap();
        assert_eq!(stored, first);
        assert_eq!(store.stats().unwrap().total_records, 1);
    }

    #[test_case(-20_000, true ; "lower edge inclusive")]
    #[test_case(20_000, true ; "upper edge inclusive")]
    #[test_case(-20_001, false ; "just before window")]
    #[test_case(20_001, false ; "just after window")]
    #[test_case(0, true ; "center")]
    fn test_window_is_symmetric(offset: i64, found: bool) {
        let store = SqliteDedupStore::in_memory().unwrap();
        store.insert(&record("fp", "wallet.app", T + offset, T)).unwrap();

        assert_eq!(!store.find_in_window("wallet.app", T, 20).unwrap().is_empty(), found);
        assert_eq!(store.count_in_window("wallet.app", T, 20).unwrap(), u64::from(found));
    }

    #[test]
    fn test_window_is_per_source_and_nearest_first() {
        let store = SqliteDedupStore::in_memory().unwrap();
        store.insert(&record("far", "wallet.app", T - 15_000, T)).unwrap();
        store.insert(&record("near", "wallet.app", T + 2_000, T)).unwrap();
        store.insert(&record("other", "bank.app", T, T)).unwrap();

        let found = store.find_in_window("wallet.app", T, 20).unwrap();
        let fingerprints: Vec<&str> = found.iter().map(|r| r.fingerprint.as_str()).collect();
        assert_eq!(fingerprints, ["near", "far"]);
    }

    #[test]
    fn test_cleanup_is_strict_and_idempotent() {
        let store = SqliteDedupStore::in_memory().unwrap();
        store.insert(&record("old", "a", T, T - 1)).unwrap();
        store.insert(&record("edge", "a", T, T)).unwrap();

        assert_eq!(store.count_older_than(T).unwrap(), 1);
        assert_eq!(store.cleanup(T).unwrap(), 1);
        assert_eq!(store.cleanup(T).unwrap(), 0);
        assert!(store.exists("edge").unwrap());
        assert!(!store.exists("old").unwrap());
    }

    #[test]
    fn test_stats_and_clear_all() {
        let store = SqliteDedupStore::in_memory().unwrap();
        store.insert(&record("a1", "a.app", T, T)).unwrap();
        store.insert(&record("a2", "a.app", T + 1, T)).unwrap();
        store.insert(&record("b1", "b.app", T, T)).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.sources[0].source_app, "a.app");
        assert_eq!(stats.count_for("a.app"), 2);
        assert_eq!(stats.count_for("b.app"), 1);
        assert_eq!(stats.count_for("c.app"), 0);

        assert_eq!(store.clear_all().unwrap(), 3);
        assert_eq!(store.stats().unwrap(), DedupStats::default());
    }

    #[test]
    fn test_file_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("dedup.db");
        {
            let store = SqliteDedupStore::new(&path).unwrap();
            store.insert(&record("fp", "a", T, T)).unwrap();
            assert_eq!(store.db_path(), Some(path.as_path()));
        }
        let reopened = SqliteDedupStore::new(&path).unwrap();
        assert!(reopened.exists("fp").unwrap());
    }

    #[test]
    fn test_garbage_file_is_reported_as_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dedup.db");
        std::fs::write(&path, vec![0x5a_u8; 8192]).unwrap();

        let err = SqliteDedupStore::new(&path).err().unwrap();
        assert!(err.is_fatal(), "expected corruption, got {err}");
    }
}
