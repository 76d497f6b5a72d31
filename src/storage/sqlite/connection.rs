//! Connection handling for the `SQLite` store.

use crate::{Error, Result};
use rusqlite::{Connection, ErrorCode};
use std::sync::{Mutex, MutexGuard};

/// Acquires the connection mutex, recovering from poisoning.
///
/// A panic inside a previous critical section leaves the connection itself
/// usable, so the guard is taken back and a warning is logged.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("notiledger_sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Applies WAL journaling, `synchronous = NORMAL` and a 5 second busy timeout.
///
/// In-memory databases silently keep their `memory` journal mode.
///
/// # Errors
///
/// Failures of the tuning pragmas are ignored. The closing `schema_version`
/// read fails when the file cannot be used as a database, reported as
/// [`Error::StorageCorrupted`] for non-database or corrupt files.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode returns a row, so pragma_update is used instead of execute_batch
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");
    conn.pragma_query_value(None, "schema_version", |row| row.get::<_, i64>(0))
        .map_err(|e| map_sqlite_error("configure_connection", &e))?;
    Ok(())
}

/// Maps a `rusqlite` error for `operation` into the crate error.
///
/// `SQLITE_CORRUPT` and `SQLITE_NOTADB` become [`Error::StorageCorrupted`];
/// everything else is [`Error::OperationFailed`].
pub fn map_sqlite_error(operation: &str, err: &rusqlite::Error) -> Error {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase) => {
            tracing::error!(operation, error = %err, "SQLite database is corrupted");
            metrics::counter!("notiledger_sqlite_corruption_total").increment(1);
            Error::StorageCorrupted {
                cause: format!("{operation}: {err}"),
            }
        },
        _ => Error::OperationFailed {
            operation: operation.to_string(),
            cause: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_lock_concurrent() {
        let mutex = Arc::new(Mutex::new(0));
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let mutex = Arc::clone(&mutex);
                thread::spawn(move || {
                    *acquire_lock(&mutex) += 1;
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*acquire_lock(&mutex), 10);
    }

    #[test]
    fn test_acquire_lock_recovers_from_poison() {
        let mutex = Arc::new(Mutex::new(7));
        let poisoner = Arc::clone(&mutex);
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the mutex");
        })
        .join();
        assert!(mutex.is_poisoned());
        assert_eq!(*acquire_lock(&mutex), 7);
    }

    #[test]
    fn test_configure_connection() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn).unwrap();

        let synchronous: i32 = conn
            .pragma_query_value(None, "synchronous", |row| row.get(0))
            .unwrap();
        assert_eq!(synchronous, 1, "Expected NORMAL synchronous mode (1)");

        let busy_timeout: i32 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .unwrap();
        assert_eq!(busy_timeout, 5000);
    }

    #[test]
    fn test_configure_connection_rejects_non_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, vec![b'x'; 4096]).unwrap();

        let conn = Connection::open(&path).unwrap();
        let err = configure_connection(&conn).unwrap_err();
        assert!(err.is_fatal(), "expected corruption, got {err:?}");
    }

    #[test]
    fn test_map_sqlite_error_generic() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute("SELECT * FROM missing_table", []).unwrap_err();
        let mapped = map_sqlite_error("select_missing", &err);
        assert!(matches!(
            mapped,
            Error::OperationFailed { ref operation, .. } if operation == "select_missing"
        ));
        assert!(!mapped.is_fatal());
    }
}
