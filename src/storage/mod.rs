//! Dedup storage.
//!
//! [`DedupStore`] is the storage seam; [`SqliteDedupStore`] is the embedded
//! implementation used by the binary and the tests.

// Dropping the connection guard a few statements early gains nothing.
#![allow(clippy::significant_drop_tightening)]

pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteDedupStore;
pub use traits::{DedupStore, InsertOutcome};

use std::path::PathBuf;

/// Database file name inside the data directory.
pub const DB_FILE_NAME: &str = "dedup.db";

/// Returns the platform data directory for notiledger.
///
/// Falls back to `./.notiledger` when no home directory can be resolved.
#[must_use]
pub fn get_user_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".notiledger"),
        |dirs| dirs.data_local_dir().join("notiledger"),
    )
}
