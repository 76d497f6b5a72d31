//! `SQLite` dedup store.
//!
//! - `connection`: mutex handling, pragmas and error mapping
//! - `metrics`: per-operation counters and latency
//! - `dedup`: the [`SqliteDedupStore`] itself

mod connection;
mod dedup;
mod metrics;

pub use connection::{acquire_lock, configure_connection, map_sqlite_error};
pub use dedup::SqliteDedupStore;
pub use metrics::record_operation_metrics;
