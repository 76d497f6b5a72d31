//! CLI command implementations.
//!
//! The binary parses arguments and wires stdout; the handlers here take any
//! writer so they can be driven from tests.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `evaluate` | Run the decision engine on one notification and print the decision |
//! | `ingest` | Stream JSON-lines notifications through the full pipeline |
//! | `stats` | Show dedup store counts |
//! | `cleanup` | Remove dedup records past the retention period |
//! | `clear` | Remove every dedup record |
//! | `config` | Print the effective configuration |
//!
//! # Example Usage
//!
//! ```bash
//! # Evaluate a single notification
//! notiledger evaluate --source com.tencent.mm --body "微信支付 付款28.50元"
//!
//! # Ingest a capture file, appending accepted entries to a ledger
//! notiledger ingest --input notifications.jsonl --ledger ledger.jsonl
//!
//! # Preview a retention pass
//! notiledger cleanup --days 7 --dry-run
//! ```

mod config;
mod evaluate;
mod ingest;
mod maintenance;
mod stats;

pub use config::cmd_config;
pub use evaluate::{EvaluateArgs, cmd_evaluate};
pub use ingest::{DEFAULT_CONCURRENCY, IngestOptions, IngestSummary, cmd_ingest, ingest_lines};
pub use maintenance::{cmd_cleanup, cmd_clear};
pub use stats::cmd_stats;

use crate::config::NotiledgerConfig;
use crate::storage::SqliteDedupStore;
use crate::{Error, Result};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;

/// Opens the dedup store named by `config`.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or initialized.
pub fn open_store(config: &NotiledgerConfig) -> Result<Arc<SqliteDedupStore>> {
    SqliteDedupStore::new(config.db_path()).map(Arc::new)
}

/// Writes `value` as one line of JSON.
pub(crate) fn write_json_line<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    let line = serde_json::to_string(value).map_err(|e| Error::OperationFailed {
        operation: "serialize_output".to_string(),
        cause: e.to_string(),
    })?;
    writeln!(writer, "{line}").map_err(output_error)
}

/// Maps an output write failure.
pub(crate) fn output_error(err: std::io::Error) -> Error {
    Error::OperationFailed {
        operation: "write_output".to_string(),
        cause: err.to_string(),
    }
}
