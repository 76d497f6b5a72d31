//! Ingest CLI command.
//!
//! Reads JSON-lines notifications and runs each through the ledger pipeline
//! on blocking workers. A semaphore bounds how many events are in flight.
//! Once shutdown fires no new lines are read; events already handed to a
//! worker still finish and are reported.
//!
//! Output is one JSON object per event, in completion order, tagged with the
//! input line number.

use super::{open_store, write_json_line};
use crate::config::{NotiledgerConfig, SharedSettings};
use crate::models::RawNotificationEvent;
use crate::parsers::ParserRegistry;
use crate::services::{DecisionEngine, JsonLinesSink, LedgerPipeline, LedgerSink, PipelineOutcome};
use crate::storage::DedupStore;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::instrument;

/// Default number of events processed concurrently.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Ledger file used when `--ledger` is not given.
const LEDGER_FILE_NAME: &str = "ledger.jsonl";

/// Options for `ingest`.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Input file; stdin when absent or `-`.
    pub input: Option<PathBuf>,
    /// Ledger file; `<data_dir>/ledger.jsonl` when absent.
    pub ledger: Option<PathBuf>,
    /// Maximum events in flight.
    pub concurrency: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            input: None,
            ledger: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Totals for one ingest run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Non-blank input lines seen.
    pub events: u64,
    /// Count per outcome kind.
    pub outcomes: BTreeMap<String, u64>,
    /// Whether reading stopped on shutdown.
    pub interrupted: bool,
}

impl IngestSummary {
    /// Count for one outcome kind (`"recorded"`, `"skipped"`, ...).
    #[must_use]
    pub fn count(&self, outcome: &str) -> u64 {
        self.outcomes.get(outcome).copied().unwrap_or(0)
    }

    fn tally(&mut self, outcome: &PipelineOutcome) {
        *self.outcomes.entry(outcome.as_str().to_string()).or_default() += 1;
    }
}

#[derive(Serialize)]
struct IngestLine<'a> {
    line: u64,
    #[serde(flatten)]
    outcome: &'a PipelineOutcome,
}

type WorkerResult = (u64, Result<PipelineOutcome>);

/// Runs the ingest command against the configured store and ledger file.
///
/// # Errors
///
/// Returns an error if the store, input or ledger cannot be opened, if output
/// fails, or if the store reports corruption mid-run.
pub async fn cmd_ingest<W: Write>(
    config: &NotiledgerConfig,
    options: &IngestOptions,
    shutdown: impl Future<Output = ()>,
    writer: &mut W,
) -> Result<IngestSummary> {
    let store = open_store(config)?;
    let ledger_path = options
        .ledger
        .clone()
        .unwrap_or_else(|| config.data_dir.join(LEDGER_FILE_NAME));
    let sink = Arc::new(JsonLinesSink::append_to(&ledger_path)?);

    let engine = DecisionEngine::new(
        store,
        Arc::new(ParserRegistry::with_default_parsers()),
        Arc::new(SharedSettings::new(config.runtime_settings())),
    );
    let pipeline = Arc::new(LedgerPipeline::new(engine, sink));

    let input = options
        .input
        .as_ref()
        .filter(|path| path.as_os_str() != "-");
    match input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| Error::OperationFailed {
                    operation: "open_input".to_string(),
                    cause: format!("{}: {e}", path.display()),
                })?;
            ingest_lines(
                pipeline,
                BufReader::new(file),
                options.concurrency,
                shutdown,
                writer,
            )
            .await
        },
        None => {
            ingest_lines(
                pipeline,
                BufReader::new(tokio::io::stdin()),
                options.concurrency,
                shutdown,
                writer,
            )
            .await
        },
    }
}

/// Streams JSON-lines events from `reader` through `pipeline`.
///
/// Malformed lines are reported as `error` outcomes and do not stop the run.
/// A fatal store error stops reading; in-flight events are drained before it
/// is returned.
///
/// # Errors
///
/// Returns the first fatal pipeline error, a read error, or an output error.
#[instrument(skip_all, fields(operation = "ingest", concurrency))]
pub async fn ingest_lines<S, L, R, W>(
    pipeline: Arc<LedgerPipeline<S, L>>,
    reader: R,
    concurrency: usize,
    shutdown: impl Future<Output = ()>,
    writer: &mut W,
) -> Result<IngestSummary>
where
    S: DedupStore + 'static,
    L: LedgerSink + 'static,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks: JoinSet<WorkerResult> = JoinSet::new();
    let mut summary = IngestSummary::default();
    let mut failure: Option<Error> = None;
    let mut lines = reader.lines();
    let mut line_no = 0_u64;
    tokio::pin!(shutdown);

    loop {
        let next = tokio::select! {
            biased;
            () = &mut shutdown => {
                tracing::warn!(line = line_no, "Shutdown requested, finishing in-flight events");
                summary.interrupted = true;
                break;
            },
            next = lines.next_line() => next,
        };

        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                failure = Some(Error::OperationFailed {
                    operation: "read_events".to_string(),
                    cause: e.to_string(),
                });
                break;
            },
        };
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        summary.events += 1;

        let event: RawNotificationEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "Malformed event");
                let outcome = PipelineOutcome::Error {
                    message: format!("invalid event: {e}"),
                };
                emit(&mut summary, writer, line_no, &outcome)?;
                continue;
            },
        };

        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| Error::OperationFailed {
                operation: "acquire_worker".to_string(),
                cause: e.to_string(),
            })?;
        let worker = Arc::clone(&pipeline);
        let line = line_no;
        tasks.spawn_blocking(move || {
            let _permit = permit;
            (line, worker.process(&event))
        });

        while let Some(joined) = tasks.try_join_next() {
            settle(&mut summary, writer, &mut failure, joined)?;
        }
        if failure.is_some() {
            break;
        }
    }

    while let Some(joined) = tasks.join_next().await {
        settle(&mut summary, writer, &mut failure, joined)?;
    }

    tracing::info!(
        events = summary.events,
        recorded = summary.count("recorded"),
        interrupted = summary.interrupted,
        "Ingest finished"
    );
    failure.map_or(Ok(summary), Err)
}

fn settle<W: Write>(
    summary: &mut IngestSummary,
    writer: &mut W,
    failure: &mut Option<Error>,
    joined: std::result::Result<WorkerResult, JoinError>,
) -> Result<()> {
    let (line, result) = match joined {
        Ok(done) => done,
        Err(e) => {
            tracing::error!(error = %e, "Ingest worker failed");
            failure.get_or_insert(Error::OperationFailed {
                operation: "ingest_worker".to_string(),
                cause: e.to_string(),
            });
            return Ok(());
        },
    };

    match result {
        Ok(outcome) => emit(summary, writer, line, &outcome),
        Err(err) => {
            tracing::error!(line, error = %err, "Fatal pipeline error");
            failure.get_or_insert(err);
            Ok(())
        },
    }
}

fn emit<W: Write>(
    summary: &mut IngestSummary,
    writer: &mut W,
    line: u64,
    outcome: &PipelineOutcome,
) -> Result<()> {
    summary.tally(outcome);
    write_json_line(writer, &IngestLine { line, outcome })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryLedger;
    use crate::storage::SqliteDedupStore;
    use tempfile::TempDir;

    const ALIPAY: &str = "com.eg.android.AlipayGphone";

    fn pipeline() -> (
        Arc<LedgerPipeline<SqliteDedupStore, InMemoryLedger>>,
        Arc<InMemoryLedger>,
    ) {
        let ledger = Arc::new(InMemoryLedger::new());
        let pipeline = LedgerPipeline::with_defaults(
            Arc::new(SqliteDedupStore::in_memory().unwrap()),
            Arc::clone(&ledger),
        );
        (Arc::new(pipeline), ledger)
    }

    fn event_line(body: &str, post_time: i64) -> String {
        serde_json::json!({
            "packageName": ALIPAY,
            "text": body,
            "postTime": post_time,
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_ingest_dedups_and_reports_malformed_lines() {
        let (pipeline, ledger) = pipeline();
        let body = "你已成功向【星巴克咖啡】付款28.50元";
        let input = format!(
            "{}\n\nnot json\n{}\n",
            event_line(body, 1_700_000_000_000),
            event_line(body, 1_700_000_001_000),
        );

        let mut out = Vec::new();
        let summary = ingest_lines(
            pipeline,
            input.as_bytes(),
            1,
            std::future::pending(),
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(summary.events, 3);
        assert_eq!(summary.count("recorded"), 1);
        assert_eq!(summary.count("skipped"), 1);
        assert_eq!(summary.count("error"), 1);
        assert!(!summary.interrupted);
        assert_eq!(ledger.len(), 1);

        let lines: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        let malformed = lines.iter().find(|line| line["line"] == 3).unwrap();
        assert_eq!(malformed["outcome"], "error");
        let first = lines.iter().find(|line| line["line"] == 1).unwrap();
        assert_eq!(first["outcome"], "recorded");
        assert_eq!(first["entry"]["amount_cents"], 2850);
    }

    #[tokio::test]
    async fn test_ingest_stops_reading_on_shutdown() {
        let (pipeline, ledger) = pipeline();
        let input = event_line("付款28.50元", 1_700_000_000_000);

        let mut out = Vec::new();
        let summary = ingest_lines(
            pipeline,
            input.as_bytes(),
            2,
            std::future::ready(()),
            &mut out,
        )
        .await
        .unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.events, 0);
        assert!(out.is_empty());
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_cmd_ingest_writes_ledger_file() {
        let dir = TempDir::new().unwrap();
        let input_path = dir.path().join("events.jsonl");
        let ledger_path = dir.path().join("ledger.jsonl");
        std::fs::write(
            &input_path,
            format!(
                "{}\n",
                event_line("你已成功向【星巴克咖啡】付款28.50元", 1_700_000_000_000)
            ),
        )
        .unwrap();

        let config = NotiledgerConfig::new().with_data_dir(dir.path().join("data"));
        let options = IngestOptions {
            input: Some(input_path),
            ledger: Some(ledger_path.clone()),
            concurrency: 2,
        };
        let mut out = Vec::new();
        let summary = cmd_ingest(&config, &options, std::future::pending(), &mut out)
            .await
            .unwrap();

        assert_eq!(summary.count("recorded"), 1);
        let ledger = std::fs::read_to_string(&ledger_path).unwrap();
        assert_eq!(ledger.lines().count(), 1);
        assert!(config.db_path().exists());
    }
}
