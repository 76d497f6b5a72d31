//! Ledger sinks.
//!
//! The pipeline hands accepted candidates to a [`LedgerSink`]. Sinks only
//! append, and never hold two entries with the same fingerprint.

use crate::models::{PaymentCandidate, PaymentDirection, PaymentSourceType};
use crate::storage::sqlite::acquire_lock;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

/// Merchant label used in notes when none was extracted.
const UNKNOWN_MERCHANT: &str = "unknown merchant";

/// A ledger transaction created from a payment notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry id.
    pub id: Uuid,
    /// Amount in minor units.
    pub amount_cents: i64,
    /// Money direction.
    pub direction: PaymentDirection,
    /// Merchant as shown to the user (normalized when available).
    pub merchant: Option<String>,
    /// Payment method, if recognised.
    pub payment_method: Option<String>,
    /// Free-text note.
    pub note: String,
    /// Source application identifier.
    pub source_app: String,
    /// Parser family that produced the candidate.
    pub source_type: PaymentSourceType,
    /// Event post time in epoch millis.
    pub post_time_millis: i64,
    /// Final fingerprint the entry was committed under.
    pub fingerprint: String,
    /// Parser confidence; 1.0 for manually confirmed entries.
    pub confidence: f64,
    /// Whether a person confirmed this entry.
    pub confirmed_manually: bool,
}

impl LedgerEntry {
    /// Builds an entry for a committed candidate.
    #[must_use]
    pub fn from_candidate(
        candidate: &PaymentCandidate,
        fingerprint: impl Into<String>,
        confirmed_manually: bool,
    ) -> Self {
        let merchant = candidate
            .normalized_merchant
            .clone()
            .or_else(|| candidate.raw_merchant.clone());
        let note = format!(
            "auto: {} #auto",
            merchant.as_deref().unwrap_or(UNKNOWN_MERCHANT)
        );
        Self {
            id: Uuid::new_v4(),
            amount_cents: candidate.amount_cents,
            direction: candidate.direction,
            merchant,
            payment_method: candidate.payment_method.clone(),
            note,
            source_app: candidate.source_app.clone(),
            source_type: candidate.source_type,
            post_time_millis: candidate.post_time_millis,
            fingerprint: fingerprint.into(),
            confidence: if confirmed_manually {
                1.0
            } else {
                candidate.confidence
            },
            confirmed_manually,
        }
    }
}

/// Destination for accepted entries.
///
/// A sink holds at most one entry per fingerprint: recording a second entry
/// under a fingerprint it already holds writes nothing.
pub trait LedgerSink: Send + Sync {
    /// Appends an entry unless one with the same fingerprint exists.
    ///
    /// Returns `true` when the entry was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry could not be persisted.
    fn record(&self, entry: &LedgerEntry) -> Result<bool>;

    /// Whether an entry with `fingerprint` was recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be read.
    fn contains(&self, fingerprint: &str) -> Result<bool>;
}

struct JsonLinesState<W> {
    writer: W,
    fingerprints: HashSet<String>,
}

/// Writes one JSON object per line to any writer, flushing after each entry.
///
/// # Example
///
/// ```rust
/// use notiledger::services::JsonLinesSink;
///
/// let sink = JsonLinesSink::new(Vec::new());
/// assert!(sink.into_inner().is_empty());
/// ```
pub struct JsonLinesSink<W: Write + Send> {
    state: Mutex<JsonLinesState<W>>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Wraps a writer.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self::with_fingerprints(writer, HashSet::new())
    }

    fn with_fingerprints(writer: W, fingerprints: HashSet<String>) -> Self {
        Self {
            state: Mutex::new(JsonLinesState {
                writer,
                fingerprints,
            }),
        }
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        match self.state.into_inner() {
            Ok(state) => state.writer,
            Err(poisoned) => poisoned.into_inner().writer,
        }
    }
}

impl JsonLinesSink<File> {
    /// Opens `path` for appending, creating it if needed.
    ///
    /// Fingerprints of entries already in the file are loaded so that a
    /// payment recorded by an earlier run is not appended again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be opened.
    pub fn append_to(path: &Path) -> Result<Self> {
        let open_failed = |e: std::io::Error| Error::OperationFailed {
            operation: "open_ledger".to_string(),
            cause: format!("{}: {e}", path.display()),
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(open_failed)?;
        let fingerprints = read_fingerprints(path).map_err(open_failed)?;
        Ok(Self::with_fingerprints(file, fingerprints))
    }
}

/// Fingerprints of the entries stored in a JSON-lines ledger file.
fn read_fingerprints(path: &Path) -> std::io::Result<HashSet<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut fingerprints = HashSet::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LedgerEntry>(&line) {
            Ok(entry) => {
                fingerprints.insert(entry.fingerprint);
            },
            Err(e) => tracing::warn!(line = index + 1, error = %e, "Skipping unreadable ledger line"),
        }
    }
    Ok(fingerprints)
}

impl<W: Write + Send> LedgerSink for JsonLinesSink<W> {
    fn record(&self, entry: &LedgerEntry) -> Result<bool> {
        let mut line = serde_json::to_vec(entry).map_err(|e| Error::OperationFailed {
            operation: "serialize_ledger_entry".to_string(),
            cause: e.to_string(),
        })?;
        line.push(b'\n');

        let mut state = acquire_lock(&self.state);
        if state.fingerprints.contains(&entry.fingerprint) {
            return Ok(false);
        }
        state
            .writer
            .write_all(&line)
            .and_then(|()| state.writer.flush())
            .map_err(|e| Error::OperationFailed {
                operation: "write_ledger_entry".to_string(),
                cause: e.to_string(),
            })?;
        state.fingerprints.insert(entry.fingerprint.clone());
        Ok(true)
    }

    fn contains(&self, fingerprint: &str) -> Result<bool> {
        Ok(acquire_lock(&self.state).fingerprints.contains(fingerprint))
    }
}

/// Keeps entries in memory; for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of all recorded entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<LedgerEntry> {
        acquire_lock(&self.entries).clone()
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        acquire_lock(&self.entries).len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LedgerSink for InMemoryLedger {
    fn record(&self, entry: &LedgerEntry) -> Result<bool> {
        let mut entries = acquire_lock(&self.entries);
        if entries.iter().any(|e| e.fingerprint == entry.fingerprint) {
            return Ok(false);
        }
        entries.push(entry.clone());
        Ok(true)
    }

    fn contains(&self, fingerprint: &str) -> Result<bool> {
        Ok(acquire_lock(&self.entries)
            .iter()
            .any(|e| e.fingerprint == fingerprint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn candidate(merchant: Option<&str>) -> PaymentCandidate {
        PaymentCandidate {
            source_app: "wallet.app".to_string(),
            source_type: PaymentSourceType::Generic,
            parser: "generic".to_string(),
            amount_cents: 2850,
            amount_ambiguous: false,
            direction: PaymentDirection::Expense,
            raw_merchant: merchant.map(ToString::to_string),
            normalized_merchant: merchant.map(ToString::to_string),
            payment_method: Some("balance".to_string()),
            confidence: 0.8,
            raw_text: "paid".to_string(),
            post_time_millis: 1_700_000_000_000,
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_entry_note_and_confidence() {
        let auto = LedgerEntry::from_candidate(&candidate(Some("CoffeeShop")), "fp", false);
        assert_eq!(auto.note, "auto: CoffeeShop #auto");
        assert!((auto.confidence - 0.8).abs() < f64::EPSILON);

        let manual = LedgerEntry::from_candidate(&candidate(None), "fp", true);
        assert_eq!(manual.note, "auto: unknown merchant #auto");
        assert!((manual.confidence - 1.0).abs() < f64::EPSILON);
        assert!(manual.confirmed_manually);
        assert_ne!(auto.id, manual.id);
    }

    #[test]
    fn test_json_lines_sink_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let sink = JsonLinesSink::append_to(&path).unwrap();
        assert!(
            sink.record(&LedgerEntry::from_candidate(&candidate(Some("A")), "fp1", false))
                .unwrap()
        );
        drop(sink);
        let sink = JsonLinesSink::append_to(&path).unwrap();
        assert!(
            sink.record(&LedgerEntry::from_candidate(&candidate(Some("B")), "fp2", false))
                .unwrap()
        );

        let contents = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<LedgerEntry> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].fingerprint, "fp1");
        assert_eq!(entries[1].merchant.as_deref(), Some("B"));
    }

    #[test]
    fn test_json_lines_sink_keeps_one_entry_per_fingerprint() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let sink = JsonLinesSink::append_to(&path).unwrap();
        let entry = LedgerEntry::from_candidate(&candidate(Some("A")), "fp1", false);
        assert!(sink.record(&entry).unwrap());
        assert!(!sink.record(&entry).unwrap());
        drop(sink);

        // A reopened sink remembers what the file already holds.
        let sink = JsonLinesSink::append_to(&path).unwrap();
        assert!(sink.contains("fp1").unwrap());
        let again = LedgerEntry::from_candidate(&candidate(Some("A")), "fp1", true);
        assert!(!sink.record(&again).unwrap());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_in_memory_ledger() {
        let ledger = InMemoryLedger::new();
        assert!(ledger.is_empty());
        let entry = LedgerEntry::from_candidate(&candidate(None), "fp", false);
        assert!(ledger.record(&entry).unwrap());
        assert!(!ledger.record(&entry).unwrap());
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains("fp").unwrap());
        assert!(!ledger.contains("other").unwrap());
        assert_eq!(ledger.entries()[0].fingerprint, "fp");
    }
}
