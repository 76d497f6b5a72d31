//! Notification-to-ledger pipeline.
//!
//! Drives one event through the whole state machine:
//!
//! ```text
//! evaluate ─► parse ─► parsed dedup ─► commit ─► auto-accept? ─► sink
//!    │          │           │            │             │
//!  Skip/Error  Failed/   ExistingRecord  lost race   NeedsConfirmation
//!            Unsupported
//! ```
//!
//! The commit (claiming the final fingerprint in the dedup store) happens
//! before the sink write, so two concurrent events for the same payment can
//! never both reach the ledger. Nothing is written for events rejected
//! before the commit.

use super::deduplication::ContentHasher;
use super::{DecisionEngine, FingerprintGenerator, LedgerEntry, LedgerSink};
use crate::config::{RuntimeSettings, SharedSettings};
use crate::models::{PaymentCandidate, ProcessDecision, RawNotificationEvent, SkipReason};
use crate::parsers::{ParseOutcome, ParserRegistry};
use crate::storage::DedupStore;
use crate::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// A ledger entry was written.
    Recorded {
        /// The written entry.
        entry: LedgerEntry,
    },
    /// The payment was committed but needs a person to confirm it.
    NeedsConfirmation {
        /// Candidate to show the user.
        candidate: PaymentCandidate,
        /// Final fingerprint it was committed under.
        fingerprint: String,
    },
    /// Filtered, duplicate or not a payment.
    Skipped {
        /// Why.
        reason: SkipReason,
    },
    /// Looked like a payment but could not be parsed.
    ParseFailed {
        /// Parser explanation.
        reason: String,
    },
    /// No parser claims the source.
    Unsupported {
        /// The unclaimed source.
        source: String,
    },
    /// Unexpected, non-fatal failure.
    Error {
        /// Failure description.
        message: String,
    },
}

impl PipelineOutcome {
    /// Returns the outcome kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recorded { .. } => "recorded",
            Self::NeedsConfirmation { .. } => "needs_confirmation",
            Self::Skipped { .. } => "skipped",
            Self::ParseFailed { .. } => "parse_failed",
            Self::Unsupported { .. } => "unsupported",
            Self::Error { .. } => "error",
        }
    }

    /// The skip reason, for `Skipped` outcomes.
    #[must_use]
    pub const fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Self::Skipped { reason } => Some(reason),
            _ => None,
        }
    }

    /// The written entry, for `Recorded` outcomes.
    #[must_use]
    pub const fn entry(&self) -> Option<&LedgerEntry> {
        match self {
            Self::Recorded { entry } => Some(entry),
            _ => None,
        }
    }

    fn from_error(err: Error) -> Result<Self> {
        if err.is_fatal() {
            return Err(err);
        }
        tracing::warn!(error = %err, "Pipeline step failed");
        Ok(Self::Error {
            message: err.to_string(),
        })
    }
}

/// Evaluates, parses, commits and records notifications.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use notiledger::services::InMemoryLedger;
/// use notiledger::{LedgerPipeline, RawNotificationEvent, SqliteDedupStore};
///
/// let ledger = Arc::new(InMemoryLedger::new());
/// let pipeline = LedgerPipeline::with_defaults(
///     Arc::new(SqliteDedupStore::in_memory()?),
///     Arc::clone(&ledger),
/// );
///
/// let event = RawNotificationEvent::new("com.eg.android.AlipayGphone", 1_700_000_000_000)
///     .with_body("你已成功向【星巴克咖啡】付款28.50元");
/// assert_eq!(pipeline.process(&event)?.as_str(), "recorded");
/// assert_eq!(pipeline.process(&event)?.as_str(), "skipped");
/// assert_eq!(ledger.len(), 1);
/// # Ok::<(), notiledger::Error>(())
/// ```
pub struct LedgerPipeline<S: DedupStore, L: LedgerSink> {
    engine: DecisionEngine<S>,
    sink: Arc<L>,
}

impl<S: DedupStore, L: LedgerSink> LedgerPipeline<S, L> {
    /// Creates a pipeline from an engine and a sink.
    #[must_use]
    pub const fn new(engine: DecisionEngine<S>, sink: Arc<L>) -> Self {
        Self { engine, sink }
    }

    /// Default parsers and default settings over `store`.
    #[must_use]
    pub fn with_defaults(store: Arc<S>, sink: Arc<L>) -> Self {
        let engine = DecisionEngine::new(
            store,
            Arc::new(ParserRegistry::with_default_parsers()),
            Arc::new(SharedSettings::new(RuntimeSettings::default())),
        );
        Self::new(engine, sink)
    }

    /// The decision engine.
    #[must_use]
    pub const fn engine(&self) -> &DecisionEngine<S> {
        &self.engine
    }

    /// Runs one event through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `Err` only for fatal store failures; everything else is an
    /// outcome.
    #[instrument(
        skip(self, event),
        fields(operation = "process", source = %event.source_app())
    )]
    pub fn process(&self, event: &RawNotificationEvent) -> Result<PipelineOutcome> {
        let settings = self.engine.settings().snapshot();

        let outcome = match self.engine.evaluate_with_settings(event, &settings)? {
            ProcessDecision::Process(_) => self.parse_and_commit(event, &settings)?,
            ProcessDecision::Skip(reason) => PipelineOutcome::Skipped { reason },
            ProcessDecision::Error(message) => PipelineOutcome::Error { message },
        };

        tracing::debug!(outcome = outcome.as_str(), "Pipeline finished");
        Ok(outcome)
    }

    fn parse_and_commit(
        &self,
        event: &RawNotificationEvent,
        settings: &RuntimeSettings,
    ) -> Result<PipelineOutcome> {
        let parsed = match self.engine.parsers().parse(event, &settings.confidence) {
            Ok(parsed) => parsed,
            Err(err) => return PipelineOutcome::from_error(err),
        };

        let candidate = match parsed {
            ParseOutcome::Parsed(candidate) => candidate,
            ParseOutcome::Skipped(detail) => {
                return Ok(PipelineOutcome::Skipped {
                    reason: SkipReason::NotAPayment { detail },
                });
            },
            ParseOutcome::Failed(reason) => return Ok(PipelineOutcome::ParseFailed { reason }),
            ParseOutcome::Unsupported(source) => {
                return Ok(PipelineOutcome::Unsupported { source });
            },
        };

        let fingerprint =
            FingerprintGenerator::for_candidate(&candidate, settings.dedup.window_secs());
        match self.engine.store().find_by_fingerprint(&fingerprint) {
            Ok(Some(existing)) => {
                return Ok(Self::existing(&candidate, fingerprint, existing.post_time));
            },
            Ok(None) => {},
            Err(err) => return PipelineOutcome::from_error(err),
        }

        let (record, inserted) = match self
            .engine
            .record_processed_with_settings(&candidate, settings)
        {
            Ok(committed) => committed,
            Err(err) => return PipelineOutcome::from_error(err),
        };
        if !inserted {
            // Lost the insert race to a concurrent event for the same payment.
            let post_time = self
                .engine
                .store()
                .find_by_fingerprint(&record.fingerprint)
                .ok()
                .flatten()
                .map_or(record.post_time, |existing| existing.post_time);
            return Ok(Self::existing(&candidate, record.fingerprint, post_time));
        }

        if !settings
            .pipeline
            .auto_accepts(candidate.confidence, candidate.amount_cents)
        {
            tracing::info!(
                fingerprint = %record.fingerprint,
                confidence = candidate.confidence,
                "Candidate needs confirmation"
            );
            return Ok(PipelineOutcome::NeedsConfirmation {
                candidate,
                fingerprint: record.fingerprint,
            });
        }

        let entry = LedgerEntry::from_candidate(&candidate, record.fingerprint, false);
        match self.sink.record(&entry) {
            Ok(false) => Ok(Self::existing(
                &candidate,
                entry.fingerprint,
                record.post_time,
            )),
            Ok(true) => {
                tracing::info!(
                    entry_id = %entry.id,
                    amount_cents = entry.amount_cents,
                    direction = %entry.direction,
                    "Ledger entry recorded"
                );
                Ok(PipelineOutcome::Recorded { entry })
            },
            Err(err) => PipelineOutcome::from_error(err),
        }
    }

    fn existing(
        candidate: &PaymentCandidate,
        fingerprint: String,
        stored_post_time: i64,
    ) -> PipelineOutcome {
        let reason = SkipReason::ExistingRecord {
            fingerprint,
            delta_ms: candidate.post_time_millis - stored_post_time,
        };
        tracing::info!(reason = %reason, "Event skipped");
        metrics::counter!(
            "notiledger_decisions_total",
            "decision" => "skip",
            "reason" => reason.label()
        )
        .increment(1);
        PipelineOutcome::Skipped { reason }
    }

    /// Writes a candidate that was returned as `NeedsConfirmation`.
    ///
    /// `fingerprint` is the one returned with the outcome. The candidate must
    /// match the record committed under it. Confirming a payment that is
    /// already in the ledger writes nothing and returns `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if nothing was committed under
    /// `fingerprint` or the candidate disagrees with the committed record,
    /// and the store's or sink's error if either fails.
    #[instrument(
        skip(self, candidate),
        fields(operation = "confirm", source = %candidate.source_app)
    )]
    pub fn confirm(
        &self,
        candidate: &PaymentCandidate,
        fingerprint: &str,
    ) -> Result<Option<LedgerEntry>> {
        let Some(record) = self.engine.store().find_by_fingerprint(fingerprint)? else {
            return Err(Error::InvalidInput(format!(
                "no committed payment with fingerprint {fingerprint}"
            )));
        };
        let matches = record.source_app == candidate.source_app
            && record.amount_cents == candidate.amount_cents
            && record.merchant_hash == ContentHasher::merchant_hash(candidate.identity_merchant());
        if !matches {
            return Err(Error::InvalidInput(format!(
                "candidate does not match the payment committed as {fingerprint}"
            )));
        }

        let entry = LedgerEntry::from_candidate(candidate, fingerprint, true);
        if !self.sink.record(&entry)? {
            tracing::info!(fingerprint, "Payment already in the ledger, confirmation ignored");
            return Ok(None);
        }
        tracing::info!(entry_id = %entry.id, "Confirmed ledger entry recorded");
        Ok(Some(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineSettings;
    use crate::services::InMemoryLedger;
    use crate::storage::SqliteDedupStore;

    const T: i64 = 1_700_000_000_000;

    fn pipeline_with(
        settings: RuntimeSettings,
    ) -> (LedgerPipeline<SqliteDedupStore, InMemoryLedger>, Arc<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::new());
        let engine = DecisionEngine::new(
            Arc::new(SqliteDedupStore::in_memory().unwrap()),
            Arc::new(ParserRegistry::with_default_parsers()),
            Arc::new(SharedSettings::new(settings)),
        );
        (LedgerPipeline::new(engine, Arc::clone(&ledger)), ledger)
    }

    fn wallet(body: &str, post_time: i64) -> RawNotificationEvent {
        RawNotificationEvent::new("wallet.app", post_time).with_body(body)
    }

    #[test]
    fn test_rephrased_repeat_cites_existing_record() {
        let (pipeline, ledger) = pipeline_with(RuntimeSettings::default());

        let a = pipeline.process(&wallet("paid to CoffeeShop 28.50", T)).unwrap();
        let fingerprint = a.entry().unwrap().fingerprint.clone();

        let b = pipeline
            .process(&wallet("payment successful, CoffeeShop, ¥28.50", T + 5_000))
            .unwrap();
        match b.skip_reason() {
            Some(SkipReason::ProvisionalKeyExists { fingerprint: fp, .. }) => {
                assert_eq!(*fp, fingerprint);
            },
            Some(SkipReason::ExistingRecord { fingerprint: fp, .. }) => {
                assert_eq!(*fp, fingerprint);
            },
            other => panic!("expected existing-record skip, got {other:?}"),
        }
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_low_confidence_needs_confirmation_then_confirm() {
        let settings = RuntimeSettings::default().with_pipeline(PipelineSettings {
            acceptance_threshold: 0.95,
            ..PipelineSettings::default()
        });
        let (pipeline, ledger) = pipeline_with(settings);

        let outcome = pipeline.process(&wallet("paid to CoffeeShop 28.50", T)).unwrap();
        let PipelineOutcome::NeedsConfirmation {
            candidate,
            fingerprint,
        } = outcome
        else {
            panic!("expected confirmation, got {outcome:?}");
        };
        assert!(ledger.is_empty());
        assert!(pipeline.engine().store().exists(&fingerprint).unwrap());

        let entry = pipeline.confirm(&candidate, &fingerprint).unwrap().unwrap();
        assert_eq!(entry.fingerprint, fingerprint);
        assert!(entry.confirmed_manually);
        assert_eq!(ledger.len(), 1);
    }

    fn needs_confirmation(
        pipeline: &LedgerPipeline<SqliteDedupStore, InMemoryLedger>,
    ) -> (PaymentCandidate, String) {
        match pipeline.process(&wallet("paid to CoffeeShop 28.50", T)).unwrap() {
            PipelineOutcome::NeedsConfirmation {
                candidate,
                fingerprint,
            } => (candidate, fingerprint),
            other => panic!("expected confirmation, got {other:?}"),
        }
    }

    fn strict_settings() -> RuntimeSettings {
        RuntimeSettings::default().with_pipeline(PipelineSettings {
            acceptance_threshold: 0.95,
            ..PipelineSettings::default()
        })
    }

    #[test]
    fn test_repeated_confirm_records_once() {
        let (pipeline, ledger) = pipeline_with(strict_settings());
        let (candidate, fingerprint) = needs_confirmation(&pipeline);

        assert!(pipeline.confirm(&candidate, &fingerprint).unwrap().is_some());
        assert!(pipeline.confirm(&candidate, &fingerprint).unwrap().is_none());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_confirm_rejects_uncommitted_or_altered_candidate() {
        let (pipeline, ledger) = pipeline_with(strict_settings());
        let (candidate, fingerprint) = needs_confirmation(&pipeline);

        let err = pipeline.confirm(&candidate, "v1|wallet.app|EXPENSE|1|x|1").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let mut altered = candidate;
        altered.amount_cents = 9999;
        let err = pipeline.confirm(&altered, &fingerprint).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        assert!(ledger.is_empty());
        assert_eq!(pipeline.engine().store().stats().unwrap().total_records, 1);
    }

    #[test]
    fn test_confirm_uses_committed_fingerprint_after_window_change() {
        let (pipeline, ledger) = pipeline_with(strict_settings());
        let (candidate, fingerprint) = needs_confirmation(&pipeline);

        let wider = RuntimeSettings::default()
            .with_dedup(crate::DedupConfig::default().with_window_secs(120));
        pipeline.engine().settings().replace(wider);

        let entry = pipeline.confirm(&candidate, &fingerprint).unwrap().unwrap();
        assert_eq!(entry.fingerprint, fingerprint);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_parse_failure_writes_nothing() {
        let (pipeline, ledger) = pipeline_with(RuntimeSettings::default());
        let outcome = pipeline.process(&wallet("Your balance is 28.50", T)).unwrap();
        assert_eq!(outcome.as_str(), "parse_failed");
        assert_eq!(pipeline.engine().store().stats().unwrap().total_records, 0);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_not_a_payment_is_skipped() {
        let (pipeline, _ledger) = pipeline_with(RuntimeSettings::default());
        let outcome = pipeline
            .process(&wallet("Your verification code is 123456", T))
            .unwrap();
        assert!(matches!(
            outcome.skip_reason(),
            Some(SkipReason::NotAPayment { .. })
        ));
    }

    #[test]
    fn test_unsupported_without_fallback() {
        let ledger = Arc::new(InMemoryLedger::new());
        let engine = DecisionEngine::new(
            Arc::new(SqliteDedupStore::in_memory().unwrap()),
            Arc::new(ParserRegistry::new()),
            Arc::new(SharedSettings::default()),
        );
        let pipeline = LedgerPipeline::new(engine, ledger);
        let outcome = pipeline.process(&wallet("paid to X 1.00", T)).unwrap();
        assert_eq!(
            outcome,
            PipelineOutcome::Unsupported {
                source: "wallet.app".to_string()
            }
        );
    }

    #[test]
    fn test_small_amount_needs_confirmation() {
        let (pipeline, ledger) = pipeline_with(RuntimeSettings::default());
        let outcome = pipeline.process(&wallet("paid to CoffeeShop 0.10", T)).unwrap();
        assert_eq!(outcome.as_str(), "needs_confirmation");
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(PipelineOutcome::ParseFailed {
            reason: "no amount found".to_string(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "parse_failed");
        assert_eq!(json["reason"], "no amount found");
    }
}
