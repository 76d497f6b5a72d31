//! The decision engine.
//!
//! Evaluation is a chain of steps. Each step either passes or rejects with a
//! [`Rejection`]; `?` short-circuits the chain on the first rejection.
//!
//! ```text
//! validate → policy 1-3 → raw dedup → source mode / blacklist → burst → Process
//!              Filtered   RawDedup       SourceChecked          RateChecked
//! ```
//!
//! The raw dedup and burst steps only run when dedup is enabled. Every
//! decision reads one settings snapshot, taken before the first step.

use super::FingerprintGenerator;
use crate::config::{RuntimeSettings, SharedSettings};
use crate::models::{
    DedupRecord, PaymentCandidate, ProcessDecision, RawNotificationEvent, SkipReason,
};
use crate::parsers::ParserRegistry;
use crate::policy::PolicyFilter;
use crate::storage::DedupStore;
use crate::{Error, Result, current_timestamp_millis};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Why a step stopped the chain.
#[derive(Debug)]
enum Rejection {
    /// Expected rejection; becomes a `Skip` decision.
    Skip(SkipReason),
    /// Unexpected failure; becomes an `Error` decision or escalates.
    Fault(Error),
}

impl From<Error> for Rejection {
    fn from(err: Error) -> Self {
        Self::Fault(err)
    }
}

impl From<SkipReason> for Rejection {
    fn from(reason: SkipReason) -> Self {
        Self::Skip(reason)
    }
}

type Step<T = ()> = std::result::Result<T, Rejection>;

/// Turns an optional skip reason into a step result.
fn reject_if(reason: Option<SkipReason>) -> Step {
    reason.map_or(Ok(()), |reason| Err(Rejection::Skip(reason)))
}

/// Decides, per event, whether it should be parsed and committed.
///
/// The engine holds no per-event state; it can be shared across threads and
/// evaluate events concurrently. The store is the only shared mutable
/// resource, and the only write is [`record_processed`](Self::record_processed).
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use notiledger::{
///     DecisionEngine, ParserRegistry, RawNotificationEvent, RuntimeSettings, SharedSettings,
///     SqliteDedupStore,
/// };
///
/// let engine = DecisionEngine::new(
///     Arc::new(SqliteDedupStore::in_memory()?),
///     Arc::new(ParserRegistry::with_default_parsers()),
///     Arc::new(SharedSettings::new(RuntimeSettings::default())),
/// );
///
/// let event = RawNotificationEvent::new("wallet.app", 1_700_000_000_000)
///     .with_body("paid to CoffeeShop 28.50");
/// assert!(engine.evaluate(&event)?.is_process());
/// # Ok::<(), notiledger::Error>(())
/// ```
pub struct DecisionEngine<S: DedupStore> {
    store: Arc<S>,
    parsers: Arc<ParserRegistry>,
    policy: PolicyFilter,
    settings: Arc<SharedSettings>,
}

impl<S: DedupStore> DecisionEngine<S> {
    /// Creates an engine with the default policy tables.
    #[must_use]
    pub fn new(store: Arc<S>, parsers: Arc<ParserRegistry>, settings: Arc<SharedSettings>) -> Self {
        Self {
            store,
            parsers,
            policy: PolicyFilter::default(),
            settings,
        }
    }

    /// Replaces the policy filter.
    #[must_use]
    pub const fn with_policy(mut self, policy: PolicyFilter) -> Self {
        self.policy = policy;
        self
    }

    /// The dedup store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The parser registry.
    #[must_use]
    pub const fn parsers(&self) -> &Arc<ParserRegistry> {
        &self.parsers
    }

    /// The settings holder.
    #[must_use]
    pub const fn settings(&self) -> &Arc<SharedSettings> {
        &self.settings
    }

    /// Evaluates an event against the current settings.
    ///
    /// # Errors
    ///
    /// Returns `Err` only for fatal store failures ([`Error::StorageCorrupted`]).
    /// Every other failure is reported as [`ProcessDecision::Error`].
    pub fn evaluate(&self, event: &RawNotificationEvent) -> Result<ProcessDecision> {
        let settings = self.settings.snapshot();
        self.evaluate_with_settings(event, &settings)
    }

    /// Evaluates an event against an explicit settings snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Err` only for fatal store failures.
    #[instrument(
        skip(self, event, settings),
        fields(
            operation = "evaluate",
            source = %event.source_app(),
            text_length = event.combined_text().len()
        )
    )]
    pub fn evaluate_with_settings(
        &self,
        event: &RawNotificationEvent,
        settings: &RuntimeSettings,
    ) -> Result<ProcessDecision> {
        let start = Instant::now();

        let decision = match self.run_steps(event, settings) {
            Ok(fingerprint) => {
                tracing::debug!(fingerprint = %fingerprint, "Event accepted for parsing");
                ProcessDecision::Process(fingerprint)
            },
            Err(Rejection::Skip(reason)) => {
                tracing::info!(
                    reason = %reason,
                    stage = %reason.stage(),
                    "Event skipped"
                );
                ProcessDecision::Skip(reason)
            },
            Err(Rejection::Fault(err)) if err.is_fatal() => {
                tracing::error!(error = %err, "Fatal store failure during evaluation");
                metrics::counter!(
                    "notiledger_decisions_total",
                    "decision" => "fatal",
                    "reason" => "storage_corrupted"
                )
                .increment(1);
                return Err(err);
            },
            Err(Rejection::Fault(err)) => {
                tracing::warn!(error = %err, "Evaluation failed");
                ProcessDecision::Error(err.to_string())
            },
        };

        let reason = match &decision {
            ProcessDecision::Process(_) => "accepted",
            ProcessDecision::Skip(reason) => reason.label(),
            ProcessDecision::Error(_) => "error",
        };
        metrics::counter!(
            "notiledger_decisions_total",
            "decision" => decision.as_str(),
            "reason" => reason
        )
        .increment(1);
        metrics::histogram!("notiledger_decision_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        Ok(decision)
    }

    fn run_steps(&self, event: &RawNotificationEvent, settings: &RuntimeSettings) -> Step<String> {
        Self::validate(event)?;
        reject_if(self.policy.check_static(event))?;

        let window_secs = settings.dedup.window_secs();
        let guess = self.parsers.guess(event);
        let provisional = FingerprintGenerator::provisional(event, guess.as_ref(), window_secs);

        if settings.dedup.enabled {
            self.check_raw_text(event, window_secs)?;
            self.check_provisional(&provisional, window_secs)?;
        }

        reject_if(PolicyFilter::check_source(
            event,
            settings.source_rule(event.source_app()),
        ))?;

        if settings.dedup.enabled {
            self.check_burst(event, window_secs, settings.dedup.burst_ceiling())?;
        }

        Ok(provisional)
    }

    fn validate(event: &RawNotificationEvent) -> Step {
        if event.source_app().trim().is_empty() {
            return Err(Error::InvalidInput("event has an empty source app".to_string()).into());
        }
        Ok(())
    }

    /// Same normalized text from the same source inside the window.
    fn check_raw_text(&self, event: &RawNotificationEvent, window_secs: u32) -> Step {
        let text_hash = FingerprintGenerator::raw_text_hash(event);
        let nearby =
            self.store
                .find_in_window(event.source_app(), event.post_time_millis(), window_secs)?;

        match nearby.iter().find(|record| record.text_hash == text_hash) {
            Some(record) => Err(SkipReason::DuplicateText {
                delta_ms: event.post_time_millis() - record.post_time,
                window_secs,
            }
            .into()),
            None => Ok(()),
        }
    }

    fn check_provisional(&self, provisional: &str, window_secs: u32) -> Step {
        if self.store.exists(provisional)? {
            return Err(SkipReason::ProvisionalKeyExists {
                fingerprint: provisional.to_string(),
                window_secs,
            }
            .into());
        }
        Ok(())
    }

    fn check_burst(&self, event: &RawNotificationEvent, window_secs: u32, ceiling: u64) -> Step {
        let count =
            self.store
                .count_in_window(event.source_app(), event.post_time_millis(), window_secs)?;
        if count >= ceiling {
            return Err(SkipReason::Burst { count, window_secs }.into());
        }
        Ok(())
    }

    /// Commits a parsed candidate under its final fingerprint.
    ///
    /// Returns `true` only when this call wrote the record; `false` means a
    /// record with the same fingerprint already existed.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the insert fails.
    pub fn record_processed(&self, candidate: &PaymentCandidate) -> Result<bool> {
        let settings = self.settings.snapshot();
        self.record_processed_with_settings(candidate, &settings)
            .map(|(_, inserted)| inserted)
    }

    /// Commits a candidate using an explicit snapshot's window.
    ///
    /// Returns the stored record and whether this call inserted it.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the insert fails.
    #[instrument(
        skip(self, candidate, settings),
        fields(operation = "record_processed", source = %candidate.source_app)
    )]
    pub fn record_processed_with_settings(
        &self,
        candidate: &PaymentCandidate,
        settings: &RuntimeSettings,
    ) -> Result<(DedupRecord, bool)> {
        let record = FingerprintGenerator::record_for(
            candidate,
            settings.dedup.window_secs(),
            current_timestamp_millis(),
        );

        let inserted = self.store.insert(&record)?.is_inserted();
        let outcome = if inserted { "inserted" } else { "duplicate" };
        metrics::counter!("notiledger_commits_total", "outcome" => outcome).increment(1);
        tracing::debug!(fingerprint = %record.fingerprint, outcome, "Commit finished");

        Ok((record, inserted))
    }
}
