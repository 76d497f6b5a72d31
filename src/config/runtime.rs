//! Runtime settings snapshots.
//!
//! The decision engine never reads configuration fields piecemeal. It takes
//! one [`Arc<RuntimeSettings>`] per decision from [`SharedSettings`], so a
//! concurrent [`SharedSettings::replace`] never splits a decision across two
//! configurations.

use super::SourceRule;
use crate::parsers::ConfidenceWeights;
use crate::services::DedupConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Default confidence needed to record without confirmation.
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 0.6;
/// Default smallest amount recorded without confirmation, in minor units.
pub const DEFAULT_MIN_AUTO_AMOUNT_CENTS: i64 = 20;

/// Commit-stage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Candidates below this confidence need confirmation.
    pub acceptance_threshold: f64,
    /// When false every parsed candidate needs confirmation.
    pub auto_record: bool,
    /// Candidates below this amount need confirmation.
    pub min_auto_amount_cents: i64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            auto_record: true,
            min_auto_amount_cents: DEFAULT_MIN_AUTO_AMOUNT_CENTS,
        }
    }
}

impl PipelineSettings {
    /// Whether a candidate with this confidence and amount may be recorded
    /// without confirmation.
    #[must_use]
    pub fn auto_accepts(&self, confidence: f64, amount_cents: i64) -> bool {
        self.auto_record
            && confidence >= self.acceptance_threshold
            && amount_cents >= self.min_auto_amount_cents
    }
}

/// Everything a single decision reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeSettings {
    /// Dedup window, burst ceiling and master switch.
    pub dedup: DedupConfig,
    /// Confidence weights handed to parsers.
    pub confidence: ConfidenceWeights,
    /// Commit-stage settings.
    pub pipeline: PipelineSettings,
    /// Per-source rules keyed by app id.
    pub sources: HashMap<String, SourceRule>,
}

impl RuntimeSettings {
    /// Rule for a source, if one is configured.
    #[must_use]
    pub fn source_rule(&self, source_app: &str) -> Option<&SourceRule> {
        self.sources.get(source_app)
    }

    /// Builder method to set the dedup configuration.
    #[must_use]
    pub const fn with_dedup(mut self, dedup: DedupConfig) -> Self {
        self.dedup = dedup;
        self
    }

    /// Builder method to set the pipeline settings.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: PipelineSettings) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Builder method to add or replace a source rule.
    #[must_use]
    pub fn with_source(mut self, source_app: impl Into<String>, rule: SourceRule) -> Self {
        self.sources.insert(source_app.into(), rule);
        self
    }
}

/// Hot-swappable holder of the current [`RuntimeSettings`].
///
/// # Example
///
/// ```rust
/// use notiledger::{RuntimeSettings, SharedSettings, SourceRule};
///
/// let shared = SharedSettings::new(RuntimeSettings::default());
/// let before = shared.snapshot();
/// shared.replace(RuntimeSettings::default().with_source("wallet.app", SourceRule::disabled()));
///
/// assert!(before.source_rule("wallet.app").is_none());
/// assert!(shared.snapshot().source_rule("wallet.app").is_some());
/// ```
#[derive(Debug, Default)]
pub struct SharedSettings {
    current: RwLock<Arc<RuntimeSettings>>,
}

impl SharedSettings {
    /// Creates a holder with initial settings.
    #[must_use]
    pub fn new(settings: RuntimeSettings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
        }
    }

    /// The settings in effect right now.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RuntimeSettings> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => {
                tracing::warn!("Settings lock was poisoned, recovering");
                Arc::clone(&poisoned.into_inner())
            },
        }
    }

    /// Atomically swaps in new settings. Decisions already in flight keep
    /// the snapshot they started with.
    pub fn replace(&self, settings: RuntimeSettings) {
        let next = Arc::new(settings);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => {
                tracing::warn!("Settings lock was poisoned, recovering");
                *poisoned.into_inner() = next;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceMode;
    use test_case::test_case;

    #[test_case(true, 0.6, 20, true ; "at thresholds")]
    #[test_case(true, 0.59, 2850, false ; "low confidence")]
    #[test_case(true, 0.9, 19, false ; "tiny amount")]
    #[test_case(false, 1.0, 100_000, false ; "auto record off")]
    fn test_auto_accepts(auto_record: bool, confidence: f64, amount: i64, expected: bool) {
        let settings = PipelineSettings {
            auto_record,
            ..PipelineSettings::default()
        };
        assert_eq!(settings.auto_accepts(confidence, amount), expected);
    }

    #[test]
    fn test_snapshot_is_stable_across_replace() {
        let shared = SharedSettings::new(
            RuntimeSettings::default().with_dedup(DedupConfig::default().with_window_secs(5)),
        );
        let snapshot = shared.snapshot();
        shared.replace(
            RuntimeSettings::default().with_dedup(DedupConfig::default().with_window_secs(60)),
        );
        assert_eq!(snapshot.dedup.window_secs(), 5);
        assert_eq!(shared.snapshot().dedup.window_secs(), 60);
    }

    #[test]
    fn test_source_rule_lookup() {
        let settings = RuntimeSettings::default()
            .with_source("a.app", SourceRule::new(SourceMode::Enabled, ["x"]));
        assert_eq!(settings.source_rule("a.app").map(|r| r.blacklist().len()), Some(1));
        assert!(settings.source_rule("b.app").is_none());
    }
}
