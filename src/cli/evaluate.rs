//! Evaluate CLI command.
//!
//! Runs the decision engine (policy, raw dedup, burst) on a single
//! notification built from arguments. Nothing is committed: evaluation is a
//! read-only question against the dedup store.

use super::write_json_line;
use crate::Result;
use crate::config::{NotiledgerConfig, SharedSettings};
use crate::models::{ProcessDecision, RawNotificationEvent};
use crate::parsers::ParserRegistry;
use crate::services::DecisionEngine;
use crate::storage::DedupStore;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;

/// Arguments for `evaluate`.
#[derive(Debug, Clone, Default)]
pub struct EvaluateArgs {
    /// Source application identifier.
    pub source: String,
    /// Notification title.
    pub title: Option<String>,
    /// Notification body.
    pub body: Option<String>,
    /// Post time in epoch millis; now when absent.
    pub time: Option<i64>,
    /// Whether the notification is a group summary.
    pub group_summary: bool,
}

impl EvaluateArgs {
    /// Builds the event these arguments describe.
    #[must_use]
    pub fn to_event(&self, now_millis: i64) -> RawNotificationEvent {
        let mut event = RawNotificationEvent::new(&self.source, self.time.unwrap_or(now_millis))
            .with_group_summary(self.group_summary);
        if let Some(title) = &self.title {
            event = event.with_title(title);
        }
        if let Some(body) = &self.body {
            event = event.with_body(body);
        }
        event
    }
}

#[derive(Debug, Serialize)]
struct EvaluateReport<'a> {
    source: &'a str,
    post_time_millis: i64,
    decision: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fingerprint: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl<'a> EvaluateReport<'a> {
    fn new(event: &'a RawNotificationEvent, decision: &'a ProcessDecision) -> Self {
        let stage = match decision {
            ProcessDecision::Skip(reason) => Some(reason.stage().as_str()),
            _ => None,
        };
        Self {
            source: event.source_app(),
            post_time_millis: event.post_time_millis(),
            decision: decision.as_str(),
            fingerprint: decision.fingerprint(),
            stage,
            reason: decision.reason(),
        }
    }
}

/// Evaluates one notification and prints the decision as JSON.
///
/// # Errors
///
/// Returns an error for fatal store failures or if output fails.
pub fn cmd_evaluate<S: DedupStore, W: Write>(
    config: &NotiledgerConfig,
    store: Arc<S>,
    args: &EvaluateArgs,
    writer: &mut W,
) -> Result<ProcessDecision> {
    let engine = DecisionEngine::new(
        store,
        Arc::new(ParserRegistry::with_default_parsers()),
        Arc::new(SharedSettings::new(config.runtime_settings())),
    );
    let event = args.to_event(crate::current_timestamp_millis());
    let decision = engine.evaluate(&event)?;
    write_json_line(writer, &EvaluateReport::new(&event, &decision))?;
    Ok(decision)
}
