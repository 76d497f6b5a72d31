//! Per-event decisions.
//!
//! A decision is produced fresh for every event and never persisted. Skip
//! reasons are typed so callers can branch on them; their `Display` output is
//! the human-readable reason string carried in logs and CLI output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage an event reached before it was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Event entered the pipeline.
    Received,
    /// Static policy checks (source blacklist, order keywords, group summary).
    Filtered,
    /// Raw-text window and provisional fingerprint checks.
    RawDedupChecked,
    /// Per-source mode and custom blacklist.
    SourceChecked,
    /// Parser ran.
    Parsed,
    /// Final fingerprint looked up.
    ParsedDedupChecked,
    /// Burst protection.
    RateChecked,
    /// Passed every check.
    Accepted,
}

impl Stage {
    /// Returns the stage as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Filtered => "filtered",
            Self::RawDedupChecked => "raw_dedup_checked",
            Self::SourceChecked => "source_checked",
            Self::Parsed => "parsed",
            Self::ParsedDedupChecked => "parsed_dedup_checked",
            Self::RateChecked => "rate_checked",
            Self::Accepted => "accepted",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an event was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Source app is on the static shopping-app blacklist.
    BlacklistedSource {
        /// The rejected source.
        source: String,
    },
    /// Text reads like an order or shipping update.
    OrderKeyword {
        /// Keyword that matched.
        keyword: String,
    },
    /// Group summary outside the messaging-app allow-list.
    GroupSummary,
    /// The user disabled this source.
    SourceDisabled {
        /// The disabled source.
        source: String,
    },
    /// Text hit the source's custom blacklist.
    CustomBlacklist {
        /// Keyword that matched.
        keyword: String,
    },
    /// Same text from the same source already recorded within the window.
    DuplicateText {
        /// Signed distance to the matching record's post time.
        delta_ms: i64,
        /// Window in effect.
        window_secs: u32,
    },
    /// Provisional fingerprint already recorded.
    ProvisionalKeyExists {
        /// The provisional fingerprint.
        fingerprint: String,
        /// Window in effect.
        window_secs: u32,
    },
    /// The owning parser recognised the text as something other than a payment.
    NotAPayment {
        /// Parser explanation.
        detail: String,
    },
    /// Final parsed fingerprint already recorded.
    ExistingRecord {
        /// The final fingerprint.
        fingerprint: String,
        /// Signed distance to the stored record's post time.
        delta_ms: i64,
    },
    /// Too many records from this source inside the window.
    Burst {
        /// Records counted in the window.
        count: u64,
        /// Window in effect.
        window_secs: u32,
    },
}

impl SkipReason {
    /// Stage that produced this reason.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::BlacklistedSource { .. } | Self::OrderKeyword { .. } | Self::GroupSummary => {
                Stage::Filtered
            },
            Self::DuplicateText { .. } | Self::ProvisionalKeyExists { .. } => {
                Stage::RawDedupChecked
            },
            Self::SourceDisabled { .. } | Self::CustomBlacklist { .. } => Stage::SourceChecked,
            Self::NotAPayment { .. } => Stage::Parsed,
            Self::ExistingRecord { .. } => Stage::ParsedDedupChecked,
            Self::Burst { .. } => Stage::RateChecked,
        }
    }

    /// Short label for metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::BlacklistedSource { .. } => "blacklisted_source",
            Self::OrderKeyword { .. } => "order_keyword",
            Self::GroupSummary => "group_summary",
            Self::SourceDisabled { .. } => "source_disabled",
            Self::CustomBlacklist { .. } => "custom_blacklist",
            Self::DuplicateText { .. } => "duplicate_text",
            Self::ProvisionalKeyExists { .. } => "provisional_key_exists",
            Self::NotAPayment { .. } => "not_a_payment",
            Self::ExistingRecord { .. } => "existing_record",
            Self::Burst { .. } => "burst",
        }
    }

    /// True for the duplicate family (as opposed to policy filtering).
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(
            self,
            Self::DuplicateText { .. }
                | Self::ProvisionalKeyExists { .. }
                | Self::ExistingRecord { .. }
                | Self::Burst { .. }
        )
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlacklistedSource { source } => write!(f, "blacklisted source: {source}"),
            Self::OrderKeyword { keyword } => write!(f, "order notification (keyword '{keyword}')"),
            Self::GroupSummary => write!(f, "group summary notification"),
            Self::SourceDisabled { source } => write!(f, "source disabled: {source}"),
            Self::CustomBlacklist { keyword } => write!(f, "custom blacklist hit: '{keyword}'"),
            Self::DuplicateText {
                delta_ms,
                window_secs,
            } => write!(
                f,
                "dedup_within_window(delta={delta_ms}ms,window={window_secs}s)"
            ),
            Self::ProvisionalKeyExists {
                fingerprint,
                window_secs,
            } => write!(
                f,
                "dedup_event_key_exists(key={fingerprint},window={window_secs}s)"
            ),
            Self::NotAPayment { detail } => write!(f, "{detail}"),
            Self::ExistingRecord {
                fingerprint,
                delta_ms,
            } => write!(
                f,
                "existing_record(key={fingerprint},delta={delta_ms}ms)"
            ),
            Self::Burst { count, window_secs } => write!(
                f,
                "too_many_events_in_window(window={window_secs}s,count={count})"
            ),
        }
    }
}

/// Outcome of evaluating one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "detail", rename_all = "snake_case")]
pub enum ProcessDecision {
    /// Continue to parsing with this provisional fingerprint.
    Process(String),
    /// Do not record this event.
    Skip(SkipReason),
    /// An unexpected failure; the event produced no record.
    Error(String),
}

impl ProcessDecision {
    /// Returns the decision kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Process(_) => "process",
            Self::Skip(_) => "skip",
            Self::Error(_) => "error",
        }
    }

    /// Provisional fingerprint when the decision is `Process`.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        match self {
            Self::Process(fingerprint) => Some(fingerprint),
            _ => None,
        }
    }

    /// Human-readable reason for `Skip` and `Error` decisions.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Process(_) => None,
            Self::Skip(reason) => Some(reason.to_string()),
            Self::Error(message) => Some(message.clone()),
        }
    }

    /// Returns true for `Process`.
    #[must_use]
    pub const fn is_process(&self) -> bool {
        matches!(self, Self::Process(_))
    }
}

impl fmt::Display for ProcessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Process(fingerprint) => write!(f, "process({fingerprint})"),
            Self::Skip(reason) => write!(f, "skip: {reason}"),
            Self::Error(message) => write!(f, "error: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(SkipReason::DuplicateText { delta_ms: -4_000, window_secs: 20 }, "dedup_within_window(delta=-4000ms,window=20s)" ; "duplicate text")]
    #[test_case(SkipReason::Burst { count: 10, window_secs: 20 }, "too_many_events_in_window(window=20s,count=10)" ; "burst")]
    #[test_case(SkipReason::GroupSummary, "group summary notification" ; "group summary")]
    #[test_case(SkipReason::CustomBlacklist { keyword: "拼单".to_string() }, "custom blacklist hit: '拼单'" ; "custom blacklist")]
    fn test_reason_strings(reason: SkipReason, expected: &str) {
        assert_eq!(reason.to_string(), expected);
    }

    #[test]
    fn test_reason_stages() {
        assert_eq!(SkipReason::GroupSummary.stage(), Stage::Filtered);
        assert_eq!(
            SkipReason::Burst {
                count: 1,
                window_secs: 1
            }
            .stage(),
            Stage::RateChecked
        );
        assert_eq!(
            SkipReason::ExistingRecord {
                fingerprint: "fp".to_string(),
                delta_ms: 0
            }
            .stage(),
            Stage::ParsedDedupChecked
        );
    }

    #[test]
    fn test_decision_accessors() {
        let process = ProcessDecision::Process("v1|a".to_string());
        assert_eq!(process.fingerprint(), Some("v1|a"));
        assert!(process.reason().is_none());

        let skip = ProcessDecision::Skip(SkipReason::GroupSummary);
        assert!(skip.fingerprint().is_none());
        assert_eq!(skip.reason().as_deref(), Some("group summary notification"));
        assert_eq!(skip.as_str(), "skip");
    }

    #[test]
    fn test_decision_serializes_tagged() {
        let json = serde_json::to_value(ProcessDecision::Error("db down".to_string())).unwrap();
        assert_eq!(json["decision"], "error");
        assert_eq!(json["detail"], "db down");
    }
}
