//! Source-specific notification parsers.
//!
//! Each parser claims the events of one or more source apps and turns their
//! text into a [`PaymentCandidate`]. Parsers are data-driven: a parser supplies
//! keyword tables and merchant patterns, and the shared extraction routines
//! in this module do the matching. The same routines back both the cheap
//! pre-parse [`PaymentGuess`] and the full parse, so the provisional and final
//! fingerprints of a cleanly parsed event agree.

mod alipay;
mod amount;
mod confidence;
mod extract;
mod generic;
mod registry;
mod wechat;

pub use alipay::AlipayParser;
pub use amount::{ExtractedAmount, extract_amount};
pub use confidence::ConfidenceWeights;
pub use extract::{
    DEFAULT_DIRECTIONS, DirectionTable, detect_method, extract_merchant, first_keyword,
    normalize_merchant,
};
pub use generic::GenericWalletParser;
pub use registry::ParserRegistry;
pub use wechat::WechatParser;

use crate::Result;
use crate::models::{PaymentCandidate, PaymentDirection, PaymentSourceType, RawNotificationEvent};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Cheap pre-parse reading of an event, used for the provisional fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentGuess {
    /// Amount in minor units.
    pub amount_cents: i64,
    /// Direction, when a keyword matched.
    pub direction: Option<PaymentDirection>,
    /// Identity merchant (normalized when possible).
    pub merchant: Option<String>,
}

/// Result of running a parser over an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ParseOutcome {
    /// A payment was extracted.
    Parsed(PaymentCandidate),
    /// The event is recognisably not a payment.
    Skipped(String),
    /// The event looks like a payment but key fields are missing.
    Failed(String),
    /// No parser claims the source app.
    Unsupported(String),
}

impl ParseOutcome {
    /// Returns the outcome kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed(_) => "parsed",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

/// A parser for one family of payment notifications.
///
/// Implementors provide tables; `guess` and `parse` have shared default
/// implementations built on them.
pub trait NotificationParser: Send + Sync {
    /// Parser name, used in logs and candidate metadata.
    fn name(&self) -> &'static str;

    /// Source type stamped on produced candidates.
    fn source_type(&self) -> PaymentSourceType;

    /// Whether this parser owns events from `source_app`.
    fn claims(&self, source_app: &str) -> bool;

    /// Direction keyword table.
    fn directions(&self) -> &DirectionTable;

    /// Merchant patterns, tried in order; capture group 1 is the merchant.
    fn merchant_patterns(&self) -> &[Regex];

    /// Lowercase keyword to payment-method label, first match wins.
    fn method_table(&self) -> &[(&'static str, &'static str)];

    /// Lowercase keywords marking notifications that are not payments.
    fn exclusions(&self) -> &[&'static str] {
        &[]
    }

    /// Reads amount, direction and merchant without scoring.
    fn guess(&self, event: &RawNotificationEvent) -> Option<PaymentGuess> {
        let text = event.combined_text();
        let amount = extract_amount(&text)?;
        let direction = self.directions().detect(&text.to_lowercase());
        let raw = extract_merchant(&text, self.merchant_patterns());
        let merchant = raw.as_deref().and_then(normalize_merchant).or(raw);
        Some(PaymentGuess {
            amount_cents: amount.cents,
            direction,
            merchant,
        })
    }

    /// Parses an event into a candidate.
    fn parse(
        &self,
        event: &RawNotificationEvent,
        weights: &ConfidenceWeights,
    ) -> Result<ParseOutcome> {
        let text = event.combined_text();
        if text.is_empty() {
            return Ok(ParseOutcome::Failed("empty notification".to_string()));
        }

        let lower = text.to_lowercase();
        if let Some(keyword) = first_keyword(&lower, self.exclusions()) {
            return Ok(ParseOutcome::Skipped(format!(
                "not a payment notification (keyword '{keyword}')"
            )));
        }

        let Some(amount) = extract_amount(&text) else {
            return Ok(ParseOutcome::Failed("no amount found".to_string()));
        };
        let Some(direction) = self.directions().detect(&lower) else {
            return Ok(ParseOutcome::Failed("payment direction not recognized".to_string()));
        };

        let raw_merchant = extract_merchant(&text, self.merchant_patterns());
        let normalized_merchant = raw_merchant.as_deref().and_then(normalize_merchant);
        let payment_method = detect_method(&text, self.method_table());
        let confidence = weights.score(
            raw_merchant.is_some(),
            payment_method.is_some(),
            !amount.ambiguous,
        );

        let mut tags = vec![format!("parser:{}", self.name())];
        if amount.ambiguous {
            tags.push("amount:ambiguous".to_string());
        }

        Ok(ParseOutcome::Parsed(PaymentCandidate {
            source_app: event.source_app().to_string(),
            source_type: self.source_type(),
            parser: self.name().to_string(),
            amount_cents: amount.cents,
            amount_ambiguous: amount.ambiguous,
            direction,
            raw_merchant,
            normalized_merchant,
            payment_method,
            confidence,
            raw_text: text,
            post_time_millis: event.post_time_millis(),
            tags,
        }))
    }
}
