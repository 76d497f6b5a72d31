//! Parsed payment types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which way money moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentDirection {
    /// Money left the user's account.
    Expense,
    /// Money arrived in the user's account.
    Income,
    /// Money moved to another person.
    Transfer,
    /// An earlier expense was returned.
    Refund,
}

impl PaymentDirection {
    /// Returns the direction as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "EXPENSE",
            Self::Income => "INCOME",
            Self::Transfer => "TRANSFER",
            Self::Refund => "REFUND",
        }
    }

    /// Parses a direction from a string (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "EXPENSE" => Some(Self::Expense),
            "INCOME" => Some(Self::Income),
            "TRANSFER" => Some(Self::Transfer),
            "REFUND" => Some(Self::Refund),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The parser family that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentSourceType {
    /// Alipay wallet notifications.
    Alipay,
    /// `WeChat` Pay notifications.
    Wechat,
    /// Any other wallet, handled by the generic parser.
    Generic,
}

impl PaymentSourceType {
    /// Returns the source type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Alipay => "alipay",
            Self::Wechat => "wechat",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for PaymentSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payment extracted from a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCandidate {
    /// Source application identifier.
    pub source_app: String,
    /// Parser family that produced this candidate.
    pub source_type: PaymentSourceType,
    /// Name of the parser that produced this candidate.
    pub parser: String,
    /// Amount in minor units.
    pub amount_cents: i64,
    /// Whether the amount text was ambiguous (e.g. `1,234` or `12,50`).
    pub amount_ambiguous: bool,
    /// Direction of the payment.
    pub direction: PaymentDirection,
    /// Merchant or counterparty as it appeared in the text.
    pub raw_merchant: Option<String>,
    /// Merchant with brackets, regions and store suffixes removed.
    pub normalized_merchant: Option<String>,
    /// Payment method, e.g. `花呗` or `credit card`.
    pub payment_method: Option<String>,
    /// Parse quality heuristic in [0.0, 1.0].
    pub confidence: f64,
    /// Combined title and body the candidate was parsed from.
    pub raw_text: String,
    /// Original post time in epoch millis.
    pub post_time_millis: i64,
    /// Free-form parser tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PaymentCandidate {
    /// Merchant used for identity: normalized when present, raw otherwise.
    #[must_use]
    pub fn identity_merchant(&self) -> Option<&str> {
        self.normalized_merchant
            .as_deref()
            .or(self.raw_merchant.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_roundtrip() {
        for direction in [
            PaymentDirection::Expense,
            PaymentDirection::Income,
            PaymentDirection::Transfer,
            PaymentDirection::Refund,
        ] {
            assert_eq!(PaymentDirection::parse(direction.as_str()), Some(direction));
        }
        assert_eq!(PaymentDirection::parse("refund"), Some(PaymentDirection::Refund));
        assert_eq!(PaymentDirection::parse("unknown"), None);
    }

    #[test]
    fn test_direction_serializes_uppercase() {
        let json = serde_json::to_string(&PaymentDirection::Income).unwrap();
        assert_eq!(json, "\"INCOME\"");
    }
}
