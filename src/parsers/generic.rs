//! Fallback parser for wallets without a dedicated parser.
//!
//! Understands common English phrasings ("paid to X 12.00",
//! "payment successful, X, ¥12.00") and generic Chinese ones.

// Static regex patterns are compile-time verified and cannot fail at runtime.
#![allow(clippy::expect_used)]

use super::{DEFAULT_DIRECTIONS, DirectionTable, NotificationParser};
use crate::models::PaymentSourceType;
use regex::Regex;
use std::sync::LazyLock;

/// Lookahead substitute: what may follow a merchant name.
const MERCHANT_END: &str = r"(?:\s+(?:for\s+)?(?:[¥￥$]|rmb|cny)?\s*\d|\s*[,;]|\.\s|\.$|$)";

static MERCHANT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let english = [
        format!(r"(?i)\bpaid to\s+(.+?){MERCHANT_END}"),
        r"(?i)\bpayment (?:successful|succeeded|complete|completed|received)\s*[,:;-]\s*([^,;]+?)\s*[,;]"
            .to_string(),
        format!(r"(?i)\b(?:received|payment|refund) from\s+(.+?){MERCHANT_END}"),
        format!(r"(?i)\b(?:transfer(?:red)?|sent) to\s+(.+?){MERCHANT_END}"),
        format!(r"(?i)\b(?:spent|purchase) at\s+(.+?){MERCHANT_END}"),
    ];
    let chinese = [
        r"【([^】]+)】".to_string(),
        r"向(.+?)(?:付款|支付)".to_string(),
        r"转账给([^\d¥￥,，。\s]+)".to_string(),
        r"(?:商户|商家|收款方)[:：]\s*([^\s,，。]+)".to_string(),
    ];
    english
        .into_iter()
        .chain(chinese)
        .map(|p| Regex::new(&p).expect("static regex: generic merchant pattern"))
        .collect()
});

const METHODS: &[(&str, &str)] = &[
    ("credit card", "credit card"),
    ("debit card", "debit card"),
    ("wallet balance", "balance"),
    ("balance", "balance"),
    ("信用卡", "信用卡"),
    ("储蓄卡", "储蓄卡"),
    ("余额", "余额"),
];

const EXCLUSIONS: &[&str] = &[
    "verification code",
    "one-time password",
    "statement is ready",
    "验证码",
    "账单已生成",
];

/// Parser used for any source no dedicated parser claims.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericWalletParser;

impl NotificationParser for GenericWalletParser {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn source_type(&self) -> PaymentSourceType {
        PaymentSourceType::Generic
    }

    fn claims(&self, _source_app: &str) -> bool {
        true
    }

    fn directions(&self) -> &DirectionTable {
        &DEFAULT_DIRECTIONS
    }

    fn merchant_patterns(&self) -> &[Regex] {
        &MERCHANT_PATTERNS
    }

    fn method_table(&self) -> &[(&'static str, &'static str)] {
        METHODS
    }

    fn exclusions(&self) -> &[&'static str] {
        EXCLUSIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentCandidate, PaymentDirection, RawNotificationEvent};
    use crate::parsers::{ConfidenceWeights, ParseOutcome};
    use test_case::test_case;

    fn parsed(body: &str) -> PaymentCandidate {
        let event = RawNotificationEvent::new("wallet.app", 1_700_000_000_000).with_body(body);
        match GenericWalletParser
            .parse(&event, &ConfidenceWeights::default())
            .unwrap()
        {
            ParseOutcome::Parsed(candidate) => candidate,
            other => panic!("expected candidate for {body}, got {other:?}"),
        }
    }

    #[test_case("paid to CoffeeShop 28.50", "CoffeeShop", 2850, PaymentDirection::Expense ; "paid to")]
    #[test_case("payment successful, CoffeeShop, ¥28.50", "CoffeeShop", 2850, PaymentDirection::Expense ; "payment successful")]
    #[test_case("Payment received from Alice Smith $40.00", "Alice Smith", 4000, PaymentDirection::Income ; "received from")]
    #[test_case("You transferred to Bob 15.00", "Bob", 1500, PaymentDirection::Transfer ; "transfer")]
    #[test_case("Refund from Book Store: ¥12.00", "Book Store", 1200, PaymentDirection::Refund ; "refund")]
    fn test_english_phrasings(
        body: &str,
        merchant: &str,
        amount: i64,
        direction: PaymentDirection,
    ) {
        let candidate = parsed(body);
        assert_eq!(candidate.raw_merchant.as_deref(), Some(merchant));
        assert_eq!(candidate.amount_cents, amount);
        assert_eq!(candidate.direction, direction);
        assert_eq!(candidate.source_type, PaymentSourceType::Generic);
    }

    #[test]
    fn test_both_wallet_phrasings_share_identity() {
        let a = parsed("paid to CoffeeShop 28.50");
        let b = parsed("payment successful, CoffeeShop, ¥28.50");
        assert_eq!(a.identity_merchant(), b.identity_merchant());
        assert_eq!(a.amount_cents, b.amount_cents);
        assert_eq!(a.direction, b.direction);
    }

    #[test]
    fn test_card_method() {
        let candidate = parsed("Paid to Grocer 9.99 with credit card");
        assert_eq!(candidate.payment_method.as_deref(), Some("credit card"));
        assert_eq!(candidate.raw_merchant.as_deref(), Some("Grocer"));
    }

    #[test]
    fn test_amount_after_word_containing_ending() {
        let candidate = parsed("Pending 28.50 charged at CoffeeShop");
        assert_eq!(candidate.amount_cents, 2850);
        assert_eq!(candidate.direction, PaymentDirection::Expense);
    }

    #[test]
    fn test_claims_everything() {
        assert!(GenericWalletParser.claims("anything.app"));
    }
}
