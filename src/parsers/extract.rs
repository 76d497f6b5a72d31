//! Shared extraction helpers: direction, merchant and payment method.
//!
//! Parsers differ only in their keyword tables and merchant patterns; the
//! matching itself lives here so the provisional guess and the full parse
//! always agree on the same text.

// Static regex patterns are compile-time verified and cannot fail at runtime.
#![allow(clippy::expect_used)]

use crate::models::PaymentDirection;
use regex::Regex;
use std::sync::LazyLock;

/// Longest merchant we accept; longer captures are sentence fragments.
const MAX_MERCHANT_CHARS: usize = 40;

/// Region or branch annotations such as `（北京）` or `(Downtown)`.
static PARENTHESIZED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[（(][^）)]*[）)]").expect("static regex: parenthesized region")
});

/// Card or account suffix, reported as the payment method.
static CARD_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:(银行卡|储蓄卡|信用卡)?尾号\s*(\d{4}))|(?:card ending(?: in)?\s*(\d{4}))")
        .expect("static regex: card suffix")
});

/// Store suffixes dropped during normalization.
const STORE_SUFFIXES: &[&str] = &[
    "官方旗舰店",
    "旗舰店",
    "专营店",
    "专卖店",
    "官方店",
    " official store",
];

/// Direction keywords, checked refund, income, transfer, expense.
#[derive(Debug, Clone, Copy)]
pub struct DirectionTable {
    /// Keywords marking a refund.
    pub refund: &'static [&'static str],
    /// Keywords marking incoming money.
    pub income: &'static [&'static str],
    /// Keywords marking a person-to-person transfer.
    pub transfer: &'static [&'static str],
    /// Keywords marking an expense.
    pub expense: &'static [&'static str],
}

impl DirectionTable {
    /// Detects the direction of lowercased text.
    #[must_use]
    pub fn detect(&self, lower_text: &str) -> Option<PaymentDirection> {
        [
            (self.refund, PaymentDirection::Refund),
            (self.income, PaymentDirection::Income),
            (self.transfer, PaymentDirection::Transfer),
            (self.expense, PaymentDirection::Expense),
        ]
        .into_iter()
        .find(|(keywords, _)| first_keyword(lower_text, keywords).is_some())
        .map(|(_, direction)| direction)
    }
}

/// Mixed-language table used by the generic parser.
pub static DEFAULT_DIRECTIONS: DirectionTable = DirectionTable {
    refund: &["退款", "已退回", "撤销", "refund", "reversed", "returned to"],
    income: &[
        "到账", "收款", "已收款", "入账", "收入", "收到", "received", "credited", "deposit",
    ],
    transfer: &[
        "转账给", "转账到", "已转账", "转账", "transfer to", "transferred", "sent to",
    ],
    expense: &[
        "付款",
        "支付",
        "扣款",
        "消费",
        "支出",
        "paid",
        "payment",
        "spent",
        "debited",
        "charged",
        "purchase",
    ],
};

/// First keyword contained in `lower_text`.
///
/// Keywords are expected in lowercase.
#[must_use]
pub fn first_keyword<'a>(lower_text: &str, keywords: &[&'a str]) -> Option<&'a str> {
    keywords.iter().copied().find(|k| lower_text.contains(k))
}

/// First merchant captured by `patterns`, cleaned of surrounding noise.
#[must_use]
pub fn extract_merchant(text: &str, patterns: &[Regex]) -> Option<String> {
    patterns
        .iter()
        .filter_map(|p| p.captures(text))
        .filter_map(|caps| caps.get(1))
        .map(|m| clean_merchant(m.as_str()))
        .find(|m| is_plausible_merchant(m))
}

fn clean_merchant(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| {
            c.is_whitespace() || matches!(c, ',' | '，' | '.' | '。' | ':' | '：' | '"' | '\'')
        })
        .to_string()
}

fn is_plausible_merchant(merchant: &str) -> bool {
    let count = merchant.chars().count();
    count > 0
        && count <= MAX_MERCHANT_CHARS
        && merchant.chars().any(char::is_alphabetic)
}

/// Normalizes a merchant for display and identity.
///
/// Removes brackets, parenthesized regions and store suffixes.
///
/// # Example
///
/// ```rust
/// use notiledger::parsers::normalize_merchant;
///
/// assert_eq!(normalize_merchant("【苹果专营店】").as_deref(), Some("苹果"));
/// assert_eq!(normalize_merchant("星巴克（国贸店）").as_deref(), Some("星巴克"));
/// assert_eq!(normalize_merchant("【】"), None);
/// ```
#[must_use]
pub fn normalize_merchant(raw: &str) -> Option<String> {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, '【' | '】' | '[' | ']'))
        .collect();
    let mut merchant = PARENTHESIZED.replace_all(&stripped, "").trim().to_string();

    let lower = merchant.to_lowercase();
    if let Some(suffix) = STORE_SUFFIXES.iter().find(|s| lower.ends_with(*s)) {
        // Suffixes are ASCII-lowercase or CJK, so byte lengths match.
        let keep = merchant.len().saturating_sub(suffix.len());
        if merchant.is_char_boundary(keep) {
            merchant.truncate(keep);
        }
    }

    let merchant = merchant.trim().to_string();
    (!merchant.is_empty()).then_some(merchant)
}

/// Payment method named in `text`.
///
/// Card suffixes win over the keyword table; `table` maps a lowercase keyword
/// to the label reported for it, first match wins.
#[must_use]
pub fn detect_method(text: &str, table: &[(&str, &str)]) -> Option<String> {
    if let Some(caps) = CARD_SUFFIX.captures(text) {
        if let Some(digits) = caps.get(2) {
            let kind = caps.get(1).map_or("银行卡", |k| k.as_str());
            return Some(format!("{kind}尾号{}", digits.as_str()));
        }
        if let Some(digits) = caps.get(3) {
            return Some(format!("card ending {}", digits.as_str()));
        }
    }

    let lower = text.to_lowercase();
    table
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, label)| (*label).to_string())
}
