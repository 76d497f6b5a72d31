//! Amount extraction.
//!
//! Notifications mix amounts with card suffixes, counts and dates. Numbers
//! attached to a currency marker win over numbers with a decimal part, which
//! win over bare integers; card suffixes are never amounts.

// Static regex patterns are compile-time verified and cannot fail at runtime.
#![allow(clippy::expect_used)]

use regex::Regex;
use std::sync::LazyLock;

/// Candidate amounts: thousands-grouped first, then plain or decimal-comma.
static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<pre>[¥￥$]|rmb|cny)?\s*(?P<num>\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?|\d+(?:[.,]\d{1,2})?)(?P<tail>\d*)\s*(?P<post>元|yuan|rmb|cny)?",
    )
    .expect("static regex: amount pattern")
});

/// Text right before a number that marks it as a card or account suffix.
const SUFFIX_MARKERS: &[&str] = &["尾号"];

/// Whole-word markers; "spending" or "pending" must not match "ending".
const SUFFIX_WORDS: &[&str] = &["ending in", "ending"];

/// Shortest run of asterisks treated as a masked card number.
const MIN_MASK_RUN: usize = 2;

/// An amount found in notification text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedAmount {
    /// Amount in minor units.
    pub cents: i64,
    /// True when the text could be read more than one way.
    pub ambiguous: bool,
}

/// Finds the most plausible payment amount in `text`.
///
/// Returns `None` when no positive amount is present.
///
/// # Example
///
/// ```rust
/// use notiledger::parsers::extract_amount;
///
/// let amount = extract_amount("向【苹果专营店】付款￥1,234.56元").unwrap();
/// assert_eq!(amount.cents, 123_456);
/// assert!(!amount.ambiguous);
/// ```
#[must_use]
pub fn extract_amount(text: &str) -> Option<ExtractedAmount> {
    let mut best: Option<(u8, ExtractedAmount)> = None;

    for caps in AMOUNT.captures_iter(text) {
        let Some(num) = caps.name("num") else {
            continue;
        };
        // Longer digit runs such as years or order numbers.
        if caps.name("tail").is_some_and(|t| !t.as_str().is_empty()) {
            continue;
        }
        let whole = caps.get(0).map_or(num.start(), |m| m.start());
        if follows_suffix_marker(&text[..whole]) {
            continue;
        }
        let Some(amount) = parse_number(num.as_str()) else {
            continue;
        };
        if amount.cents <= 0 {
            continue;
        }

        let has_marker = caps.name("pre").is_some() || caps.name("post").is_some();
        let has_decimal = num.as_str().contains('.') || amount.ambiguous;
        let rank = match (has_marker, has_decimal) {
            (true, _) => 2,
            (false, true) => 1,
            (false, false) => 0,
        };
        if best.is_none_or(|(current, _)| rank > current) {
            best = Some((rank, amount));
        }
    }

    best.map(|(_, amount)| amount)
}

fn follows_suffix_marker(prefix: &str) -> bool {
    let trimmed = prefix.trim_end().to_lowercase();
    if SUFFIX_MARKERS.iter().any(|m| trimmed.ends_with(m)) {
        return true;
    }
    if trimmed.chars().rev().take_while(|c| *c == '*').count() >= MIN_MASK_RUN {
        return true;
    }
    SUFFIX_WORDS.iter().any(|word| {
        trimmed
            .strip_suffix(word)
            .is_some_and(|before| !before.chars().next_back().is_some_and(char::is_alphanumeric))
    })
}

/// Converts a matched number to cents.
fn parse_number(raw: &str) -> Option<ExtractedAmount> {
    let grouped = raw.contains(',') && raw.split(',').skip(1).all(|g| g.len() >= 3);

    let (integer, fraction, ambiguous) = if grouped {
        let (int_part, frac) = raw.split_once('.').map_or((raw, ""), |(i, f)| (i, f));
        (int_part.replace(',', ""), frac.to_string(), frac.is_empty())
    } else if let Some((int_part, frac)) = raw.split_once(',') {
        // Decimal comma, e.g. "12,50".
        (int_part.to_string(), frac.to_string(), true)
    } else {
        let (int_part, frac) = raw.split_once('.').map_or((raw, ""), |(i, f)| (i, f));
        (int_part.to_string(), frac.to_string(), false)
    };

    let units: i64 = integer.parse().ok()?;
    let fraction_cents: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };
    let cents = units.checked_mul(100)?.checked_add(fraction_cents)?;

    Some(ExtractedAmount { cents, ambiguous })
}
