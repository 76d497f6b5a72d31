//! Fingerprint generation.
//!
//! Two flavours of identity key:
//! - the raw-text hash, computed before parsing, for "same text, same
//!   source, seconds apart" checks;
//! - the parsed fingerprint over (source, direction, amount, merchant hash,
//!   time bucket), which survives rephrasing of the same payment.
//!
//! Amount and direction are embedded verbatim, never hashed.

use super::hasher::ContentHasher;
use crate::models::{DedupRecord, PaymentCandidate, PaymentDirection, RawNotificationEvent};
use crate::parsers::PaymentGuess;

/// Fingerprint format version prefix.
pub const FINGERPRINT_VERSION: &str = "v1";

/// Builds raw-text hashes and parsed fingerprints.
///
/// # Example
///
/// ```rust
/// use notiledger::FingerprintGenerator;
/// use notiledger::PaymentDirection;
///
/// let t = 1_700_000_000_000;
/// let a = FingerprintGenerator::parsed("wallet.app", Some(PaymentDirection::Expense), 2850, Some("CoffeeShop"), t, 20);
/// let b = FingerprintGenerator::parsed("wallet.app", Some(PaymentDirection::Expense), 2850, Some("coffee shop"), t + 5_000, 20);
/// assert_eq!(a, b);
/// ```
pub struct FingerprintGenerator;

impl FingerprintGenerator {
    /// Quantizes a post time into `window_secs`-wide buckets.
    #[must_use]
    pub fn time_bucket(post_time_millis: i64, window_secs: u32) -> i64 {
        let width = i64::from(window_secs.max(1)) * 1000;
        post_time_millis.div_euclid(width)
    }

    /// Hash of the event's combined title and body.
    #[must_use]
    pub fn raw_text_hash(event: &RawNotificationEvent) -> String {
        ContentHasher::text_hash(&event.combined_text())
    }

    /// Parsed fingerprint from explicit parts.
    #[must_use]
    pub fn parsed(
        source_app: &str,
        direction: Option<PaymentDirection>,
        amount_cents: i64,
        merchant: Option<&str>,
        post_time_millis: i64,
        window_secs: u32,
    ) -> String {
        format!(
            "{FINGERPRINT_VERSION}|{source_app}|{}|{amount_cents}|{}|{}",
            direction.map_or("UNKNOWN", |d| d.as_str()),
            ContentHasher::merchant_hash(merchant),
            Self::time_bucket(post_time_millis, window_secs)
        )
    }

    /// Pre-parse fingerprint.
    ///
    /// With a guessed amount this is the parsed fingerprint of the guess, so a
    /// rephrased repeat of a committed payment is caught before parsing.
    /// Without one it falls back to the raw-text namespace.
    #[must_use]
    pub fn provisional(
        event: &RawNotificationEvent,
        guess: Option<&PaymentGuess>,
        window_secs: u32,
    ) -> String {
        match guess {
            Some(guess) => Self::parsed(
                event.source_app(),
                guess.direction,
                guess.amount_cents,
                guess.merchant.as_deref(),
                event.post_time_millis(),
                window_secs,
            ),
            None => format!(
                "{FINGERPRINT_VERSION}|{}|raw|{}|{}",
                event.source_app(),
                ContentHasher::short(&Self::raw_text_hash(event)),
                Self::time_bucket(event.post_time_millis(), window_secs)
            ),
        }
    }

    /// Authoritative fingerprint of a parsed candidate.
    #[must_use]
    pub fn for_candidate(candidate: &PaymentCandidate, window_secs: u32) -> String {
        Self::parsed(
            &candidate.source_app,
            Some(candidate.direction),
            candidate.amount_cents,
            candidate.identity_merchant(),
            candidate.post_time_millis,
            window_secs,
        )
    }

    /// Store record for a candidate.
    #[must_use]
    pub fn record_for(
        candidate: &PaymentCandidate,
        window_secs: u32,
        created_at: i64,
    ) -> DedupRecord {
        DedupRecord {
            fingerprint: Self::for_candidate(candidate, window_secs),
            text_hash: ContentHasher::text_hash(&candidate.raw_text),
            amount_cents: candidate.amount_cents,
            merchant_hash: ContentHasher::merchant_hash(candidate.identity_merchant()),
            source_app: candidate.source_app.clone(),
            post_time: candidate.post_time_millis,
            created_at,
        }
    }
}
