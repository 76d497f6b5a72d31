//! Confidence scoring for parsed candidates.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Weights for the parse-quality heuristic.
///
/// The score is `baseline` plus a bonus per extracted feature, capped at 1.0.
/// The defaults carry no calibration; they are policy knobs.
///
/// # Example
///
/// ```rust
/// use notiledger::ConfidenceWeights;
///
/// let weights = ConfidenceWeights::default();
/// assert_eq!(weights.score(true, false, true), 0.9);
/// assert_eq!(weights.score(true, true, true), 1.0);
/// assert_eq!(weights.score(false, false, false), 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    /// Score of a candidate with only an amount and a direction.
    pub baseline: f64,
    /// Bonus when a merchant was extracted.
    pub merchant: f64,
    /// Bonus when a payment method was identified.
    pub method: f64,
    /// Bonus when the amount text was unambiguous.
    pub unambiguous_amount: f64,
}

impl ConfidenceWeights {
    /// Scores a candidate from its extracted features.
    ///
    /// Deterministic: the result is rounded to four decimals so identical
    /// inputs never differ by float noise.
    #[must_use]
    pub fn score(&self, has_merchant: bool, has_method: bool, amount_unambiguous: bool) -> f64 {
        let mut score = self.baseline;
        if has_merchant {
            score += self.merchant;
        }
        if has_method {
            score += self.method;
        }
        if amount_unambiguous {
            score += self.unambiguous_amount;
        }
        (score.clamp(0.0, 1.0) * 10_000.0).round() / 10_000.0
    }

    /// Rejects weights outside [0, 1].
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("baseline", self.baseline),
            ("merchant", self.merchant),
            ("method", self.method),
            ("unambiguous_amount", self.unambiguous_amount),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "confidence.{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            baseline: 0.5,
            merchant: 0.3,
            method: 0.1,
            unambiguous_amount: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(false, false, false, 0.5 ; "baseline only")]
    #[test_case(false, false, true, 0.6 ; "unambiguous amount")]
    #[test_case(true, false, false, 0.8 ; "merchant")]
    #[test_case(false, true, true, 0.7 ; "method and amount")]
    #[test_case(true, true, true, 1.0 ; "everything")]
    fn test_default_scores(merchant: bool, method: bool, amount: bool, expected: f64) {
        let score = ConfidenceWeights::default().score(merchant, method, amount);
        assert!((score - expected).abs() < f64::EPSILON, "{score} != {expected}");
    }

    #[test]
    fn test_score_is_capped() {
        let weights = ConfidenceWeights {
            baseline: 0.9,
            merchant: 0.9,
            method: 0.0,
            unambiguous_amount: 0.0,
        };
        assert!((weights.score(true, false, false) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let weights = ConfidenceWeights {
            merchant: 1.5,
            ..ConfidenceWeights::default()
        };
        let err = weights.validate().unwrap_err();
        assert!(err.to_string().contains("confidence.merchant"));
        assert!(ConfidenceWeights::default().validate().is_ok());
    }
}
