//! Per-source runtime rules.

use serde::{Deserialize, Serialize};

/// Whether notifications from a source are processed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Notifications are evaluated.
    #[default]
    Enabled,
    /// Notifications are skipped.
    Disabled,
}

/// User rules for one source app.
///
/// The blacklist is normalized on construction: entries are trimmed and
/// lowercased, blanks and duplicates are dropped.
///
/// # Example
///
/// ```rust
/// use notiledger::{SourceMode, SourceRule};
///
/// let rule = SourceRule::new(SourceMode::Enabled, ["  群收款 ", "", "AA", "aa"]);
/// assert_eq!(rule.blacklist(), ["群收款", "aa"]);
/// assert_eq!(rule.blacklist_hit("aa制聚餐"), Some("aa"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawSourceRule")]
pub struct SourceRule {
    /// Processing mode.
    pub mode: SourceMode,
    blacklist: Vec<String>,
}

impl SourceRule {
    /// Creates a rule, normalizing the blacklist.
    #[must_use]
    pub fn new<I, S>(mode: SourceMode, blacklist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for entry in blacklist {
            let entry = entry.as_ref().trim().to_lowercase();
            if !entry.is_empty() && !normalized.contains(&entry) {
                normalized.push(entry);
            }
        }
        Self {
            mode,
            blacklist: normalized,
        }
    }

    /// A disabled source with no blacklist.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            mode: SourceMode::Disabled,
            blacklist: Vec::new(),
        }
    }

    /// Normalized blacklist keywords.
    #[must_use]
    pub fn blacklist(&self) -> &[String] {
        &self.blacklist
    }

    /// Whether the source is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        matches!(self.mode, SourceMode::Enabled)
    }

    /// First blacklist keyword contained in `text` (case-insensitive).
    #[must_use]
    pub fn blacklist_hit(&self, text: &str) -> Option<&str> {
        if self.blacklist.is_empty() {
            return None;
        }
        let lower = text.to_lowercase();
        self.blacklist
            .iter()
            .find(|keyword| lower.contains(keyword.as_str()))
            .map(String::as_str)
    }
}

/// Wire shape of a rule before normalization.
#[derive(Deserialize)]
struct RawSourceRule {
    #[serde(default)]
    mode: SourceMode,
    #[serde(default)]
    blacklist: Vec<String>,
}

impl From<RawSourceRule> for SourceRule {
    fn from(raw: RawSourceRule) -> Self {
        Self::new(raw.mode, raw.blacklist)
    }
}
