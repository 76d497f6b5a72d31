//! Deduplication configuration.
//!
//! Window size and burst ceiling for the decision engine.

use serde::Serialize;

/// Default dedup window in seconds.
pub const DEFAULT_WINDOW_SECS: u32 = 20;
/// Smallest accepted window.
pub const MIN_WINDOW_SECS: u32 = 1;
/// Largest accepted window.
pub const MAX_WINDOW_SECS: u32 = 600;
/// Default per-source record ceiling inside one window.
pub const DEFAULT_BURST_CEILING: u64 = 10;

/// Configuration for the deduplication stages.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `NOTILEDGER_DEDUP_ENABLED` | bool | `true` | Enable dedup and burst checks |
/// | `NOTILEDGER_DEDUP_WINDOW_SECS` | u32 | `20` | Window, clamped to [1, 600] |
/// | `NOTILEDGER_BURST_CEILING` | u64 | `10` | Records per window before skipping |
///
/// # Example
///
/// ```rust
/// use notiledger::DedupConfig;
///
/// let config = DedupConfig::default().with_window_secs(5_000);
/// assert_eq!(config.window_secs(), 600);
/// assert!(config.enabled);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DedupConfig {
    /// Enable/disable the dedup and burst stages.
    pub enabled: bool,

    /// Window in seconds; always within [`MIN_WINDOW_SECS`, `MAX_WINDOW_SECS`].
    window_secs: u32,

    /// Records per source inside the window at which new events are skipped;
    /// always at least 1.
    burst_ceiling: u64,
}

impl DedupConfig {
    /// Creates a configuration from environment variables.
    ///
    /// Falls back to defaults for any unset or unparseable variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates a configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::default().with_overrides(lookup)
    }

    /// Applies environment-style overrides on top of `self`.
    ///
    /// Unparseable values are ignored with a warning.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup("NOTILEDGER_DEDUP_ENABLED") {
            match parse_bool(&value) {
                Some(enabled) => self.enabled = enabled,
                None => tracing::warn!(value = %value, "Ignoring invalid NOTILEDGER_DEDUP_ENABLED"),
            }
        }

        if let Some(value) = lookup("NOTILEDGER_DEDUP_WINDOW_SECS") {
            match value.trim().parse::<i64>() {
                Ok(secs) => self = self.with_window_secs(secs),
                Err(_) => {
                    tracing::warn!(value = %value, "Ignoring invalid NOTILEDGER_DEDUP_WINDOW_SECS");
                },
            }
        }

        if let Some(value) = lookup("NOTILEDGER_BURST_CEILING") {
            match value.trim().parse::<u64>() {
                Ok(ceiling) if ceiling > 0 => self = self.with_burst_ceiling(ceiling),
                _ => tracing::warn!(value = %value, "Ignoring invalid NOTILEDGER_BURST_CEILING"),
            }
        }

        self
    }

    /// Window in seconds.
    #[must_use]
    pub const fn window_secs(&self) -> u32 {
        self.window_secs
    }

    /// Burst ceiling; never zero.
    #[must_use]
    pub const fn burst_ceiling(&self) -> u64 {
        self.burst_ceiling
    }

    /// Window in milliseconds.
    #[must_use]
    pub fn window_millis(&self) -> i64 {
        i64::from(self.window_secs) * 1000
    }

    /// Builder method to set enabled state.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder method to set the window; out-of-range values are clamped.
    #[must_use]
    pub fn with_window_secs(mut self, window_secs: i64) -> Self {
        let clamped = clamp_window(window_secs);
        if i64::from(clamped) != window_secs {
            tracing::warn!(
                requested = window_secs,
                applied = clamped,
                "Dedup window out of range, clamped"
            );
        }
        self.window_secs = clamped;
        self
    }

    /// Builder method to set the burst ceiling (minimum 1).
    #[must_use]
    pub fn with_burst_ceiling(mut self, ceiling: u64) -> Self {
        if ceiling == 0 {
            tracing::warn!("Burst ceiling of 0 would skip every event, using 1");
        }
        self.burst_ceiling = ceiling.max(1);
        self
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: DEFAULT_WINDOW_SECS,
            burst_ceiling: DEFAULT_BURST_CEILING,
        }
    }
}

/// Clamps a raw window value into the accepted range.
#[must_use]
pub fn clamp_window(window_secs: i64) -> u32 {
    let clamped = window_secs.clamp(i64::from(MIN_WINDOW_SECS), i64::from(MAX_WINDOW_SECS));
    u32::try_from(clamped).unwrap_or(DEFAULT_WINDOW_SECS)
}

/// Parses the boolean spellings accepted in environment variables.
pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
