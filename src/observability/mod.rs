//! Log subscriber setup.
//!
//! The library only emits `tracing` events and `metrics` samples. Installing
//! a subscriber (and a metrics recorder, if any) is the host's job; the
//! binary does it through [`init_logging`].

mod logging;

pub use logging::{LogFormat, LoggingConfig};

use crate::{Error, Result};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Resolves the filter directive.
///
/// Precedence: `NOTILEDGER_LOG`, `RUST_LOG`, the configured filter, then a
/// level derived from `-v` flags.
#[must_use]
pub fn filter_directive(
    config: &LoggingConfig,
    verbosity: u8,
    lookup: impl Fn(&str) -> Option<String>,
) -> String {
    lookup("NOTILEDGER_LOG")
        .or_else(|| lookup("RUST_LOG"))
        .filter(|v| !v.trim().is_empty())
        .or_else(|| config.filter.clone())
        .unwrap_or_else(|| {
            match verbosity {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
            .to_string()
        })
}

/// Installs the global subscriber writing to stderr.
///
/// Calling it again after a successful initialization is a no-op.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] for an unparseable filter directive and
/// [`Error::OperationFailed`] if another subscriber is already installed.
pub fn init_logging(config: &LoggingConfig, verbosity: u8) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Ok(());
    }

    let directive = filter_directive(config, verbosity, |key| std::env::var(key).ok());
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| Error::InvalidConfig(format!("log filter '{directive}': {e}")))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .try_init(),
    };
    result.map_err(|e| Error::OperationFailed {
        operation: "init_logging".to_string(),
        cause: e.to_string(),
    })?;

    let _ = LOGGING_INIT.set(());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_precedence() {
        let config = LoggingConfig {
            format: LogFormat::Json,
            filter: Some("warn".to_string()),
        };

        let both = |key: &str| match key {
            "NOTILEDGER_LOG" => Some("notiledger=trace".to_string()),
            "RUST_LOG" => Some("error".to_string()),
            _ => None,
        };
        assert_eq!(filter_directive(&config, 0, both), "notiledger=trace");

        let rust_log = |key: &str| (key == "RUST_LOG").then(|| "error".to_string());
        assert_eq!(filter_directive(&config, 0, rust_log), "error");

        assert_eq!(filter_directive(&config, 2, |_| None), "warn");
        assert_eq!(filter_directive(&LoggingConfig::default(), 1, |_| None), "debug");
        assert_eq!(filter_directive(&LoggingConfig::default(), 0, |_| None), "info");
    }
}
