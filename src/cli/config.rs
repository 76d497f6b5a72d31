//! Config CLI command.

use super::output_error;
use crate::Result;
use crate::config::NotiledgerConfig;
use std::io::Write;

/// Prints the effective configuration as TOML.
///
/// The output is a valid config file: feeding it back through `--config`
/// yields the same configuration.
///
/// # Errors
///
/// Returns an error if serialization or output fails.
pub fn cmd_config<W: Write>(config: &NotiledgerConfig, writer: &mut W) -> Result<()> {
    let rendered = config.to_toml()?;
    write!(writer, "{rendered}").map_err(output_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_config_round_trips() {
        let config = NotiledgerConfig::new().with_data_dir("/tmp/notiledger-test");
        let mut out = Vec::new();
        cmd_config(&config, &mut out).unwrap();

        let rendered = String::from_utf8(out).unwrap();
        assert!(rendered.contains("window_secs = 20"));
        let parsed = NotiledgerConfig::from_toml(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
