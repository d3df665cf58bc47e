//! CLI argument parsing for bridges.

use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches, Parser};

/// Common CLI arguments for all bridges.
///
/// Bridges with extra flags embed this struct with `#[command(flatten)]`.
#[derive(Parser, Debug, Clone)]
#[command(about = "SmartSight disk-health bridge")]
pub struct BridgeArgs {
    /// Path to configuration file.
    #[arg(short, long)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl BridgeArgs {
    /// Parse CLI arguments, using `default_config` when `--config` is absent.
    pub fn parse_with_default(default_config: &'static str) -> Self {
        parse_with_default(default_config)
    }
}

/// Parse any bridge argument struct that contains a `config` argument,
/// defaulting it to `default_config`.
///
/// Invalid arguments print clap's usage message and exit the process.
pub fn parse_with_default<P: Parser>(default_config: &'static str) -> P {
    let matches = P::command()
        .mut_arg("config", |arg| arg.default_value(default_config))
        .get_matches();

    P::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_from_command_line() {
        let args =
            BridgeArgs::try_parse_from(["bridge", "--config", "smartmon.json5", "--log-level", "debug"])
                .unwrap();
        assert_eq!(args.config, PathBuf::from("smartmon.json5"));
        assert_eq!(args.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_config_is_required_without_default() {
        assert!(BridgeArgs::try_parse_from(["bridge"]).is_err());
    }

    #[test]
    fn test_default_config_applies() {
        let matches = BridgeArgs::command()
            .mut_arg("config", |arg| arg.default_value("smartmon.json5"))
            .try_get_matches_from(["bridge"])
            .unwrap();
        let args = BridgeArgs::from_arg_matches(&matches).unwrap();
        assert_eq!(args.config, PathBuf::from("smartmon.json5"));
        assert!(args.log_level.is_none());
    }
}
