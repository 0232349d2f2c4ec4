//! Command-line argument parsing for coinhunt.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// coinhunt command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "coinhunt", about = "coinhunt multiplayer gameplay core")]
pub struct CliArgs {
    /// Host a game and play as the hosting player.
    #[arg(long, conflicts_with = "join")]
    pub host: bool,

    /// Join the host at this address and play as a client.
    #[arg(long)]
    pub join: Option<String>,

    /// Port to host on or connect to.
    #[arg(long)]
    pub port: Option<u16>,

    /// Display name announced to the host.
    #[arg(long)]
    pub player_name: Option<String>,

    /// Position sync interval in milliseconds.
    #[arg(long)]
    pub sync_interval_ms: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref addr) = args.join {
            self.network.server_address = addr.clone();
        }
        if let Some(port) = args.port {
            self.network.server_port = port;
        }
        if let Some(ref name) = args.player_name {
            self.network.player_name = name.clone();
        }
        if let Some(interval) = args.sync_interval_ms {
            self.network.sync_interval_ms = interval;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            join: Some("192.168.1.1".to_string()),
            sync_interval_ms: Some(100),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.network.server_address, "192.168.1.1");
        assert_eq!(config.network.sync_interval_ms, 100);
        // Non-overridden fields retain defaults
        assert_eq!(config.network.server_port, 7777);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_host_flags() {
        let args = CliArgs::try_parse_from(["coinhunt", "--host", "--port", "9100"]).unwrap();
        assert!(args.host);
        assert_eq!(args.port, Some(9100));
        assert!(args.join.is_none());
    }

    #[test]
    fn test_cli_host_and_join_conflict() {
        let result = CliArgs::try_parse_from(["coinhunt", "--host", "--join", "10.0.0.2"]);
        assert!(result.is_err());
    }
}
