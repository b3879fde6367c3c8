//! Command line interface for the Meridian Region Server.
//!
//! Every flag here overrides the value loaded from the configuration file,
//! so operators can repoint a node at a different grid or port without
//! editing the file.

use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;

/// Parsed command line arguments
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Override for the RPC bind address
    pub bind_address: Option<String>,
    /// Override for the comms backend selector
    pub backend: Option<String>,
    /// Override for the grid authority URI
    pub grid_server_uri: Option<String>,
    /// Override for the log level
    pub log_level: Option<String>,
    /// Emit logs as JSON instead of human-readable text
    pub json_logs: bool,
}

impl CliArgs {
    /// Parses command line arguments
    pub fn parse() -> Self {
        let matches = Command::new("Meridian Region Server")
            .version("0.12.0")
            .author("Meridian Team <team@meridian.dev>")
            .about("Region simulator node for the Meridian virtual world platform")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Path to the configuration file")
                    .default_value("meridian.toml"),
            )
            .arg(
                Arg::new("bind")
                    .short('b')
                    .long("bind")
                    .value_name("ADDR")
                    .help("Bind address for the inter-region RPC endpoint"),
            )
            .arg(
                Arg::new("backend")
                    .long("backend")
                    .value_name("BACKEND")
                    .help("Communications backend: standalone or grid"),
            )
            .arg(
                Arg::new("grid-server")
                    .long("grid-server")
                    .value_name("URI")
                    .help("Grid authority RPC endpoint, e.g. ws://grid.example.net:8001"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level: trace, debug, info, warn or error"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Emit logs in JSON format")
                    .action(ArgAction::SetTrue),
            )
            .get_matches();

        Self {
            config_path: PathBuf::from(
                matches
                    .get_one::<String>("config")
                    .map(String::as_str)
                    .unwrap_or("meridian.toml"),
            ),
            bind_address: matches.get_one::<String>("bind").cloned(),
            backend: matches.get_one::<String>("backend").cloned(),
            grid_server_uri: matches.get_one::<String>("grid-server").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("meridian.toml"),
            bind_address: None,
            backend: None,
            grid_server_uri: None,
            log_level: None,
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = CliArgs::default();
        assert_eq!(args.config_path, PathBuf::from("meridian.toml"));
        assert!(args.bind_address.is_none());
        assert!(args.backend.is_none());
        assert!(!args.json_logs);
    }
}
