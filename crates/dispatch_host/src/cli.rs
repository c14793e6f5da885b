//! Command-line interface for the dispatch host.
//!
//! Argument parsing uses `clap`'s builder API. Every option overrides a value
//! from the configuration file.

use clap::{Arg, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the number of reloads in the demo run
    pub reload_cycles: Option<u32>,
    /// Optional override for the per-handler timeout
    pub handler_timeout_ms: Option<u64>,
}

fn command() -> Command {
    Command::new("Dispatch Host")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Loads opcode message handlers and replays demo session traffic through them")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("dispatch.toml"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("reloads")
                .short('r')
                .long("reloads")
                .value_name("COUNT")
                .help("Number of handler reloads to perform during the demo run")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("handler-timeout")
                .long("handler-timeout")
                .value_name("MILLIS")
                .help("Per-handler timeout in milliseconds (0 disables)")
                .value_parser(clap::value_parser!(u64)),
        )
}

impl CliArgs {
    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("dispatch.toml")),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            reload_cycles: matches.get_one::<u32>("reloads").copied(),
            handler_timeout_ms: matches.get_one::<u64>("handler-timeout").copied(),
        }
    }
}
