// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! The agent launches the executor without arguments; identity comes from the
//! environment. Flags only tune local behaviour.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "mesos-executor",
    version,
    about = "Run a Mesos task group under a local process supervisor.",
    long_about = None
)]
pub struct CliArgs {
    /// Optional settings file (TOML). Built-in defaults apply when omitted.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MESOS_EXECUTOR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Process supervisor socket, overriding the settings file.
    #[arg(long, value_name = "PATH")]
    pub supervisor_socket: Option<PathBuf>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        let args = CliArgs::try_parse_from([
            "mesos-executor",
            "--log-level",
            "debug",
            "--supervisor-socket",
            "/tmp/sup.sock",
        ])
        .unwrap();

        assert_eq!(args.log_level, Some(LogLevel::Debug));
        assert_eq!(args.supervisor_socket, Some(PathBuf::from("/tmp/sup.sock")));
    }
}
