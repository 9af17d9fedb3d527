//! CLI argument definitions for lastwords-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/lastwords/lastwords.toml";

/// Lastwords container crash monitor daemon.
///
/// Watches Docker containers for crash-restart loops and sends a
/// notification carrying each crashed container's final log lines.
#[derive(Parser, Debug)]
#[command(name = "lastwords-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to lastwords.toml configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override Docker socket path.
    #[arg(long)]
    pub docker_socket: Option<String>,

    /// Override the number of log lines fetched when a crash is detected.
    #[arg(long)]
    pub tail: Option<u32>,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}
