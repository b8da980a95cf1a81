// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `repowatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "repowatch",
    version,
    about = "Watch a git repository and report HEAD, index, branch, commit and working-tree changes.",
    long_about = None
)]
pub struct CliArgs {
    /// Repository root (working tree) to watch.
    #[arg(long, value_name = "PATH", default_value = ".")]
    pub repo: String,

    /// Path to the config file (TOML).
    ///
    /// If omitted, `Repowatch.toml` in the current directory is used when it
    /// exists; otherwise built-in defaults apply.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Override `[watch].poll_interval_ms`.
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `REPOWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve repository paths and config, print them, and exit.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
