// src/logging.rs

//! Logging setup for `repowatch` using `tracing` + `tracing-subscriber`.
//!
//! Filter selection, first match wins:
//! 1. `--log-level` CLI flag
//! 2. `REPOWATCH_LOG`, either a bare level ("debug") or a full filter
//!    directive ("repowatch=trace,notify=debug")
//! 3. `info`
//!
//! A bare level applies to this crate only; dependencies stay at `warn`.
//! Logs go to STDERR so that stdout carries only the event lines.

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

const LOG_ENV: &str = "REPOWATCH_LOG";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(lvl) => crate_filter(level_from_log_level(lvl)),
        None => match std::env::var(LOG_ENV) {
            Ok(spec) => filter_from_env(&spec)?,
            Err(_) => crate_filter(Level::INFO),
        },
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn crate_filter(level: Level) -> EnvFilter {
    let level = level.as_str().to_lowercase();
    EnvFilter::new(format!("warn,repowatch={level}"))
}

fn filter_from_env(spec: &str) -> Result<EnvFilter> {
    if let Some(level) = parse_level_str(spec) {
        return Ok(crate_filter(level));
    }
    EnvFilter::try_new(spec.trim()).with_context(|| format!("invalid {LOG_ENV} value '{spec}'"))
}

fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_level_strings_are_lenient() {
        assert_eq!(parse_level_str(" Debug "), Some(Level::DEBUG));
        assert_eq!(parse_level_str("warning"), Some(Level::WARN));
        assert_eq!(parse_level_str("loud"), None);
    }

    #[test]
    fn bare_level_scopes_to_this_crate() {
        let rendered = filter_from_env("trace").unwrap().to_string().to_lowercase();
        assert!(rendered.contains("repowatch=trace"));
        assert!(rendered.contains("warn"));
    }

    #[test]
    fn directives_pass_through() {
        let filter = filter_from_env("repowatch=debug,notify=trace").unwrap();
        let rendered = filter.to_string().to_lowercase();
        assert!(rendered.contains("repowatch=debug"));
        assert!(rendered.contains("notify=trace"));
    }

    #[test]
    fn garbage_directives_are_rejected() {
        assert!(filter_from_env("repowatch=loudest").is_err());
    }
}
