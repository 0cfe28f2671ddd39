// src/logging.rs

//! Logging setup for `taro` using `tracing` + `tracing-subscriber`.
//!
//! Level resolution, first match wins:
//! 1. `--log-level` on the command line
//! 2. `TARO_LOG` environment variable ("info", "debug", ...)
//! 3. `warn`
//!
//! Everything goes to STDERR. Stdout belongs to the tables and to the live
//! view, which redraws in place and would be torn by interleaved log lines;
//! that is also why the default is quieter than `info`.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV_VAR: &str = "TARO_LOG";

/// Install the global subscriber. Call once, before any command runs.
pub fn init_logging(cli_level: Option<LogLevel>, no_color: bool) -> Result<()> {
    let env_value = std::env::var(LOG_ENV_VAR).ok();
    let level = resolve_level(cli_level, env_value.as_deref());

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Pick the effective level from the flag and the raw env value.
///
/// Unparseable env values are ignored rather than rejected.
pub fn resolve_level(cli_level: Option<LogLevel>, env_value: Option<&str>) -> Level {
    if let Some(lvl) = cli_level {
        return lvl.into();
    }
    env_value.and_then(parse_level_str).unwrap_or(Level::WARN)
}

impl From<LogLevel> for Level {
    fn from(lvl: LogLevel) -> Self {
        match lvl {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
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
