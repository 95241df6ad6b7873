//! Process-edge logging setup.
//!
//! Grounded in the teacher's `infrastructure::logging` module: a
//! `tracing-subscriber` `fmt` layer gated by `EnvFilter`, optionally
//! JSON-formatted and optionally mirrored to a rotating file via
//! `tracing-appender`. Simplified relative to the teacher (no secret
//! scrubbing layer — this crate emits no credentials) but keeps the same
//! stdout/file split and format choice.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Output shape for emitted log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Pretty
    }
}

/// Logging configuration, loaded as part of [`crate::config::AppConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// If set, logs are additionally written as rotating daily JSON files
    /// under this directory.
    pub log_dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_level(), format: LogFormat::default(), log_dir: None }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn parse_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => anyhow::bail!("invalid log level: {other}"),
    }
}

/// Initializes the global `tracing` subscriber. Returns a guard that must be
/// held for the process lifetime when file logging is enabled (dropping it
/// flushes the non-blocking writer).
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let default_level = parse_level(&config.level)?;
    let env_filter = EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy();

    let stdout_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_line_number(true)
            .boxed(),
    };

    if let Some(log_dir) = &config.log_dir {
        let file_appender = tracing_appender::rolling::daily(log_dir, "sequencer.log");
        let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
        let file_layer =
            tracing_subscriber::fmt::layer().json().with_writer(non_blocking_file).with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;
        Ok(Some(guard))
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stdout_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels() {
        assert!(matches!(parse_level("debug"), Ok(Level::DEBUG)));
        assert!(matches!(parse_level("ERROR"), Ok(Level::ERROR)));
        assert!(parse_level("verbose").is_err());
    }
}
