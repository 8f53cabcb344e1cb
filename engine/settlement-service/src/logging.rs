//! Logging and tracing setup

use anyhow::Result;
use std::str::FromStr;
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt, EnvFilter};

/// Supported log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(format!("Invalid log format: {}", other)),
        }
    }
}

/// Check a log level name
pub fn validate_level(level: &str) -> std::result::Result<(), String> {
    match level {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        other => Err(format!("Invalid log level: {}", other)),
    }
}

/// Initialize logging with custom configuration
///
/// `RUST_LOG`, when set, takes precedence over `level`.
pub fn initialize_logging_with_config(level: &str, format: &str) -> Result<()> {
    let format = LogFormat::from_str(format).map_err(anyhow::Error::msg)?;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(false)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).with_ansi(true).boxed(),
    };

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init()?;

    Ok(())
}
