//! Logging System
//!
//! Structured logging via the `tracing` crate. Configurable level,
//! format, and destination; the `STAGEHAND_LOG` environment variable
//! overrides the configured level with a full env-filter directive.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable colored output (text format only)
    #[serde(default = "default_true")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            color: default_true(),
        }
    }
}

/// Initialize the logging system.
///
/// Priority order (highest to lowest): `STAGEHAND_LOG` env directive,
/// configured level, default (`info`). Safe to call once per process;
/// a second call returns an error from the subscriber registry.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), CoreError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);

    let filter = EnvFilter::try_from_env("STAGEHAND_LOG")
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| CoreError::ConfigError(format!("invalid log level: {}", e)))?;

    let to_stderr = config.output != "stdout";
    let base = Registry::default().with(filter);

    let result = if config.format == "json" {
        if to_stderr {
            base.with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
        } else {
            base.with(fmt::layer().json().with_writer(std::io::stdout))
                .try_init()
        }
    } else if to_stderr {
        base.with(
            fmt::layer()
                .with_ansi(config.color)
                .with_writer(std::io::stderr),
        )
        .try_init()
    } else {
        base.with(
            fmt::layer()
                .with_ansi(config.color)
                .with_writer(std::io::stdout),
        )
        .try_init()
    };

    result.map_err(|e| CoreError::ConfigError(format!("failed to initialize logging: {}", e)))
}
