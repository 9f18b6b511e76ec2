//! Configuration System
//!
//! Tool configuration merged from defaults, the optional per-project
//! `.stagehand/config.toml`, and `STAGEHAND_*` environment overrides.

use crate::error::CoreError;
use crate::logging::LoggingConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Directory inside a project that holds stagehand state (config, lock
/// marker).
pub const PROJECT_STATE_DIR: &str = ".stagehand";

/// Lock manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Wait for a busy lock instead of failing fast.
    #[serde(default)]
    pub wait: bool,

    /// Poll interval while waiting (milliseconds).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up waiting after this many seconds.
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,

    /// A lock marker older than this is considered abandoned and
    /// reclaimed (seconds).
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_wait_timeout_secs() -> u64 {
    60
}

fn default_stale_after_secs() -> u64 {
    2 * 60 * 60
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            wait: false,
            poll_interval_ms: default_poll_interval_ms(),
            wait_timeout_secs: default_wait_timeout_secs(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl LockConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagehandConfig {
    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Loads tool configuration with the standard merge policy.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a project root.
    /// Precedence: defaults, then `.stagehand/config.toml`, then
    /// `STAGEHAND_*` environment variables.
    pub fn load(project_root: &Path) -> Result<StagehandConfig, CoreError> {
        let mut builder = builder_with_defaults()?;

        let project_file = project_root.join(PROJECT_STATE_DIR).join("config.toml");
        if project_file.exists() {
            if let Some(path) = project_file.to_str() {
                builder = builder.add_source(File::with_name(path).required(false));
            }
        }

        builder = builder.add_source(Environment::with_prefix("STAGEHAND").separator("__"));

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load configuration from an explicit file, skipping project lookup.
    pub fn load_from_file(path: &Path) -> Result<StagehandConfig, CoreError> {
        let builder = builder_with_defaults()?.add_source(
            File::with_name(path.to_str().ok_or_else(|| {
                CoreError::ConfigError(format!("non-UTF-8 config path: {}", path.display()))
            })?)
            .required(true),
        );
        Ok(builder.build()?.try_deserialize()?)
    }
}

/// Create a Config builder with merge policy defaults applied.
fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, CoreError> {
    Ok(Config::builder()
        .set_default("lock.wait", false)?
        .set_default("lock.poll_interval_ms", default_poll_interval_ms())?
        .set_default("lock.wait_timeout_secs", default_wait_timeout_secs())?
        .set_default("lock.stale_after_secs", default_stale_after_secs())?
        .set_default("logging.level", "info")?)
}
