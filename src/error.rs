//! Error types for the stagehand lifecycle orchestration system.

use indexmap::IndexMap;
use std::path::PathBuf;
use thiserror::Error;

/// Store-level errors: project manifest, env files, legacy metadata.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid project manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid env file {path}: {reason}")]
    InvalidEnvFile { path: PathBuf, reason: String },

    #[error("Store I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Manifest parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Manifest encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("Metadata parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Stage-level errors. Every fault raised during a stage invocation is
/// normalized into exactly one of these before it leaves the chain.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Operation cancelled")]
    UserCancelled,

    #[error("Not a valid project: {0}")]
    InvalidProject(String),

    #[error("Project schema is already up to date")]
    NoUpgradeNeeded,

    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input `{name}`: {reason}")]
    InvalidInput { name: String, reason: String },

    #[error("Project is busy: {0}")]
    ResourceBusy(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Sub-task `{task}` of plugin `{plugin}` failed")]
    SubTask {
        plugin: String,
        task: String,
        #[source]
        source: Box<CoreError>,
    },

    /// Some sub-tasks completed (with externally visible effects) before
    /// a sibling failed. `completed` is keyed by plugin name in launch
    /// order and is never discarded.
    #[error("{} sub-task(s) completed before a sibling failed", .completed.len())]
    PartialFailure {
        #[source]
        source: Box<CoreError>,
        completed: IndexMap<String, serde_json::Value>,
    },

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::ConfigError(err.to_string())
    }
}

impl CoreError {
    /// Whether this error represents a deliberate user abort rather than
    /// a fault. Cancellations flow through the normal result channel but
    /// are not logged as errors.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::UserCancelled)
    }
}
