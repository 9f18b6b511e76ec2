//! Stage requests: stage identifiers, platforms, and the input bag a
//! caller hands to the dispatcher.

use crate::error::CoreError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Well-known request parameter keys.
pub mod keys {
    pub const PROJECT_PATH: &str = "project_path";
    pub const ENV: &str = "env";
    pub const SOURCE_ENV: &str = "source_env";
    pub const TARGET_ENV: &str = "target_env";
    pub const APP_NAME: &str = "app_name";
    pub const FOLDER: &str = "folder";
    pub const PLUGINS: &str = "plugins";
}

/// One user-invocable lifecycle operation on a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Create,
    Provision,
    Deploy,
    Publish,
    Validate,
    CreateEnv,
    Migrate,
    VersionCheck,
}

impl Stage {
    /// Every stage, in registration order.
    pub const ALL: [Stage; 8] = [
        Stage::Create,
        Stage::Provision,
        Stage::Deploy,
        Stage::Publish,
        Stage::Validate,
        Stage::CreateEnv,
        Stage::Migrate,
        Stage::VersionCheck,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Create => "create",
            Stage::Provision => "provision",
            Stage::Deploy => "deploy",
            Stage::Publish => "publish",
            Stage::Validate => "validate",
            Stage::CreateEnv => "create-env",
            Stage::Migrate => "migrate",
            Stage::VersionCheck => "version-check",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the invocation originates from. Affects presentation only,
/// never control flow inside the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Cli,
    Editor,
}

/// Input bag for one stage invocation.
///
/// Callers fill it before dispatch; interceptors may add derived
/// parameters (e.g. answers to questions, resolved paths) but there is
/// deliberately no removal API, so a parameter one interceptor wrote is
/// still there for the interceptors after it.
#[derive(Debug, Clone)]
pub struct StageRequest {
    pub platform: Platform,
    params: IndexMap<String, serde_json::Value>,
}

impl StageRequest {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            params: IndexMap::new(),
        }
    }

    /// Builder-style parameter insertion for call sites.
    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn set_param(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.params.insert(key.to_string(), value.into());
    }

    pub fn param(&self, key: &str) -> Option<&serde_json::Value> {
        self.params.get(key)
    }

    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    /// String-array parameter (e.g. a plugin selection).
    pub fn list_param(&self, key: &str) -> Option<Vec<String>> {
        self.params.get(key).and_then(|v| v.as_array()).map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str().map(str::to_string))
                .collect()
        })
    }

    pub fn params(&self) -> &IndexMap<String, serde_json::Value> {
        &self.params
    }

    /// The project directory this request operates on.
    pub fn project_path(&self) -> Result<PathBuf, CoreError> {
        self.str_param(keys::PROJECT_PATH)
            .map(PathBuf::from)
            .ok_or_else(|| CoreError::MissingInput(keys::PROJECT_PATH.to_string()))
    }

    /// The target environment name, when one has been supplied or asked.
    pub fn env(&self) -> Option<&str> {
        self.str_param(keys::ENV)
    }
}
