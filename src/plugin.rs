//! Plugin Registry
//!
//! Domain plugins own the concrete cloud work behind the fan-out
//! stages. The executor only requires them to be polymorphic over
//! `run(task, args)`; which tasks a plugin offers is declared through
//! `supports`.

use crate::error::CoreError;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Kind of work a fan-out stage asks a plugin to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Provision,
    Deploy,
    Publish,
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Provision => "provision",
            TaskKind::Deploy => "deploy",
            TaskKind::Publish => "publish",
        }
    }
}

/// Read-only inputs handed to every sub-task of one stage invocation.
#[derive(Debug, Clone)]
pub struct PluginRunArgs {
    pub project_path: PathBuf,
    pub env: Option<String>,
    pub params: IndexMap<String, serde_json::Value>,
    /// Env vars loaded for the target environment, if any.
    pub env_vars: IndexMap<String, String>,
}

/// A domain plugin contributing sub-tasks to lifecycle stages.
///
/// A successful `run` returns a JSON object; its string-valued entries
/// are folded into the produced env map and persisted. Success implies
/// the plugin's external effects are committed; the executor never
/// rolls a completed plugin back.
#[async_trait]
pub trait StagePlugin: Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self, task: TaskKind) -> bool;

    async fn run(&self, task: TaskKind, args: &PluginRunArgs)
        -> Result<serde_json::Value, CoreError>;
}

/// Registry of the plugins available to a dispatcher.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn StagePlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn StagePlugin>) {
        self.plugins.push(plugin);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StagePlugin>> {
        self.plugins.iter().find(|p| p.name() == name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Resolve `names` (a project's declared plugins, optionally
    /// narrowed by a request selection) to plugins supporting `task`,
    /// preserving the declared order.
    pub fn select(
        &self,
        names: &[String],
        selection: Option<&[String]>,
        task: TaskKind,
    ) -> Result<Vec<Arc<dyn StagePlugin>>, CoreError> {
        let mut selected = Vec::new();
        for name in names {
            if let Some(filter) = selection {
                if !filter.contains(name) {
                    continue;
                }
            }
            let plugin = self.get(name).ok_or_else(|| CoreError::InvalidInput {
                name: "plugins".to_string(),
                reason: format!("plugin `{}` is not registered", name),
            })?;
            if plugin.supports(task) {
                selected.push(plugin);
            }
        }
        Ok(selected)
    }
}
