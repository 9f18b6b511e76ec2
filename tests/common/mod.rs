//! Shared test utilities for integration tests.
//!
//! Builds throwaway projects and dispatchers wired with scripted
//! plugins and preset question answers.

use async_trait::async_trait;
use serde_json::Value;
use stagehand::config::LockConfig;
use stagehand::dispatch::{Dispatcher, Tools};
use stagehand::environment;
use stagehand::error::CoreError;
use stagehand::locking::LockManager;
use stagehand::plugin::{PluginRegistry, PluginRunArgs, StagePlugin, TaskKind};
use stagehand::question::StaticQuestionProvider;
use stagehand::settings::{self, ProjectSettings, SCHEMA_VERSION};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// A plugin whose outcome is fixed up front.
pub struct ScriptedPlugin {
    pub name: &'static str,
    pub outcome: Result<Value, String>,
}

#[async_trait]
impl StagePlugin for ScriptedPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn supports(&self, _task: TaskKind) -> bool {
        true
    }

    async fn run(&self, _task: TaskKind, _args: &PluginRunArgs) -> Result<Value, CoreError> {
        self.outcome.clone().map_err(CoreError::Plugin)
    }
}

/// Write a current-format project with the given plugins and a seeded
/// `dev` environment.
pub fn make_project(root: &Path, plugins: &[&str]) {
    settings::write_settings(
        root,
        &ProjectSettings {
            name: "demo".to_string(),
            tracking_id: "trk-test".to_string(),
            version: SCHEMA_VERSION.to_string(),
            plugins: plugins.iter().map(|p| p.to_string()).collect(),
        },
    )
    .unwrap();
    write_env_file(root, "dev", "STAGEHAND_ENV=dev\n");
}

pub fn write_env_file(root: &Path, env: &str, content: &str) {
    let path = environment::env_file_path(root, env);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

pub fn registry_of(plugins: Vec<ScriptedPlugin>) -> Arc<PluginRegistry> {
    let mut registry = PluginRegistry::new();
    for plugin in plugins {
        registry.register(Arc::new(plugin));
    }
    Arc::new(registry)
}

/// Dispatcher with scripted plugins and preset answers; returns the
/// lock manager too so tests can create contention.
pub fn dispatcher_with(
    registry: Arc<PluginRegistry>,
    questions: StaticQuestionProvider,
) -> (Dispatcher, Arc<LockManager>) {
    let locks = LockManager::new(LockConfig::default());
    let dispatcher = Dispatcher::new(Tools {
        questions: Arc::new(questions),
        plugins: registry,
        locks: Arc::clone(&locks),
    });
    (dispatcher, locks)
}
