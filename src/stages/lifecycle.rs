//! Fan-out stages (provision, deploy, publish): resolve the project's
//! declared plugins, run their sub-tasks concurrently, and fold the
//! outputs into the produced env map. Partial failures fold too, so
//! already-committed effects stay visible.

use crate::context::{StageContext, StageOutput, StageResult};
use crate::error::CoreError;
use crate::executor::{execute_concurrently, AggregateResult, NamedThunk};
use crate::middleware::StageHandler;
use crate::plugin::{PluginRegistry, PluginRunArgs, TaskKind};
use crate::request::keys;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::info;

pub struct FanoutStage {
    task: TaskKind,
    registry: Arc<PluginRegistry>,
}

impl FanoutStage {
    pub fn new(task: TaskKind, registry: Arc<PluginRegistry>) -> Self {
        Self { task, registry }
    }
}

#[async_trait]
impl StageHandler for FanoutStage {
    async fn run(&self, ctx: &mut StageContext) -> StageResult {
        let project = ctx.request.project_path()?;
        let settings = ctx
            .settings
            .as_ref()
            .ok_or_else(|| CoreError::Unexpected("project settings not loaded".to_string()))?;

        let selection = ctx.request.list_param(keys::PLUGINS);
        let plugins = self
            .registry
            .select(&settings.plugins, selection.as_deref(), self.task)?;
        if plugins.is_empty() {
            return Err(CoreError::InvalidInput {
                name: keys::PLUGINS.to_string(),
                reason: format!("no declared plugin supports `{}`", self.task.name()),
            });
        }

        let args = PluginRunArgs {
            project_path: project,
            env: ctx.request.env().map(str::to_string),
            params: ctx.request.params().clone(),
            env_vars: ctx.loaded_env.clone().unwrap_or_default(),
        };

        let task = self.task;
        let thunks: Vec<NamedThunk> = plugins
            .iter()
            .map(|plugin| {
                let plugin = Arc::clone(plugin);
                let args = args.clone();
                NamedThunk::new(plugin.name().to_string(), task.name(), async move {
                    plugin.run(task, &args).await
                })
            })
            .collect();

        match execute_concurrently(thunks).await {
            AggregateResult::Success(outputs) => {
                fold_env_outputs(ctx, &outputs);
                info!(task = task.name(), plugins = outputs.len(), "fan-out succeeded");
                Ok(StageOutput::Json(serde_json::Value::Object(
                    outputs.into_iter().collect(),
                )))
            }
            AggregateResult::Failure(error) => Err(error),
            AggregateResult::PartialFailure { error, partial } => {
                fold_env_outputs(ctx, &partial);
                Err(CoreError::PartialFailure {
                    source: Box::new(error),
                    completed: partial,
                })
            }
        }
    }
}

/// String-valued entries of each plugin's output object become produced
/// env vars.
fn fold_env_outputs(ctx: &mut StageContext, outputs: &IndexMap<String, serde_json::Value>) {
    for output in outputs.values() {
        if let Some(object) = output.as_object() {
            for (key, value) in object {
                if let Some(text) = value.as_str() {
                    ctx.record_env_var(key, text);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::StagePlugin;
    use crate::request::{Platform, Stage, StageRequest};
    use crate::settings::{ProjectSettings, SCHEMA_VERSION};
    use serde_json::json;

    struct ScriptedPlugin {
        name: &'static str,
        outcome: Result<serde_json::Value, String>,
    }

    #[async_trait]
    impl StagePlugin for ScriptedPlugin {
        fn name(&self) -> &str {
            self.name
        }

        fn supports(&self, _task: TaskKind) -> bool {
            true
        }

        async fn run(
            &self,
            _task: TaskKind,
            _args: &PluginRunArgs,
        ) -> Result<serde_json::Value, CoreError> {
            self.outcome
                .clone()
                .map_err(CoreError::Plugin)
        }
    }

    fn ctx_with_settings(plugins: Vec<String>) -> StageContext {
        let request = StageRequest::new(Platform::Cli)
            .with_param(keys::PROJECT_PATH, "/tmp/demo")
            .with_param(keys::ENV, "dev");
        let mut ctx = StageContext::new(Stage::Deploy, request);
        ctx.settings = Some(ProjectSettings {
            name: "demo".to_string(),
            tracking_id: "t".to_string(),
            version: SCHEMA_VERSION.to_string(),
            plugins,
        });
        ctx
    }

    fn registry(plugins: Vec<ScriptedPlugin>) -> Arc<PluginRegistry> {
        let mut registry = PluginRegistry::new();
        for plugin in plugins {
            registry.register(Arc::new(plugin));
        }
        Arc::new(registry)
    }

    #[tokio::test]
    async fn partial_failure_still_records_env_outputs() {
        let registry = registry(vec![
            ScriptedPlugin {
                name: "web",
                outcome: Ok(json!({"WEB_URL": "https://web.test"})),
            },
            ScriptedPlugin {
                name: "bot",
                outcome: Err("no capacity".to_string()),
            },
        ]);
        let stage = FanoutStage::new(TaskKind::Deploy, registry);
        let mut ctx = ctx_with_settings(vec!["web".to_string(), "bot".to_string()]);

        let err = stage.run(&mut ctx).await.unwrap_err();
        match err {
            CoreError::PartialFailure { source, completed } => {
                assert!(completed.contains_key("web"));
                assert!(matches!(*source, CoreError::SubTask { ref plugin, .. } if plugin == "bot"));
            }
            other => panic!("expected partial failure, got {:?}", other),
        }
        let produced = ctx.produced_env.as_ref().unwrap();
        assert_eq!(
            produced.get("WEB_URL").map(String::as_str),
            Some("https://web.test")
        );
    }

    #[tokio::test]
    async fn no_capable_plugin_is_invalid_input() {
        let stage = FanoutStage::new(TaskKind::Deploy, Arc::new(PluginRegistry::new()));
        let mut ctx = ctx_with_settings(Vec::new());

        assert!(matches!(
            stage.run(&mut ctx).await,
            Err(CoreError::InvalidInput { .. })
        ));
    }
}
