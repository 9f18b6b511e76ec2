//! CLI route: builds the dispatcher once and maps each subcommand to a
//! stage request.

use crate::cli::parse::Commands;
use crate::cli::presentation;
use crate::config::StagehandConfig;
use crate::context::StageOutput;
use crate::dispatch::{Dispatcher, Tools};
use crate::error::CoreError;
use crate::locking::LockManager;
use crate::plugin::PluginRegistry;
use crate::question::CliQuestionProvider;
use crate::request::{keys, Platform, Stage, StageRequest};
use std::path::PathBuf;
use std::sync::Arc;

/// Runtime context for CLI execution: the dispatcher and the project
/// root the invocation targets.
pub struct RunContext {
    dispatcher: Dispatcher,
    project: PathBuf,
}

impl RunContext {
    pub fn new(project: PathBuf, config: &StagehandConfig) -> Self {
        let tools = Tools {
            questions: Arc::new(CliQuestionProvider),
            plugins: Arc::new(PluginRegistry::new()),
            locks: LockManager::new(config.lock.clone()),
        };
        Self {
            dispatcher: Dispatcher::new(tools),
            project,
        }
    }

    /// Execute one subcommand and render its output for the terminal.
    pub async fn execute(&self, command: &Commands) -> Result<String, CoreError> {
        let (stage, request) = self.request_for(command);
        let output = self.dispatcher.dispatch(stage, request).await?;
        Ok(render(stage, &output))
    }

    fn request_for(&self, command: &Commands) -> (Stage, StageRequest) {
        let base = || {
            StageRequest::new(Platform::Cli).with_param(
                keys::PROJECT_PATH,
                self.project.to_string_lossy().to_string(),
            )
        };

        match command {
            Commands::Create {
                name,
                folder,
                plugins,
            } => {
                let mut request = StageRequest::new(Platform::Cli)
                    .with_param(keys::FOLDER, folder.to_string_lossy().to_string());
                if let Some(name) = name {
                    request.set_param(keys::APP_NAME, name.clone());
                }
                if !plugins.is_empty() {
                    request.set_param(keys::PLUGINS, plugin_list(plugins));
                }
                (Stage::Create, request)
            }
            Commands::Provision { env, plugins } => {
                let mut request = base();
                if let Some(env) = env {
                    request.set_param(keys::ENV, env.clone());
                }
                if !plugins.is_empty() {
                    request.set_param(keys::PLUGINS, plugin_list(plugins));
                }
                (Stage::Provision, request)
            }
            Commands::Deploy { env, plugins } => {
                let mut request = base().with_param(keys::ENV, env.clone());
                if !plugins.is_empty() {
                    request.set_param(keys::PLUGINS, plugin_list(plugins));
                }
                (Stage::Deploy, request)
            }
            Commands::Publish { env } => (Stage::Publish, base().with_param(keys::ENV, env.clone())),
            Commands::Validate { env } => {
                let mut request = base();
                if let Some(env) = env {
                    request.set_param(keys::ENV, env.clone());
                }
                (Stage::Validate, request)
            }
            Commands::CreateEnv { name, from } => {
                let mut request = base();
                if let Some(name) = name {
                    request.set_param(keys::TARGET_ENV, name.clone());
                }
                if let Some(from) = from {
                    request.set_param(keys::SOURCE_ENV, from.clone());
                }
                (Stage::CreateEnv, request)
            }
            Commands::Migrate => (Stage::Migrate, base()),
            Commands::VersionCheck => (Stage::VersionCheck, base()),
        }
    }
}

fn plugin_list(plugins: &[String]) -> serde_json::Value {
    serde_json::Value::Array(
        plugins
            .iter()
            .map(|p| serde_json::Value::String(p.clone()))
            .collect(),
    )
}

fn render(stage: Stage, output: &StageOutput) -> String {
    match (stage, output) {
        (_, StageOutput::Path(path)) => {
            presentation::success_line(&format!("Created {}", path.display()))
        }
        (Stage::VersionCheck, StageOutput::Json(report)) => {
            presentation::format_version_report(report)
        }
        (Stage::Validate, StageOutput::Json(report)) => {
            presentation::format_validation_report(report)
        }
        (_, StageOutput::Json(value)) => presentation::format_json_output(stage, value),
        (_, StageOutput::None) => presentation::success_line(&format!("{} finished", stage)),
    }
}
