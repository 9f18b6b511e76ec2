//! Project scaffolding.

use crate::context::{StageContext, StageOutput, StageResult};
use crate::environment::{self, ENV_MARKER_KEY};
use crate::error::CoreError;
use crate::middleware::StageHandler;
use crate::request::keys;
use crate::settings::{self, ProjectSettings, SCHEMA_VERSION};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::path::PathBuf;
use tracing::info;

/// Default environment every new project starts with.
const DEFAULT_ENV: &str = "dev";

pub struct CreateStage;

#[async_trait]
impl StageHandler for CreateStage {
    async fn run(&self, ctx: &mut StageContext) -> StageResult {
        let app_name = ctx
            .request
            .str_param(keys::APP_NAME)
            .ok_or_else(|| CoreError::MissingInput(keys::APP_NAME.to_string()))?
            .to_string();
        if !is_valid_app_name(&app_name) {
            return Err(CoreError::InvalidInput {
                name: keys::APP_NAME.to_string(),
                reason: "use letters, digits, `-` and `_` only".to_string(),
            });
        }

        let folder = ctx
            .request
            .str_param(keys::FOLDER)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let project = folder.join(&app_name);
        if settings::manifest_path(&project).exists() {
            return Err(CoreError::InvalidInput {
                name: keys::APP_NAME.to_string(),
                reason: format!("{} already contains a project", project.display()),
            });
        }

        let plugins = ctx.request.list_param(keys::PLUGINS).unwrap_or_default();
        let new_settings = ProjectSettings {
            name: app_name.clone(),
            tracking_id: settings::new_tracking_id(),
            version: SCHEMA_VERSION.to_string(),
            plugins,
        };
        settings::write_settings(&project, &new_settings)?;

        let mut seed = IndexMap::new();
        seed.insert(ENV_MARKER_KEY.to_string(), DEFAULT_ENV.to_string());
        environment::write_env(&project, DEFAULT_ENV, &seed)?;

        // Later interceptors and callers read the resolved path back.
        ctx.request
            .set_param(keys::PROJECT_PATH, project.to_string_lossy().to_string());

        info!(project = %project.display(), "project created");
        Ok(StageOutput::Path(project))
    }
}

fn is_valid_app_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
