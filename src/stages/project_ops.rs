//! Project-level operations: explicit migration, version reporting, and
//! manifest validation.

use crate::context::{StageContext, StageOutput, StageResult};
use crate::environment;
use crate::error::{CoreError, StoreError};
use crate::middleware::StageHandler;
use crate::migration::{self, VersionSource, VersionState};
use crate::plugin::PluginRegistry;
use crate::settings;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Explicitly demanded migration. Rejected as redundant when the
/// project is already on the current schema.
pub struct MigrateStage;

#[async_trait]
impl StageHandler for MigrateStage {
    async fn run(&self, ctx: &mut StageContext) -> StageResult {
        let project = ctx.request.project_path()?;
        let info = migration::read_project_version(&project);

        match info.source {
            VersionSource::Unknown => Err(CoreError::InvalidProject(format!(
                "no recognizable project metadata in {}",
                project.display()
            ))),
            VersionSource::Manifest => Err(CoreError::NoUpgradeNeeded),
            VersionSource::LegacySettings => {
                let legacy = migration::read_legacy_settings(&project)?;
                migration::validate_legacy(&legacy)?;
                let migrated = migration::migrate_project(&project)?;
                info!(project = %project.display(), "explicit migration finished");
                Ok(StageOutput::Json(json!({
                    "name": migrated.name,
                    "version": migrated.version,
                })))
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct VersionReport {
    version: Option<String>,
    tracking_id: Option<String>,
    source: VersionSource,
    state: VersionState,
}

/// Read-only version probe; runs without a lock and treats what it
/// reads as a point-in-time snapshot.
pub struct VersionCheckStage;

#[async_trait]
impl StageHandler for VersionCheckStage {
    async fn run(&self, ctx: &mut StageContext) -> StageResult {
        let project = ctx.request.project_path()?;
        let info = migration::read_project_version(&project);
        if info.source == VersionSource::Unknown {
            return Err(CoreError::InvalidProject(format!(
                "no recognizable project metadata in {}",
                project.display()
            )));
        }

        let tracking_id = match info.source {
            VersionSource::Manifest => settings::read_settings(&project)
                .ok()
                .map(|s| s.tracking_id),
            VersionSource::LegacySettings => migration::read_legacy_settings(&project)
                .ok()
                .and_then(|legacy| legacy.tracking_id),
            VersionSource::Unknown => None,
        };

        let report = VersionReport {
            state: migration::version_state(&info),
            tracking_id,
            source: info.source,
            version: info.version,
        };
        Ok(StageOutput::Json(
            serde_json::to_value(report).map_err(StoreError::from)?,
        ))
    }
}

/// Checks that the manifest's declared plugins resolve and the selected
/// environment exists; reports problems rather than failing on the
/// first one.
pub struct ValidateStage {
    registry: Arc<PluginRegistry>,
}

impl ValidateStage {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl StageHandler for ValidateStage {
    async fn run(&self, ctx: &mut StageContext) -> StageResult {
        let project = ctx.request.project_path()?;
        let settings = ctx
            .settings
            .as_ref()
            .ok_or_else(|| CoreError::Unexpected("project settings not loaded".to_string()))?;

        let mut problems = Vec::new();
        for plugin_name in &settings.plugins {
            if self.registry.get(plugin_name).is_none() {
                problems.push(format!("plugin `{}` is not registered", plugin_name));
            }
        }
        if let Some(env) = ctx.request.env() {
            if !environment::env_file_path(&project, env).exists() {
                problems.push(format!("environment `{}` has no env file", env));
            }
        }

        Ok(StageOutput::Json(json!({
            "valid": problems.is_empty(),
            "problems": problems,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{keys, Platform, Stage, StageRequest};
    use crate::settings::{ProjectSettings, SCHEMA_VERSION};
    use std::fs;
    use tempfile::TempDir;

    fn ctx_for(dir: &TempDir, stage: Stage) -> StageContext {
        let request = StageRequest::new(Platform::Cli)
            .with_param(keys::PROJECT_PATH, dir.path().to_string_lossy().to_string());
        StageContext::new(stage, request)
    }

    #[tokio::test]
    async fn migrate_on_current_project_is_redundant() {
        let dir = TempDir::new().unwrap();
        settings::write_settings(
            dir.path(),
            &ProjectSettings {
                name: "demo".to_string(),
                tracking_id: "t".to_string(),
                version: SCHEMA_VERSION.to_string(),
                plugins: vec!["web".to_string()],
            },
        )
        .unwrap();

        let mut ctx = ctx_for(&dir, Stage::Migrate);
        assert!(matches!(
            MigrateStage.run(&mut ctx).await,
            Err(CoreError::NoUpgradeNeeded)
        ));
    }

    #[tokio::test]
    async fn migrate_upgrades_a_valid_legacy_project() {
        let dir = TempDir::new().unwrap();
        let legacy = migration::legacy_settings_path(dir.path());
        fs::create_dir_all(legacy.parent().unwrap()).unwrap();
        fs::write(&legacy, r#"{"name": "old", "plugins": ["web"]}"#).unwrap();

        let mut ctx = ctx_for(&dir, Stage::Migrate);
        let output = MigrateStage.run(&mut ctx).await.unwrap();
        let report = output.as_json().unwrap();
        assert_eq!(report["version"], SCHEMA_VERSION);
        assert!(settings::manifest_path(dir.path()).exists());
    }

    #[tokio::test]
    async fn version_check_reports_state_and_source() {
        let dir = TempDir::new().unwrap();
        settings::write_settings(
            dir.path(),
            &ProjectSettings {
                name: "demo".to_string(),
                tracking_id: "trk-1".to_string(),
                version: SCHEMA_VERSION.to_string(),
                plugins: vec![],
            },
        )
        .unwrap();

        let mut ctx = ctx_for(&dir, Stage::VersionCheck);
        let output = VersionCheckStage.run(&mut ctx).await.unwrap();
        let report = output.as_json().unwrap();
        assert_eq!(report["state"], "compatible");
        assert_eq!(report["source"], "manifest");
        assert_eq!(report["tracking_id"], "trk-1");
    }

    #[tokio::test]
    async fn version_check_refuses_unknown_directories() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ctx_for(&dir, Stage::VersionCheck);
        assert!(matches!(
            VersionCheckStage.run(&mut ctx).await,
            Err(CoreError::InvalidProject(_))
        ));
    }

    #[tokio::test]
    async fn validate_reports_unresolvable_plugins() {
        let dir = TempDir::new().unwrap();
        let mut ctx = ctx_for(&dir, Stage::Validate);
        ctx.settings = Some(ProjectSettings {
            name: "demo".to_string(),
            tracking_id: "t".to_string(),
            version: SCHEMA_VERSION.to_string(),
            plugins: vec!["ghost".to_string()],
        });

        let output = ValidateStage::new(Arc::new(PluginRegistry::new()))
            .run(&mut ctx)
            .await
            .unwrap();
        let report = output.as_json().unwrap();
        assert_eq!(report["valid"], false);
        assert_eq!(report["problems"].as_array().unwrap().len(), 1);
    }
}
