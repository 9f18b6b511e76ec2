//! Migration gate interceptor: refuses unrecognizable projects and
//! upgrades legacy ones before any interceptor with side effects runs.
//! Ordered strictly before env-load and lock-acquire in every mutating
//! chain, so an invalid project never takes a lock.

use crate::context::StageContext;
use crate::error::CoreError;
use crate::middleware::Interceptor;
use crate::migration::{self, VersionSource, VersionState};
use crate::question::{Question, QuestionProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct MigrationGateInterceptor {
    provider: Arc<dyn QuestionProvider>,
}

impl MigrationGateInterceptor {
    pub fn new(provider: Arc<dyn QuestionProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Interceptor for MigrationGateInterceptor {
    fn name(&self) -> &str {
        "migration-gate"
    }

    async fn before(&self, ctx: &mut StageContext) -> Result<(), CoreError> {
        let project = ctx.request.project_path()?;
        let info = migration::read_project_version(&project);

        match info.source {
            VersionSource::Unknown => Err(CoreError::InvalidProject(format!(
                "no recognizable project metadata in {}",
                project.display()
            ))),
            VersionSource::Manifest => match migration::version_state(&info) {
                VersionState::Unsupported => Err(CoreError::InvalidProject(format!(
                    "project schema {} is newer than this tool supports",
                    info.version.as_deref().unwrap_or("?")
                ))),
                _ => Ok(()),
            },
            VersionSource::LegacySettings => {
                let legacy = migration::read_legacy_settings(&project)?;
                migration::validate_legacy(&legacy)?;

                let answer = self.provider.ask(&Question::confirm(
                    "upgrade",
                    "This project uses an older format. Upgrade it now?",
                    true,
                ))?;
                if !answer.as_bool().unwrap_or(false) {
                    return Err(CoreError::UserCancelled);
                }
                migration::migrate_project(&project)?;
                info!(project = %project.display(), "project upgraded before stage");
                Ok(())
            }
        }
    }
}
