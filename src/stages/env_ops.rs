//! Environment operations: creating a new named environment as a copy
//! of an existing one.

use crate::context::{StageContext, StageOutput, StageResult};
use crate::environment;
use crate::error::CoreError;
use crate::middleware::StageHandler;
use crate::question::{Question, QuestionProvider};
use crate::request::keys;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct CreateEnvStage {
    provider: Arc<dyn QuestionProvider>,
}

impl CreateEnvStage {
    pub fn new(provider: Arc<dyn QuestionProvider>) -> Self {
        Self { provider }
    }

    fn ask_text(&self, question: Question) -> Result<String, CoreError> {
        let answer = self.provider.ask(&question)?;
        answer
            .as_text()
            .map(str::to_string)
            .ok_or(CoreError::UserCancelled)
    }
}

#[async_trait]
impl StageHandler for CreateEnvStage {
    async fn run(&self, ctx: &mut StageContext) -> StageResult {
        let project = ctx.request.project_path()?;

        let existing = environment::list_envs(&project)?;
        if existing.is_empty() {
            return Err(CoreError::InvalidProject(format!(
                "{} has no environments to copy from",
                project.display()
            )));
        }

        let target = match ctx.request.str_param(keys::TARGET_ENV) {
            Some(target) => target.to_string(),
            None => self.ask_text(Question::input(keys::TARGET_ENV, "New environment name"))?,
        };
        if !is_valid_env_name(&target) {
            return Err(CoreError::InvalidInput {
                name: keys::TARGET_ENV.to_string(),
                reason: "use letters, digits, `-` and `_` only".to_string(),
            });
        }
        if existing.contains(&target) {
            return Err(CoreError::InvalidInput {
                name: keys::TARGET_ENV.to_string(),
                reason: format!("environment `{}` already exists", target),
            });
        }

        let source = match ctx.request.str_param(keys::SOURCE_ENV) {
            Some(source) => source.to_string(),
            None if existing.len() == 1 => existing[0].clone(),
            None => self.ask_text(Question::select(
                keys::SOURCE_ENV,
                "Copy settings from",
                existing.clone(),
            ))?,
        };

        environment::create_env_copy(&project, &target, &source)?;
        info!(target = %target, source = %source, "environment created");
        Ok(StageOutput::None)
    }
}

fn is_valid_env_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::StaticQuestionProvider;
    use crate::request::{Platform, Stage, StageRequest};
    use std::fs;
    use tempfile::TempDir;

    fn project_with_env(dir: &TempDir, env: &str, content: &str) {
        let path = environment::env_file_path(dir.path(), env);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn ctx_for(dir: &TempDir) -> StageContext {
        let request = StageRequest::new(Platform::Cli)
            .with_param(keys::PROJECT_PATH, dir.path().to_string_lossy().to_string());
        StageContext::new(Stage::CreateEnv, request)
    }

    #[tokio::test]
    async fn copies_single_source_without_asking_for_it() {
        let dir = TempDir::new().unwrap();
        project_with_env(&dir, "dev", "FOO=1\nSTAGEHAND_ENV=dev\n");

        let provider = StaticQuestionProvider::new().with_text(keys::TARGET_ENV, "prod");
        let stage = CreateEnvStage::new(Arc::new(provider));

        stage.run(&mut ctx_for(&dir)).await.unwrap();

        let copied =
            fs::read_to_string(environment::env_file_path(dir.path(), "prod")).unwrap();
        assert_eq!(copied, "FOO=1\nSTAGEHAND_ENV=prod\n");
    }

    #[tokio::test]
    async fn existing_target_is_rejected() {
        let dir = TempDir::new().unwrap();
        project_with_env(&dir, "dev", "STAGEHAND_ENV=dev\n");

        let provider = StaticQuestionProvider::new().with_text(keys::TARGET_ENV, "dev");
        let stage = CreateEnvStage::new(Arc::new(provider));

        assert!(matches!(
            stage.run(&mut ctx_for(&dir)).await,
            Err(CoreError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn declining_the_target_question_cancels() {
        let dir = TempDir::new().unwrap();
        project_with_env(&dir, "dev", "STAGEHAND_ENV=dev\n");

        let stage = CreateEnvStage::new(Arc::new(StaticQuestionProvider::new()));
        let err = stage.run(&mut ctx_for(&dir)).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
