//! Question collection interceptor: fills missing request parameters by
//! asking through the configured provider before the stage runs.

use crate::context::StageContext;
use crate::environment;
use crate::error::CoreError;
use crate::middleware::Interceptor;
use crate::question::{Answer, Question, QuestionProvider};
use crate::request::keys;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Computes the questions a stage still needs answered, given the
/// current context. Returning an empty list means nothing to ask.
pub type QuestionSpec = fn(&StageContext) -> Vec<Question>;

pub struct QuestionsInterceptor {
    provider: Arc<dyn QuestionProvider>,
    spec: QuestionSpec,
}

impl QuestionsInterceptor {
    pub fn new(provider: Arc<dyn QuestionProvider>, spec: QuestionSpec) -> Self {
        Self { provider, spec }
    }
}

#[async_trait]
impl Interceptor for QuestionsInterceptor {
    fn name(&self) -> &str {
        "questions"
    }

    async fn before(&self, ctx: &mut StageContext) -> Result<(), CoreError> {
        let questions = (self.spec)(ctx);
        for question in questions {
            let answer = self.provider.ask(&question)?;
            debug!(id = %question.id, "question answered");
            match answer {
                Answer::Text(value) => ctx.request.set_param(&question.id, value),
                Answer::Bool(value) => ctx.request.set_param(&question.id, value),
            }
        }
        Ok(())
    }
}

/// Questions for project scaffolding.
pub fn create_questions(ctx: &StageContext) -> Vec<Question> {
    let mut questions = Vec::new();
    if ctx.request.str_param(keys::APP_NAME).is_none() {
        questions.push(Question::input(keys::APP_NAME, "Application name"));
    }
    questions
}

/// Ask for the target environment when the request does not name one
/// and the project has environments to choose from.
pub fn env_selection_questions(ctx: &StageContext) -> Vec<Question> {
    if ctx.request.env().is_some() {
        return Vec::new();
    }
    let Ok(project) = ctx.request.project_path() else {
        return Vec::new();
    };
    match environment::list_envs(&project) {
        Ok(envs) if !envs.is_empty() => {
            vec![Question::select(keys::ENV, "Select an environment", envs)]
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::StaticQuestionProvider;
    use crate::request::{Platform, Stage, StageRequest};
    use std::fs;
    use tempfile::TempDir;

    fn ctx_for(stage: Stage, request: StageRequest) -> StageContext {
        StageContext::new(stage, request)
    }

    #[tokio::test]
    async fn answers_land_in_request_params() {
        let provider = Arc::new(StaticQuestionProvider::new().with_text(keys::APP_NAME, "demo"));
        let interceptor = QuestionsInterceptor::new(provider, create_questions);
        let mut ctx = ctx_for(Stage::Create, StageRequest::new(Platform::Cli));

        interceptor.before(&mut ctx).await.unwrap();
        assert_eq!(ctx.request.str_param(keys::APP_NAME), Some("demo"));
    }

    #[tokio::test]
    async fn declined_question_cancels() {
        let provider = Arc::new(StaticQuestionProvider::new());
        let interceptor = QuestionsInterceptor::new(provider, create_questions);
        let mut ctx = ctx_for(Stage::Create, StageRequest::new(Platform::Cli));

        let err = interceptor.before(&mut ctx).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn env_question_lists_existing_envs() {
        let dir = TempDir::new().unwrap();
        let env_dir = dir.path().join(environment::ENV_DIR);
        fs::create_dir_all(&env_dir).unwrap();
        fs::write(env_dir.join(".env.dev"), "STAGEHAND_ENV=dev\n").unwrap();

        let request = StageRequest::new(Platform::Cli)
            .with_param(keys::PROJECT_PATH, dir.path().to_string_lossy().to_string());
        let ctx = ctx_for(Stage::Provision, request);

        let questions = env_selection_questions(&ctx);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, keys::ENV);
    }

    #[tokio::test]
    async fn env_question_skipped_when_env_given() {
        let request = StageRequest::new(Platform::Cli).with_param(keys::ENV, "dev");
        let ctx = ctx_for(Stage::Provision, request);
        assert!(env_selection_questions(&ctx).is_empty());
    }
}
