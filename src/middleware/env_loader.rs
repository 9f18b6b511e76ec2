//! Environment loader interceptor: snapshots project settings and the
//! target environment's variables into the context.

use crate::context::StageContext;
use crate::environment;
use crate::error::CoreError;
use crate::middleware::Interceptor;
use crate::request::keys;
use crate::settings;
use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::debug;

pub struct EnvLoaderInterceptor {
    /// Whether a missing env file is an error or an empty snapshot.
    require_env_file: bool,
}

impl EnvLoaderInterceptor {
    pub fn new(require_env_file: bool) -> Self {
        Self { require_env_file }
    }
}

#[async_trait]
impl Interceptor for EnvLoaderInterceptor {
    fn name(&self) -> &str {
        "env-loader"
    }

    async fn before(&self, ctx: &mut StageContext) -> Result<(), CoreError> {
        let project = ctx.request.project_path()?;
        ctx.settings = Some(settings::read_settings(&project)?);

        let env = ctx
            .request
            .env()
            .ok_or_else(|| CoreError::MissingInput(keys::ENV.to_string()))?
            .to_string();

        let env_file = environment::env_file_path(&project, &env);
        if env_file.exists() {
            let vars = environment::load_env(&project, &env)?;
            debug!(env = %env, count = vars.len(), "environment loaded");
            ctx.loaded_env = Some(vars);
        } else if self.require_env_file {
            return Err(CoreError::FileNotFound(env_file));
        } else {
            ctx.loaded_env = Some(IndexMap::new());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Platform, Stage, StageRequest};
    use crate::settings::{ProjectSettings, SCHEMA_VERSION};
    use std::fs;
    use tempfile::TempDir;

    fn project_with_env(dir: &TempDir) {
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
        let env_dir = dir.path().join(environment::ENV_DIR);
        fs::create_dir_all(&env_dir).unwrap();
        fs::write(env_dir.join(".env.dev"), "STAGEHAND_ENV=dev\nFOO=1\n").unwrap();
    }

    fn ctx_for(dir: &TempDir, env: Option<&str>) -> StageContext {
        let mut request = StageRequest::new(Platform::Cli)
            .with_param(keys::PROJECT_PATH, dir.path().to_string_lossy().to_string());
        if let Some(env) = env {
            request.set_param(keys::ENV, env);
        }
        StageContext::new(Stage::Deploy, request)
    }

    #[tokio::test]
    async fn loads_settings_and_env_snapshot() {
        let dir = TempDir::new().unwrap();
        project_with_env(&dir);
        let mut ctx = ctx_for(&dir, Some("dev"));

        EnvLoaderInterceptor::new(true).before(&mut ctx).await.unwrap();

        assert_eq!(ctx.settings.as_ref().unwrap().name, "demo");
        let env = ctx.loaded_env.as_ref().unwrap();
        assert_eq!(env.get("FOO").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn missing_env_name_is_missing_input() {
        let dir = TempDir::new().unwrap();
        project_with_env(&dir);
        let mut ctx = ctx_for(&dir, None);

        let err = EnvLoaderInterceptor::new(false)
            .before(&mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingInput(k) if k == "env"));
    }

    #[tokio::test]
    async fn missing_env_file_tolerated_when_not_required() {
        let dir = TempDir::new().unwrap();
        project_with_env(&dir);
        let mut ctx = ctx_for(&dir, Some("prod"));

        EnvLoaderInterceptor::new(false).before(&mut ctx).await.unwrap();
        assert!(ctx.loaded_env.as_ref().unwrap().is_empty());

        let err = EnvLoaderInterceptor::new(true)
            .before(&mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::FileNotFound(_)));
    }
}
