//! Environment writer interceptor: persists env vars the stage body
//! produced. Runs in `after`, and runs on failure too, so the outputs
//! of sub-tasks that completed before a sibling failed are not lost.

use crate::context::{StageContext, StageResult};
use crate::environment;
use crate::error::StoreError;
use crate::middleware::Interceptor;
use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::{debug, warn};

pub struct EnvWriterInterceptor;

#[async_trait]
impl Interceptor for EnvWriterInterceptor {
    fn name(&self) -> &str {
        "env-writer"
    }

    async fn after(&self, ctx: &mut StageContext, result: StageResult) -> StageResult {
        let produced = match ctx.produced_env.take() {
            Some(produced) if !produced.is_empty() => produced,
            _ => return result,
        };
        let project = match ctx.request.project_path() {
            Ok(project) => project,
            Err(_) => return result,
        };
        let env = match ctx.request.env() {
            Some(env) => env.to_string(),
            None => {
                warn!("produced env vars but no target environment; nothing persisted");
                return result;
            }
        };

        let mut merged = match environment::load_env(&project, &env) {
            Ok(existing) => existing,
            Err(StoreError::FileNotFound(_)) => IndexMap::new(),
            Err(e) => {
                warn!(env = %env, "could not read existing env file: {}", e);
                IndexMap::new()
            }
        };
        for (key, value) in produced {
            merged.insert(key, value);
        }

        match environment::write_env(&project, &env, &merged) {
            Ok(()) => {
                debug!(env = %env, count = merged.len(), "environment persisted");
                result
            }
            // A write failure must not mask the stage's own error.
            Err(e) => match result {
                Ok(_) => Err(e.into()),
                Err(original) => {
                    warn!(env = %env, "failed to persist environment after stage error: {}", e);
                    Err(original)
                }
            },
        }
    }
}
