//! Locker interceptor: exclusive project lock for mutating stages.
//! Acquired in `before`, parked on the context, released in `after` on
//! every exit path.

use crate::context::{StageContext, StageResult};
use crate::error::CoreError;
use crate::locking::LockManager;
use crate::middleware::Interceptor;
use async_trait::async_trait;
use std::sync::Arc;

pub struct LockerInterceptor {
    manager: Arc<LockManager>,
}

impl LockerInterceptor {
    pub fn new(manager: Arc<LockManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Interceptor for LockerInterceptor {
    fn name(&self) -> &str {
        "locker"
    }

    async fn before(&self, ctx: &mut StageContext) -> Result<(), CoreError> {
        let project = ctx.request.project_path()?;
        let handle = self.manager.acquire(&project, ctx.owner()).await?;
        ctx.lock = Some(handle);
        Ok(())
    }

    async fn after(&self, ctx: &mut StageContext, result: StageResult) -> StageResult {
        if let Some(handle) = ctx.lock.take() {
            handle.release();
        }
        result
    }
}
