//! Interceptor chain composer.
//!
//! Before-hooks run in list order, the stage body runs once, then the
//! after-hooks of every interceptor that was entered run in reverse
//! order, so the interceptor that acquired a resource first releases it
//! last. A failing before-hook short-circuits the rest of the chain but
//! still unwinds the interceptors already entered. Panics anywhere
//! inside the chain are caught and normalized into the same error
//! channel; the chain's exit is always a structured result.

use crate::context::{StageContext, StageResult};
use crate::error::CoreError;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// A named unit of before/after logic wrapping a stage body.
///
/// Interceptors are stateless across invocations; everything they need
/// to communicate travels through the `StageContext`.
#[async_trait]
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &str;

    /// Runs before the stage body. An error short-circuits the chain.
    async fn before(&self, _ctx: &mut StageContext) -> Result<(), CoreError> {
        Ok(())
    }

    /// Runs after the stage body (or after a short-circuit), in reverse
    /// list order. May transform or replace the in-flight result.
    async fn after(&self, _ctx: &mut StageContext, result: StageResult) -> StageResult {
        result
    }
}

/// A stage body.
#[async_trait]
pub trait StageHandler: Send + Sync {
    async fn run(&self, ctx: &mut StageContext) -> StageResult;
}

/// Execute `handler` wrapped in `interceptors`.
///
/// Composition has no side effects beyond the hooks themselves, so
/// running the same list twice yields identical hook orderings.
pub async fn run_chain(
    interceptors: &[Arc<dyn Interceptor>],
    handler: &dyn StageHandler,
    ctx: &mut StageContext,
) -> StageResult {
    let mut entered = 0usize;
    let mut short_circuit = None;

    for interceptor in interceptors {
        debug!(interceptor = interceptor.name(), "before");
        match AssertUnwindSafe(interceptor.before(ctx)).catch_unwind().await {
            Ok(Ok(())) => entered += 1,
            Ok(Err(e)) => {
                short_circuit = Some(e);
                break;
            }
            Err(payload) => {
                short_circuit = Some(CoreError::Unexpected(panic_message(payload)));
                break;
            }
        }
    }

    let mut result = match short_circuit {
        Some(e) => Err(e),
        None => match AssertUnwindSafe(handler.run(ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(CoreError::Unexpected(panic_message(payload))),
        },
    };

    for interceptor in interceptors[..entered].iter().rev() {
        debug!(interceptor = interceptor.name(), "after");
        result = match AssertUnwindSafe(interceptor.after(ctx, result))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => {
                warn!(
                    interceptor = interceptor.name(),
                    "after-hook panicked; result replaced"
                );
                Err(CoreError::Unexpected(panic_message(payload)))
            }
        };
    }

    result
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "stage panicked".to_string()
    }
}
