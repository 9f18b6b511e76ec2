//! Execution context: the mutable bag of state threaded through one
//! stage invocation, and the result types that flow back out.

use crate::error::CoreError;
use crate::locking::LockHandle;
use crate::request::{Stage, StageRequest};
use crate::settings::ProjectSettings;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// Payload of a successful stage invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    /// The stage produced no value worth returning (effects only).
    None,
    /// The stage produced or resolved a filesystem path.
    Path(PathBuf),
    /// Structured stage-specific output.
    Json(serde_json::Value),
}

impl StageOutput {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            StageOutput::Json(v) => Some(v),
            _ => None,
        }
    }
}

/// Uniform result of a stage invocation after chain normalization.
pub type StageResult = Result<StageOutput, CoreError>;

/// Per-invocation execution context.
///
/// Created by the dispatcher, owned exclusively by one stage invocation
/// and dropped when it returns. Interceptors communicate through it:
/// the loader fills `settings` and `loaded_env`, stage bodies fill
/// `produced_env`, the writer persists it, the locker parks its handle
/// in `lock` so its after-hook can release on every exit path.
pub struct StageContext {
    pub stage: Stage,
    pub request: StageRequest,
    /// Project settings snapshot, filled by the loader interceptor.
    pub settings: Option<ProjectSettings>,
    /// Env vars read from the target env file, if any.
    pub loaded_env: Option<IndexMap<String, String>>,
    /// Env vars produced by the stage body; persisted by the writer
    /// after-hook even when the body failed part-way.
    pub produced_env: Option<IndexMap<String, String>>,
    /// Stage-specific side-channel data.
    pub extra: HashMap<String, serde_json::Value>,
    pub(crate) lock: Option<LockHandle>,
    owner: u64,
}

impl StageContext {
    pub fn new(stage: Stage, request: StageRequest) -> Self {
        Self {
            stage,
            request,
            settings: None,
            loaded_env: None,
            produced_env: None,
            extra: HashMap::new(),
            lock: None,
            owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Lock owner identity for this invocation. Stable for the lifetime
    /// of the context, unique across invocations in this process.
    pub fn owner(&self) -> u64 {
        self.owner
    }

    /// Record an env var produced by the stage body.
    pub fn record_env_var(&mut self, key: &str, value: &str) {
        self.produced_env
            .get_or_insert_with(IndexMap::new)
            .insert(key.to_string(), value.to_string());
    }
}
