//! Concurrent sub-task executor: fans a stage out across independent
//! plugin sub-tasks and folds their outcomes into one aggregate result
//! that keeps partial success visible.

use crate::error::CoreError;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use indexmap::IndexMap;
use std::future::Future;
use tracing::{debug, info};

/// A named unit of deferred work owned by one plugin.
pub struct NamedThunk {
    pub plugin_name: String,
    pub task_name: String,
    thunk: BoxFuture<'static, Result<serde_json::Value, CoreError>>,
}

impl NamedThunk {
    pub fn new(
        plugin_name: impl Into<String>,
        task_name: impl Into<String>,
        fut: impl Future<Output = Result<serde_json::Value, CoreError>> + Send + 'static,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            task_name: task_name.into(),
            thunk: fut.boxed(),
        }
    }
}

/// Aggregate outcome of one fan-out.
///
/// Outputs are keyed by plugin name in input order, for deterministic
/// reporting. `PartialFailure` means some sub-tasks committed external
/// effects before a sibling failed; those outputs are never discarded.
#[derive(Debug)]
pub enum AggregateResult {
    Success(IndexMap<String, serde_json::Value>),
    Failure(CoreError),
    PartialFailure {
        error: CoreError,
        partial: IndexMap<String, serde_json::Value>,
    },
}

/// Run every sub-task concurrently and wait for all of them to reach a
/// terminal state.
///
/// If several sub-tasks fail, the reported cause is the failure at the
/// earliest input position, independent of completion order. Completed
/// sub-tasks are never unwound; resuming from partial state is the
/// caller's responsibility.
pub async fn execute_concurrently(thunks: Vec<NamedThunk>) -> AggregateResult {
    let names: Vec<String> = thunks
        .iter()
        .map(|t| format!("{}/{}", t.plugin_name, t.task_name))
        .collect();
    info!(sub_tasks = %names.join(", "), count = names.len(), "executing sub-tasks concurrently");

    let total = thunks.len();
    let mut in_flight = FuturesUnordered::new();
    for (position, thunk) in thunks.into_iter().enumerate() {
        let NamedThunk {
            plugin_name,
            task_name,
            thunk,
        } = thunk;
        in_flight.push(async move { (position, plugin_name, task_name, thunk.await) });
    }

    let mut outcomes: Vec<Option<(String, String, Result<serde_json::Value, CoreError>)>> =
        (0..total).map(|_| None).collect();
    while let Some((position, plugin_name, task_name, outcome)) = in_flight.next().await {
        match &outcome {
            Ok(_) => debug!(plugin = %plugin_name, task = %task_name, "sub-task completed"),
            Err(e) => debug!(plugin = %plugin_name, task = %task_name, "sub-task failed: {}", e),
        }
        outcomes[position] = Some((plugin_name, task_name, outcome));
    }

    let mut successes = IndexMap::new();
    let mut first_error = None;
    let mut failed = 0usize;
    for slot in outcomes {
        let (plugin_name, task_name, outcome) =
            slot.expect("every sub-task reports exactly once");
        match outcome {
            Ok(output) => {
                successes.insert(plugin_name, output);
            }
            Err(cause) => {
                failed += 1;
                if first_error.is_none() {
                    first_error = Some(CoreError::SubTask {
                        plugin: plugin_name,
                        task: task_name,
                        source: Box::new(cause),
                    });
                }
            }
        }
    }

    match first_error {
        None => AggregateResult::Success(successes),
        Some(error) if successes.is_empty() => AggregateResult::Failure(error),
        Some(error) => {
            info!(
                completed = successes.len(),
                failed, "fan-out partially failed; completed outputs retained"
            );
            AggregateResult::PartialFailure {
                error,
                partial: successes,
            }
        }
    }
}
