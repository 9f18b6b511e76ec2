//! Stage Dispatcher
//!
//! Resolves a stage to its registered body and fixed interceptor list
//! and runs the composed chain. The table is built once at startup,
//! covers every `Stage` variant, and is inspectable; a missing entry at
//! dispatch time is a fatal configuration error, not a user-facing
//! condition. The dispatcher itself holds no mutable state between
//! calls.

use crate::context::{StageContext, StageResult};
use crate::locking::LockManager;
use crate::middleware::{
    create_questions, env_selection_questions, run_chain, EnvLoaderInterceptor,
    EnvWriterInterceptor, Interceptor, LockerInterceptor, MigrationGateInterceptor,
    QuestionsInterceptor, StageHandler,
};
use crate::plugin::{PluginRegistry, TaskKind};
use crate::question::QuestionProvider;
use crate::request::{Stage, StageRequest};
use crate::stages::{
    CreateEnvStage, CreateStage, FanoutStage, MigrateStage, ValidateStage, VersionCheckStage,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

/// External collaborators a dispatcher operates with.
pub struct Tools {
    pub questions: Arc<dyn QuestionProvider>,
    pub plugins: Arc<PluginRegistry>,
    pub locks: Arc<LockManager>,
}

struct StageRegistration {
    interceptors: Vec<Arc<dyn Interceptor>>,
    handler: Arc<dyn StageHandler>,
}

pub struct Dispatcher {
    stages: HashMap<Stage, StageRegistration>,
}

impl Dispatcher {
    /// Build the full stage table. Every `Stage` variant is registered
    /// here, with its interceptor list in composition order.
    pub fn new(tools: Tools) -> Self {
        let mut stages = HashMap::new();
        for stage in Stage::ALL {
            stages.insert(stage, registration_for(stage, &tools));
        }
        Self { stages }
    }

    /// Run one stage invocation. The request becomes the exclusive
    /// property of a fresh `StageContext` that dies with the call.
    pub async fn dispatch(&self, stage: Stage, request: StageRequest) -> StageResult {
        let registration = self
            .stages
            .get(&stage)
            .unwrap_or_else(|| panic!("stage `{}` is not registered", stage));

        info!(stage = %stage, "dispatching stage");
        let mut ctx = StageContext::new(stage, request);
        let result = run_chain(
            &registration.interceptors,
            registration.handler.as_ref(),
            &mut ctx,
        )
        .await;

        match &result {
            Ok(_) => info!(stage = %stage, "stage completed"),
            Err(e) if e.is_cancelled() => info!(stage = %stage, "stage cancelled"),
            Err(e) => error!(stage = %stage, "stage failed: {}", e),
        }
        result
    }

    /// Interceptor names for a stage, in composition order. Lets tests
    /// and embedders inspect the table without running anything.
    pub fn interceptor_names(&self, stage: Stage) -> Vec<String> {
        self.stages
            .get(&stage)
            .map(|registration| {
                registration
                    .interceptors
                    .iter()
                    .map(|interceptor| interceptor.name().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn registration_for(stage: Stage, tools: &Tools) -> StageRegistration {
    let questions = |spec| -> Arc<dyn Interceptor> {
        Arc::new(QuestionsInterceptor::new(Arc::clone(&tools.questions), spec))
    };
    let gate = || -> Arc<dyn Interceptor> {
        Arc::new(MigrationGateInterceptor::new(Arc::clone(&tools.questions)))
    };
    let loader =
        |require_env_file| -> Arc<dyn Interceptor> { Arc::new(EnvLoaderInterceptor::new(require_env_file)) };
    let locker =
        || -> Arc<dyn Interceptor> { Arc::new(LockerInterceptor::new(Arc::clone(&tools.locks))) };
    let writer = || -> Arc<dyn Interceptor> { Arc::new(EnvWriterInterceptor) };

    match stage {
        Stage::Create => StageRegistration {
            interceptors: vec![questions(create_questions)],
            handler: Arc::new(CreateStage),
        },
        Stage::Provision => StageRegistration {
            interceptors: vec![
                questions(env_selection_questions),
                gate(),
                loader(false),
                locker(),
                writer(),
            ],
            handler: Arc::new(FanoutStage::new(
                TaskKind::Provision,
                Arc::clone(&tools.plugins),
            )),
        },
        Stage::Deploy => StageRegistration {
            interceptors: vec![gate(), loader(false), locker(), writer()],
            handler: Arc::new(FanoutStage::new(
                TaskKind::Deploy,
                Arc::clone(&tools.plugins),
            )),
        },
        Stage::Publish => StageRegistration {
            interceptors: vec![gate(), loader(false), locker(), writer()],
            handler: Arc::new(FanoutStage::new(
                TaskKind::Publish,
                Arc::clone(&tools.plugins),
            )),
        },
        Stage::Validate => StageRegistration {
            interceptors: vec![questions(env_selection_questions), locker(), loader(false)],
            handler: Arc::new(ValidateStage::new(Arc::clone(&tools.plugins))),
        },
        Stage::CreateEnv => StageRegistration {
            interceptors: vec![locker()],
            handler: Arc::new(CreateEnvStage::new(Arc::clone(&tools.questions))),
        },
        // Runs before any lock on purpose: the gate's ordering guarantee
        // is that version validation precedes locking everywhere.
        Stage::Migrate => StageRegistration {
            interceptors: Vec::new(),
            handler: Arc::new(MigrateStage),
        },
        Stage::VersionCheck => StageRegistration {
            interceptors: Vec::new(),
            handler: Arc::new(VersionCheckStage),
        },
    }
}
