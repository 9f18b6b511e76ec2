//! Middleware domain: the interceptor chain composer and the concrete
//! interceptors that wrap stage bodies. Composition is data-driven;
//! each stage's interceptor list lives in the dispatcher's stage table.

mod chain;
mod env_loader;
mod env_writer;
mod locker;
mod migration_gate;
mod questions;

pub use chain::{run_chain, Interceptor, StageHandler};
pub use env_loader::EnvLoaderInterceptor;
pub use env_writer::EnvWriterInterceptor;
pub use locker::LockerInterceptor;
pub use migration_gate::MigrationGateInterceptor;
pub use questions::{
    create_questions, env_selection_questions, QuestionSpec, QuestionsInterceptor,
};
