//! CLI domain: parse, route, and presentation only. A single route
//! table builds stage requests and dispatches to the core.

mod parse;
mod presentation;
mod route;

pub use parse::{Cli, Commands};
pub use presentation::map_error;
pub use route::RunContext;
