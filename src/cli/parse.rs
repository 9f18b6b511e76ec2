//! Command-line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stagehand CLI - lifecycle stage orchestration for app projects
#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "Run lifecycle stages (create, provision, deploy, ...) on an app project")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root directory
    #[arg(long, default_value = ".")]
    pub project: PathBuf,

    /// Configuration file path (overrides project config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scaffold a new project
    Create {
        /// Application name (asked interactively when omitted)
        #[arg(long)]
        name: Option<String>,
        /// Parent folder for the new project
        #[arg(long, default_value = ".")]
        folder: PathBuf,
        /// Plugins the project is built from
        #[arg(long = "plugin")]
        plugins: Vec<String>,
    },
    /// Provision cloud resources for an environment
    Provision {
        /// Target environment (asked interactively when omitted)
        #[arg(long)]
        env: Option<String>,
        /// Narrow the fan-out to these plugins
        #[arg(long = "plugin")]
        plugins: Vec<String>,
    },
    /// Deploy built artifacts to provisioned resources
    Deploy {
        /// Target environment
        #[arg(long)]
        env: String,
        /// Narrow the fan-out to these plugins
        #[arg(long = "plugin")]
        plugins: Vec<String>,
    },
    /// Publish the application
    Publish {
        /// Target environment
        #[arg(long)]
        env: String,
    },
    /// Validate the project manifest and environment
    Validate {
        /// Environment to validate (asked interactively when omitted)
        #[arg(long)]
        env: Option<String>,
    },
    /// Create a new environment as a copy of an existing one
    CreateEnv {
        /// Name of the environment to create
        #[arg(long)]
        name: Option<String>,
        /// Environment to copy from
        #[arg(long)]
        from: Option<String>,
    },
    /// Upgrade a legacy project to the current schema
    Migrate,
    /// Report the project's schema version and upgrade state
    VersionCheck,
}
