//! Stagehand CLI Binary
//!
//! Command-line interface for the stagehand lifecycle orchestration
//! system.

use clap::Parser;
use stagehand::cli::{map_error, Cli, RunContext};
use stagehand::config::{ConfigLoader, StagehandConfig};
use stagehand::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = load_config(&cli);
    let logging_config = build_logging_config(&cli, &config);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("Stagehand CLI starting");
    let context = RunContext::new(cli.project.clone(), &config);

    match context.execute(&cli.command).await {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            if !e.is_cancelled() {
                error!("Command failed: {}", e);
            }
            eprintln!("{}", map_error(&e));
            process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> StagehandConfig {
    let loaded = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(&cli.project),
    };
    match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: falling back to default config: {}", e);
            StagehandConfig::default()
        }
    }
}

/// CLI flags override the configured logging settings.
fn build_logging_config(cli: &Cli, config: &StagehandConfig) -> LoggingConfig {
    let mut logging = config.logging.clone();
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        logging.format = format.clone();
    }
    logging
}
