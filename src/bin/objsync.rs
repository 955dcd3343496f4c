//! Objsync CLI Binary
//!
//! Command-line client for browsing an application server.

use anyhow::Context;
use clap::Parser;
use objsync::cli::{map_error, Cli, RunContext};
use objsync::config::ConfigLoader;
use objsync::logging::{init_logging, LoggingConfig};
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("objsync starting");

    if let Err(e) = run(&cli).await {
        error!("Command failed: {:#}", e);
        let message = match e.downcast_ref::<objsync::ClientError>() {
            Some(client_error) => map_error(client_error),
            None => format!("{:#}", e),
        };
        eprintln!("{}", message);
        process::exit(1);
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let context = RunContext::new(cli.config.clone()).context("loading configuration")?;
    let output = context.execute(&cli.command).await?;
    info!("Command completed successfully");
    println!("{}", output);
    Ok(())
}

/// Build logging configuration from CLI args and the config file
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    if !cli.verbose {
        return LoggingConfig {
            level: "off".to_string(),
            ..LoggingConfig::default()
        };
    }

    let mut config = ConfigLoader::load_with(cli.config.as_deref())
        .map(|c| c.logging)
        .unwrap_or_default();

    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    config
}
