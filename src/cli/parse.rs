//! CLI parse: clap types for objsync. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// objsync - browse a business application server from the terminal
#[derive(Parser)]
#[command(name = "objsync")]
#[command(about = "Client-side mirror of server-managed business objects and queries")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and print the first rows of a query
    Connect {
        /// Service URI (overrides the configured one)
        #[arg(long)]
        uri: Option<String>,
        /// User name; the server's default user when omitted
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        password: Option<String>,
        /// Query to run; the application's first query when omitted
        #[arg(long)]
        query: Option<String>,
        /// Number of rows to print
        #[arg(long, default_value = "20")]
        rows: usize,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Validate the effective configuration
    Validate,
}
