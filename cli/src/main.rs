// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0

//! # AquaControl Operator CLI
//!
//! The `aquactl` binary drives the tank event store directly.
//!
//! ## Commands
//!
//! - `aquactl tank create|show|list|search|history|...` - Tank and sensor commands
//! - `aquactl config show|validate|generate` - Configuration management
//! - `aquactl db migrate` - Create the PostgreSQL schema
//! - `aquactl demo` - Run a scripted scenario against the in-memory backend

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use aquacontrol_cli::commands::{self, ConfigCommand, DbCommand, DemoArgs, TankCommand};
use aquacontrol_core::domain::platform_config::{LogFormat, PlatformConfig};

/// AquaControl - Event-sourced tank management
#[derive(Parser)]
#[command(name = "aquactl")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "AQUACONTROL_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(long, global = true, env = "AQUACONTROL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Tank and sensor operations
    #[command(name = "tank")]
    Tank {
        #[command(subcommand)]
        command: TankCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Database schema management
    #[command(name = "db")]
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },

    /// Run a scripted tank scenario in memory
    #[command(name = "demo")]
    Demo {
        #[command(flatten)]
        args: DemoArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging settings may come from the config file; a broken file is
    // reported by the command itself, so fall back to defaults here.
    let logging = PlatformConfig::load_or_default(cli.config.clone())
        .map(|config| config.spec.logging)
        .unwrap_or_default();
    let level = cli.log_level.as_deref().unwrap_or(&logging.level);
    let format = if cli.json_logs { LogFormat::Json } else { logging.format };
    init_logging(level, format)?;

    match cli.command {
        Some(Commands::Tank { command }) => commands::tank::handle_command(command, cli.config).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Db { command }) => commands::db::handle_command(command, cli.config).await,
        Some(Commands::Demo { args }) => commands::demo::run(args).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
