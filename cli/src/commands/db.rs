// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0

//! Database schema commands

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use aquacontrol_core::domain::repository::StorageBackend;
use aquacontrol_core::infrastructure::db::Database;

#[derive(Subcommand)]
pub enum DbCommand {
    /// Create the event, snapshot and read model tables if missing
    Migrate,
}

pub async fn handle_command(command: DbCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        DbCommand::Migrate => migrate(config_override).await,
    }
}

async fn migrate(config_override: Option<PathBuf>) -> Result<()> {
    let config = super::load_config(config_override)?;
    let StorageBackend::PostgreSQL(pg) = config.storage_backend()? else {
        println!("{}", "In-memory backend configured; nothing to migrate.".yellow());
        return Ok(());
    };

    let database = Database::new(&pg.connection_string, pg.max_connections)
        .await
        .context("Failed to connect to PostgreSQL")?;
    database.migrate().await.context("Failed to migrate database schema")?;

    println!("{}", "✓ Database schema is up to date".green());
    Ok(())
}
