// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for AquaControl CLI

pub mod config;
pub mod db;
pub mod demo;
pub mod tank;

pub use self::config::ConfigCommand;
pub use self::db::DbCommand;
pub use self::demo::DemoArgs;
pub use self::tank::TankCommand;

use std::path::PathBuf;

use anyhow::{Context, Result};
use aquacontrol_core::application::Platform;
use aquacontrol_core::domain::platform_config::PlatformConfig;

/// Loads configuration (explicit path, discovery, then defaults) and checks it.
pub fn load_config(config_override: Option<PathBuf>) -> Result<PlatformConfig> {
    let config = PlatformConfig::load_or_default(config_override).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

/// Loads configuration and wires the platform services.
pub async fn connect(config_override: Option<PathBuf>) -> Result<Platform> {
    let config = load_config(config_override)?;
    Platform::from_config(&config).await
}
