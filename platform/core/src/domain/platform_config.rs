// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0

// Platform Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) describing:
// - Storage backend selection (in-memory or PostgreSQL)
// - Event sourcing tuning (snapshot threshold, command retries)
// - Event bus capacity and read model toggle
// - Logging level and format

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::repository::{PostgresConfig, StorageBackend};

pub const API_VERSION: &str = "aquacontrol.io/v1";
pub const KIND: &str = "PlatformConfig";

/// Top-level platform configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// API version (must be "aquacontrol.io/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "PlatformConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: PlatformConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Deployment name, e.g. the facility this instance serves
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfigSpec {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub event_sourcing: EventSourcingConfig,

    #[serde(default)]
    pub event_bus: EventBusConfig,

    #[serde(default)]
    pub read_model: ReadModelConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackendKind {
    InMemory,
    Postgres,
}

impl std::str::FromStr for StorageBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in-memory" | "memory" => Ok(Self::InMemory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => anyhow::bail!("Unknown storage backend '{}'. Expected in-memory or postgres", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackendKind,

    /// PostgreSQL connection string (required when backend is postgres)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSourcingConfig {
    /// Events replayed since the last snapshot before a new one is written
    #[serde(default = "default_snapshot_threshold")]
    pub snapshot_threshold: u64,

    /// Reload-and-retry attempts after a concurrency conflict
    #[serde(default = "default_command_retries")]
    pub command_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusConfig {
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadModelConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// tracing EnvFilter directive, e.g. "info" or "aquacontrol_core=debug"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Default for EventSourcingConfig {
    fn default() -> Self {
        Self {
            snapshot_threshold: default_snapshot_threshold(),
            command_retries: default_command_retries(),
        }
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

impl Default for ReadModelConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "aquacontrol".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: PlatformConfigSpec::default(),
        }
    }
}

impl PlatformConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. AQUACONTROL_CONFIG_PATH environment variable
    /// 2. ./aquacontrol-config.yaml (working directory)
    /// 3. ~/.aquacontrol/config.yaml (user home)
    /// 4. /etc/aquacontrol/config.yaml (system, Unix) or C:\ProgramData\AquaControl\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("AQUACONTROL_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./aquacontrol-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".aquacontrol").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/aquacontrol/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\AquaControl\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with an
    /// injectable variable source.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("AQUACONTROL_DATABASE_URL") {
            tracing::info!("Environment override: AQUACONTROL_DATABASE_URL");
            self.spec.storage.database_url = Some(url);
        }

        if let Some(val) = lookup("AQUACONTROL_STORAGE_BACKEND") {
            match val.parse::<StorageBackendKind>() {
                Ok(backend) => {
                    tracing::info!("Environment override: AQUACONTROL_STORAGE_BACKEND={}", val);
                    self.spec.storage.backend = backend;
                }
                Err(e) => tracing::warn!("Invalid AQUACONTROL_STORAGE_BACKEND: {}. Ignoring.", e),
            }
        }

        if let Some(val) = lookup("AQUACONTROL_SNAPSHOT_THRESHOLD") {
            match val.parse::<u64>() {
                Ok(threshold) => {
                    tracing::info!("Environment override: AQUACONTROL_SNAPSHOT_THRESHOLD={}", threshold);
                    self.spec.event_sourcing.snapshot_threshold = threshold;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for AQUACONTROL_SNAPSHOT_THRESHOLD: '{}'. Expected a positive integer. Ignoring.",
                    val
                ),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION);
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let storage = &self.spec.storage;
        if storage.backend == StorageBackendKind::Postgres {
            match storage.database_url.as_deref() {
                None | Some("") => {
                    anyhow::bail!("spec.storage.database_url is required for the postgres backend")
                }
                Some(_) => {}
            }
            if storage.max_connections == 0 {
                anyhow::bail!("spec.storage.max_connections must be at least 1");
            }
        }

        if self.spec.event_sourcing.snapshot_threshold == 0 {
            anyhow::bail!("spec.event_sourcing.snapshot_threshold must be at least 1");
        }

        if self.spec.event_bus.capacity == 0 {
            anyhow::bail!("spec.event_bus.capacity must be at least 1");
        }

        Ok(())
    }

    pub fn storage_backend(&self) -> anyhow::Result<StorageBackend> {
        let storage = &self.spec.storage;
        match storage.backend {
            StorageBackendKind::InMemory => Ok(StorageBackend::InMemory),
            StorageBackendKind::Postgres => {
                let connection_string = storage.database_url.clone().ok_or_else(|| {
                    anyhow::anyhow!("spec.storage.database_url is required for the postgres backend")
                })?;
                Ok(StorageBackend::PostgreSQL(PostgresConfig {
                    connection_string,
                    max_connections: storage.max_connections,
                }))
            }
        }
    }
}

fn default_backend() -> StorageBackendKind {
    StorageBackendKind::InMemory
}

fn default_max_connections() -> u32 {
    5
}

fn default_snapshot_threshold() -> u64 {
    10
}

fn default_command_retries() -> u32 {
    3
}

fn default_bus_capacity() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Compact
}
