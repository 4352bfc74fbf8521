// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete store implementations based on storage backend
//! configuration, keeping the domain layer free of infrastructure types.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Wire `PlatformConfig` to event store, read model and bus

use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use tracing::info;

use crate::application::tank_repository::EventSourcedTankRepository;
use crate::application::tank_service::TankCommandService;
use crate::domain::platform_config::PlatformConfig;
use crate::domain::repository::{EventStore, StorageBackend, TankReadModel};
use crate::infrastructure::db::Database;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::repositories::{
    InMemoryEventStore, InMemoryTankReadModel, PostgresEventStore, PostgresTankReadModel,
};

/// Creates an EventStore implementation based on the configured backend
pub fn create_event_store(backend: &StorageBackend, pool: Option<PgPool>) -> Arc<dyn EventStore> {
    match (backend, pool) {
        (StorageBackend::PostgreSQL(_), Some(pool)) => Arc::new(PostgresEventStore::new(pool)),
        _ => Arc::new(InMemoryEventStore::new()),
    }
}

/// Creates a TankReadModel implementation based on the configured backend
pub fn create_tank_read_model(backend: &StorageBackend, pool: Option<PgPool>) -> Arc<dyn TankReadModel> {
    match (backend, pool) {
        (StorageBackend::PostgreSQL(_), Some(pool)) => Arc::new(PostgresTankReadModel::new(pool)),
        _ => Arc::new(InMemoryTankReadModel::new()),
    }
}

/// Fully wired services for one process.
pub struct Platform {
    pub service: TankCommandService,
    pub event_bus: EventBus,
    pub database: Option<Database>,
}

impl Platform {
    /// Connects to the configured backend (running schema migration for
    /// PostgreSQL) and assembles the command service.
    pub async fn from_config(config: &PlatformConfig) -> anyhow::Result<Self> {
        let backend = config.storage_backend()?;

        let database = match &backend {
            StorageBackend::InMemory => None,
            StorageBackend::PostgreSQL(pg) => {
                let database = Database::new(&pg.connection_string, pg.max_connections)
                    .await
                    .context("Failed to connect to PostgreSQL")?;
                database.migrate().await.context("Failed to migrate database schema")?;
                Some(database)
            }
        };
        let pool = database.as_ref().map(|db| db.get_pool().clone());

        let event_sourcing = &config.spec.event_sourcing;
        let repository = EventSourcedTankRepository::with_snapshot_threshold(
            create_event_store(&backend, pool.clone()),
            event_sourcing.snapshot_threshold,
        );
        let event_bus = EventBus::new(config.spec.event_bus.capacity);

        let mut service = TankCommandService::new(repository)
            .with_publisher(Arc::new(event_bus.clone()))
            .with_max_retries(event_sourcing.command_retries);
        if config.spec.read_model.enabled {
            service = service.with_read_model(create_tank_read_model(&backend, pool));
        }

        info!(
            backend = if database.is_some() { "postgres" } else { "in-memory" },
            snapshot_threshold = event_sourcing.snapshot_threshold,
            read_model = config.spec.read_model.enabled,
            "Platform initialized"
        );

        Ok(Self {
            service,
            event_bus,
            database,
        })
    }
}
