// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Persistence Ports
//!
//! Contracts the application layer depends on, implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Role | Implementations |
//! |-------|------|----------------|
//! | `EventStore` | authoritative append-only log plus snapshots | `InMemoryEventStore`, `PostgresEventStore` |
//! | `TankReadModel` | denormalized query projection | `InMemoryTankReadModel`, `PostgresTankReadModel` |
//! | `EventPublisher` | outbound notification of committed events | `EventBus` |
//!
//! ## Storage Backend Abstraction
//!
//! The concrete implementation is selected at startup from `PlatformConfig`.
//! In-memory stores serve development and tests; PostgreSQL serves production.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::ReconstructionError;
use crate::domain::events::{RecordedEvent, TankEvent};
use crate::domain::projection::TankProjection;
use crate::domain::tank::TankId;

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

/// Serialized aggregate state at a known stream position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tank_id: TankId,
    pub version: u64,
    pub state: serde_json::Value,
    pub taken_at: DateTime<Utc>,
}

/// Append-only per-tank event log with optimistic concurrency.
///
/// Versions are 1-based and contiguous within a stream.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends `events` atomically, positioned after `expected_version`.
    ///
    /// Fails with [`RepositoryError::Concurrency`] when the stream's current
    /// version differs from `expected_version`; nothing is written in that case.
    async fn append(
        &self,
        tank_id: TankId,
        events: &[TankEvent],
        expected_version: u64,
    ) -> Result<Vec<RecordedEvent>, RepositoryError>;

    /// Events with version strictly greater than `after_version`, in order.
    async fn read_events(
        &self,
        tank_id: TankId,
        after_version: u64,
    ) -> Result<Vec<RecordedEvent>, RepositoryError>;

    /// Highest version in the stream, 0 if the stream does not exist.
    async fn current_version(&self, tank_id: TankId) -> Result<u64, RepositoryError>;

    /// Ids of every stream in the store.
    async fn stream_ids(&self) -> Result<Vec<TankId>, RepositoryError>;

    async fn read_snapshot(&self, tank_id: TankId) -> Result<Option<Snapshot>, RepositoryError>;

    /// Stores `snapshot`, replacing any older one for the same tank.
    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), RepositoryError>;
}

/// Query-side projection of tanks. Never read when rebuilding an aggregate.
#[async_trait]
pub trait TankReadModel: Send + Sync {
    async fn upsert(&self, projection: &TankProjection) -> Result<(), RepositoryError>;

    async fn remove(&self, tank_id: TankId) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, tank_id: TankId) -> Result<Option<TankProjection>, RepositoryError>;

    async fn list(&self) -> Result<Vec<TankProjection>, RepositoryError>;

    /// Case-insensitive substring match on the tank name.
    async fn search_by_name(&self, fragment: &str) -> Result<Vec<TankProjection>, RepositoryError>;
}

/// Outbound delivery of committed events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &RecordedEvent) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Publisher is closed")]
    Closed,

    #[error("Failed to publish {event_type} v{version}: {reason}")]
    Rejected {
        event_type: String,
        version: u64,
        reason: String,
    },
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Concurrency conflict on tank {tank_id}: expected version {expected}, stream is at {actual}")]
    Concurrency {
        tank_id: TankId,
        expected: u64,
        actual: u64,
    },

    #[error("Failed to reconstruct tank: {0}")]
    Reconstruction(#[from] ReconstructionError),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl RepositoryError {
    pub fn is_concurrency(&self) -> bool {
        matches!(self, Self::Concurrency { .. })
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
