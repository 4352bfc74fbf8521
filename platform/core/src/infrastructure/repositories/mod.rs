// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure adapters for the persistence ports declared in
//! `crate::domain::repository`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Store event streams, snapshots and read projections
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL
//!
//! - **PostgresEventStore** - `tank_events` and `tank_snapshots` tables
//! - **PostgresTankReadModel** - `tank_read_model` table
//!
//! ## In-Memory
//!
//! - **InMemoryEventStore** - per-tank `Vec` of encoded records behind a lock
//! - **InMemoryTankReadModel** - `HashMap` of projections
//!
//! Both event stores persist the encoded [`EventRecord`] rather than the typed
//! event, so decoding (and tolerance of unknown tags) behaves identically.

pub mod postgres_event_store;
pub mod postgres_tank_read_model;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::errors::ReconstructionError;
use crate::domain::events::{EventRecord, RecordedEvent, TankEvent};
use crate::domain::projection::TankProjection;
use crate::domain::repository::{EventStore, RepositoryError, Snapshot, TankReadModel};
use crate::domain::tank::TankId;

pub use postgres_event_store::PostgresEventStore;
pub use postgres_tank_read_model::PostgresTankReadModel;

/// Decodes a stored record, reporting a known tag with a bad payload as a
/// reconstruction failure at its stream position.
pub(crate) fn decode_record(
    tank_id: TankId,
    version: u64,
    record: &EventRecord,
    recorded_at: DateTime<Utc>,
) -> Result<RecordedEvent, RepositoryError> {
    let event = record.decode().map_err(|e| ReconstructionError::MalformedEvent {
        tank_id,
        version,
        event_type: record.event_type.clone(),
        reason: e.to_string(),
    })?;
    Ok(RecordedEvent {
        tank_id,
        version,
        event,
        recorded_at,
    })
}

#[derive(Debug, Clone)]
struct StoredRecord {
    record: EventRecord,
    recorded_at: DateTime<Utc>,
}

/// Event store held in process memory. Lost on restart.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<HashMap<TankId, Vec<StoredRecord>>>>,
    snapshots: Arc<RwLock<HashMap<TankId, Snapshot>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends already-encoded records under the same concurrency check as
    /// [`EventStore::append`]. Records are stored as given, whatever their tag.
    pub fn append_records(
        &self,
        tank_id: TankId,
        records: Vec<EventRecord>,
        expected_version: u64,
    ) -> Result<Vec<(u64, EventRecord, DateTime<Utc>)>, RepositoryError> {
        let mut streams = self.streams.write();
        let stream = streams.entry(tank_id).or_default();
        let actual = stream.len() as u64;
        if actual != expected_version {
            return Err(RepositoryError::Concurrency {
                tank_id,
                expected: expected_version,
                actual,
            });
        }

        let recorded_at = Utc::now();
        let mut appended = Vec::with_capacity(records.len());
        for record in records {
            stream.push(StoredRecord {
                record: record.clone(),
                recorded_at,
            });
            appended.push((stream.len() as u64, record, recorded_at));
        }
        Ok(appended)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        tank_id: TankId,
        events: &[TankEvent],
        expected_version: u64,
    ) -> Result<Vec<RecordedEvent>, RepositoryError> {
        let records = events
            .iter()
            .map(EventRecord::encode)
            .collect::<Result<Vec<_>, _>>()?;

        let appended = self.append_records(tank_id, records, expected_version)?;
        Ok(appended
            .into_iter()
            .zip(events)
            .map(|((version, _, recorded_at), event)| RecordedEvent {
                tank_id,
                version,
                event: event.clone(),
                recorded_at,
            })
            .collect())
    }

    async fn read_events(
        &self,
        tank_id: TankId,
        after_version: u64,
    ) -> Result<Vec<RecordedEvent>, RepositoryError> {
        let streams = self.streams.read();
        let Some(stream) = streams.get(&tank_id) else {
            return Ok(Vec::new());
        };

        stream
            .iter()
            .enumerate()
            .map(|(index, stored)| (index as u64 + 1, stored))
            .filter(|(version, _)| *version > after_version)
            .map(|(version, stored)| decode_record(tank_id, version, &stored.record, stored.recorded_at))
            .collect()
    }

    async fn current_version(&self, tank_id: TankId) -> Result<u64, RepositoryError> {
        Ok(self
            .streams
            .read()
            .get(&tank_id)
            .map(|stream| stream.len() as u64)
            .unwrap_or(0))
    }

    async fn stream_ids(&self) -> Result<Vec<TankId>, RepositoryError> {
        let mut ids: Vec<TankId> = self
            .streams
            .read()
            .iter()
            .filter(|(_, stream)| !stream.is_empty())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn read_snapshot(&self, tank_id: TankId) -> Result<Option<Snapshot>, RepositoryError> {
        Ok(self.snapshots.read().get(&tank_id).cloned())
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), RepositoryError> {
        let mut snapshots = self.snapshots.write();
        // Never move a snapshot backwards
        if let Some(existing) = snapshots.get(&snapshot.tank_id) {
            if existing.version > snapshot.version {
                return Ok(());
            }
        }
        snapshots.insert(snapshot.tank_id, snapshot.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryTankReadModel {
    tanks: Arc<RwLock<HashMap<TankId, TankProjection>>>,
}

impl InMemoryTankReadModel {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TankReadModel for InMemoryTankReadModel {
    async fn upsert(&self, projection: &TankProjection) -> Result<(), RepositoryError> {
        let mut tanks = self.tanks.write();
        match tanks.get(&projection.tank_id) {
            Some(existing) if existing.version > projection.version => {}
            _ => {
                tanks.insert(projection.tank_id, projection.clone());
            }
        }
        Ok(())
    }

    async fn remove(&self, tank_id: TankId) -> Result<(), RepositoryError> {
        self.tanks.write().remove(&tank_id);
        Ok(())
    }

    async fn find_by_id(&self, tank_id: TankId) -> Result<Option<TankProjection>, RepositoryError> {
        Ok(self.tanks.read().get(&tank_id).cloned())
    }

    async fn list(&self) -> Result<Vec<TankProjection>, RepositoryError> {
        let mut tanks: Vec<TankProjection> = self.tanks.read().values().cloned().collect();
        tanks.sort_by(|a, b| a.name.cmp(&b.name).then(a.tank_id.cmp(&b.tank_id)));
        Ok(tanks)
    }

    async fn search_by_name(&self, fragment: &str) -> Result<Vec<TankProjection>, RepositoryError> {
        let needle = fragment.to_lowercase();
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .collect())
    }
}
