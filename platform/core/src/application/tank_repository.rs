// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0

//! Event-Sourced Tank Repository
//!
//! Rebuilds [`Tank`] aggregates from the [`EventStore`] and appends their
//! pending events under an expected-version check.
//!
//! # Loading
//!
//! 1. Seed from the latest snapshot when one decodes cleanly, otherwise start
//!    from nothing.
//! 2. Read the events after the seed version. No seed and no events means the
//!    tank does not exist.
//! 3. Without a seed, the first event must be `TankCreated` at version 1.
//! 4. Replay the rest through [`Tank::replay`], never through commands.
//! 5. Refresh the snapshot once `snapshot_threshold` events were replayed on
//!    top of the previous one. Failure to write it is logged and ignored.
//!
//! # Saving
//!
//! `save` takes the pending buffer returned by the tank's commands. The
//! expected version is the tank version minus the pending count. A
//! concurrency conflict is returned unchanged; the caller reloads and retries.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::domain::errors::ReconstructionError;
use crate::domain::events::{RecordedEvent, TankEvent};
use crate::domain::repository::{EventStore, RepositoryError, Snapshot};
use crate::domain::tank::{Tank, TankId};

pub const DEFAULT_SNAPSHOT_THRESHOLD: u64 = 10;

#[derive(Clone)]
pub struct EventSourcedTankRepository {
    store: Arc<dyn EventStore>,
    snapshot_threshold: u64,
}

impl EventSourcedTankRepository {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self::with_snapshot_threshold(store, DEFAULT_SNAPSHOT_THRESHOLD)
    }

    pub fn with_snapshot_threshold(store: Arc<dyn EventStore>, snapshot_threshold: u64) -> Self {
        Self {
            store,
            snapshot_threshold: snapshot_threshold.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    pub async fn load(&self, tank_id: TankId) -> Result<Option<Tank>, RepositoryError> {
        let seed = self.load_snapshot(tank_id).await?;
        let seed_version = seed.as_ref().map(Tank::version).unwrap_or(0);

        let events = self.store.read_events(tank_id, seed_version).await?;
        metrics::histogram!("aquacontrol_events_replayed_per_load").record(events.len() as f64);

        let tank = match seed {
            Some(mut tank) => {
                tank.replay(events.iter().map(|r| (r.version, &r.event)))?;
                tank
            }
            None => {
                let Some((first, rest)) = events.split_first() else {
                    return Ok(None);
                };
                let mut tank = rehydrate(tank_id, first)?;
                tank.replay(rest.iter().map(|r| (r.version, &r.event)))?;
                tank
            }
        };

        debug!(
            tank_id = %tank_id,
            version = tank.version(),
            replayed = events.len(),
            from_snapshot = seed_version > 0,
            "Loaded tank"
        );

        if tank.version() - seed_version >= self.snapshot_threshold {
            if let Err(e) = self.snapshot(&tank).await {
                warn!(tank_id = %tank_id, error = %e, "Failed to refresh snapshot, continuing without it");
            }
        }

        Ok(Some(tank))
    }

    /// Appends `pending` and clears it. Does nothing when `pending` is empty.
    pub async fn save(
        &self,
        tank: &Tank,
        pending: &mut Vec<TankEvent>,
    ) -> Result<Vec<RecordedEvent>, RepositoryError> {
        let recorded = self.append_pending(tank, pending).await?;
        pending.clear();
        Ok(recorded)
    }

    /// Appends `pending` without touching the caller's buffer.
    pub async fn append_pending(
        &self,
        tank: &Tank,
        pending: &[TankEvent],
    ) -> Result<Vec<RecordedEvent>, RepositoryError> {
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let pending_count = pending.len() as u64;
        let expected_version = tank.version().checked_sub(pending_count).ok_or_else(|| {
            RepositoryError::Unknown(format!(
                "Tank {} at version {} cannot hold {} pending events",
                tank.id(),
                tank.version(),
                pending_count
            ))
        })?;

        match self.store.append(tank.id(), pending, expected_version).await {
            Ok(recorded) => {
                metrics::counter!("aquacontrol_events_appended_total").increment(recorded.len() as u64);
                debug!(
                    tank_id = %tank.id(),
                    expected_version,
                    appended = recorded.len(),
                    "Appended tank events"
                );
                Ok(recorded)
            }
            Err(e) => {
                if let RepositoryError::Concurrency { expected, actual, .. } = &e {
                    metrics::counter!("aquacontrol_concurrency_conflicts_total").increment(1);
                    warn!(
                        tank_id = %tank.id(),
                        expected = *expected,
                        actual = *actual,
                        "Concurrency conflict on append"
                    );
                }
                Err(e)
            }
        }
    }

    /// Writes a snapshot of `tank` at its current version.
    pub async fn snapshot(&self, tank: &Tank) -> Result<Snapshot, RepositoryError> {
        let snapshot = Snapshot {
            tank_id: tank.id(),
            version: tank.version(),
            state: serde_json::to_value(tank)?,
            taken_at: Utc::now(),
        };
        self.store.write_snapshot(&snapshot).await?;
        metrics::counter!("aquacontrol_snapshots_written_total").increment(1);
        debug!(tank_id = %tank.id(), version = tank.version(), "Wrote snapshot");
        Ok(snapshot)
    }

    /// Every recorded event of the tank, oldest first.
    pub async fn history(&self, tank_id: TankId) -> Result<Vec<RecordedEvent>, RepositoryError> {
        self.store.read_events(tank_id, 0).await
    }

    pub async fn tank_ids(&self) -> Result<Vec<TankId>, RepositoryError> {
        self.store.stream_ids().await
    }

    /// Decoded snapshot state, or `None` when absent or unusable.
    async fn load_snapshot(&self, tank_id: TankId) -> Result<Option<Tank>, RepositoryError> {
        let Some(snapshot) = self.store.read_snapshot(tank_id).await? else {
            return Ok(None);
        };

        match serde_json::from_value::<Tank>(snapshot.state) {
            Ok(tank) if tank.id() == tank_id && tank.version() == snapshot.version => Ok(Some(tank)),
            Ok(tank) => {
                warn!(
                    tank_id = %tank_id,
                    snapshot_version = snapshot.version,
                    state_id = %tank.id(),
                    state_version = tank.version(),
                    "Snapshot does not match its key, falling back to full replay"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(
                    tank_id = %tank_id,
                    snapshot_version = snapshot.version,
                    error = %e,
                    "Snapshot could not be decoded, falling back to full replay"
                );
                Ok(None)
            }
        }
    }
}

fn rehydrate(tank_id: TankId, first: &RecordedEvent) -> Result<Tank, ReconstructionError> {
    if first.version != 1 {
        return Err(ReconstructionError::VersionGap {
            tank_id,
            expected: 1,
            found: first.version,
        });
    }
    let tank = Tank::from_creation_event(&first.event)?;
    if tank.id() != tank_id {
        return Err(ReconstructionError::ForeignEvent {
            expected: tank_id,
            found: tank.id(),
            version: first.version,
        });
    }
    Ok(tank)
}
