// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0

//! Unit of Work
//!
//! Collects the tanks touched by one operation together with the events their
//! commands returned, then commits them in registration order:
//!
//! 1. Append the tank's events to the event store. This is the write of
//!    record; a failure here stops the commit and is returned.
//! 2. Upsert the tank's projection into the read model, if one is attached.
//! 3. Publish each appended event on its own.
//! 4. Drop the tank's pending events.
//!
//! Steps 2 and 3 never undo step 1. Their failures are logged and returned as
//! [`CommitWarning`]s in the [`CommitReport`].
//!
//! When an append fails, tanks committed before it stay committed and are
//! removed from the unit; the failing tank and those after it remain
//! registered.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::tank_repository::EventSourcedTankRepository;
use crate::domain::events::TankEvent;
use crate::domain::projection::TankProjection;
use crate::domain::repository::{EventPublisher, RepositoryError, TankReadModel};
use crate::domain::tank::{Tank, TankId};

/// Non-fatal problem raised after the event log write succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitWarning {
    SecondaryWrite {
        tank_id: TankId,
        error: String,
    },
    Publish {
        tank_id: TankId,
        version: u64,
        event_type: String,
        error: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitReport {
    pub committed_events: usize,
    pub warnings: Vec<CommitWarning>,
}

impl CommitReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn absorb(&mut self, other: CommitReport) {
        self.committed_events += other.committed_events;
        self.warnings.extend(other.warnings);
    }
}

struct Registered {
    tank: Tank,
    pending: Vec<TankEvent>,
}

pub struct UnitOfWork {
    repository: EventSourcedTankRepository,
    read_model: Option<Arc<dyn TankReadModel>>,
    publisher: Option<Arc<dyn EventPublisher>>,
    registered: Vec<Registered>,
}

impl UnitOfWork {
    pub fn new(repository: EventSourcedTankRepository) -> Self {
        Self {
            repository,
            read_model: None,
            publisher: None,
            registered: Vec::new(),
        }
    }

    pub fn with_read_model(mut self, read_model: Arc<dyn TankReadModel>) -> Self {
        self.read_model = Some(read_model);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Records `tank` as touched, with the events its commands returned.
    ///
    /// Registering the same tank again replaces the held state with `tank`
    /// and appends `events` to its pending list.
    pub fn register(&mut self, tank: &Tank, events: Vec<TankEvent>) {
        match self.registered.iter_mut().find(|r| r.tank.id() == tank.id()) {
            Some(entry) => {
                entry.tank = tank.clone();
                entry.pending.extend(events);
            }
            None => self.registered.push(Registered {
                tank: tank.clone(),
                pending: events,
            }),
        }
    }

    pub fn pending_event_count(&self) -> usize {
        self.registered.iter().map(|r| r.pending.len()).sum()
    }

    pub fn pending_events(&self, tank_id: TankId) -> &[TankEvent] {
        self.registered
            .iter()
            .find(|r| r.tank.id() == tank_id)
            .map(|r| r.pending.as_slice())
            .unwrap_or(&[])
    }

    pub async fn commit(&mut self) -> Result<CommitReport, RepositoryError> {
        let mut report = CommitReport::default();

        while let Some(entry) = self.registered.first() {
            let outcome = self.commit_one(&entry.tank, &entry.pending).await;
            match outcome {
                Ok(partial) => {
                    report.absorb(partial);
                    self.registered.remove(0);
                }
                Err(e) => {
                    if report.committed_events > 0 {
                        info!(
                            committed_events = report.committed_events,
                            "Partial commit before failure"
                        );
                    }
                    return Err(e);
                }
            }
        }

        info!(
            committed_events = report.committed_events,
            warnings = report.warnings.len(),
            "Unit of work committed"
        );
        Ok(report)
    }

    async fn commit_one(&self, tank: &Tank, pending: &[TankEvent]) -> Result<CommitReport, RepositoryError> {
        let mut report = CommitReport::default();
        if pending.is_empty() {
            return Ok(report);
        }

        let recorded = self.repository.append_pending(tank, pending).await?;
        report.committed_events = recorded.len();

        if let Some(read_model) = &self.read_model {
            if let Err(e) = read_model.upsert(&TankProjection::project(tank)).await {
                metrics::counter!("aquacontrol_secondary_write_failures_total").increment(1);
                warn!(tank_id = %tank.id(), error = %e, "Read model update failed; event log write stands");
                report.warnings.push(CommitWarning::SecondaryWrite {
                    tank_id: tank.id(),
                    error: e.to_string(),
                });
            }
        }

        if let Some(publisher) = &self.publisher {
            for event in &recorded {
                if let Err(e) = publisher.publish(event).await {
                    metrics::counter!("aquacontrol_publish_failures_total").increment(1);
                    warn!(
                        tank_id = %event.tank_id,
                        version = event.version,
                        event_type = %event.event.event_type(),
                        error = %e,
                        "Event publish failed"
                    );
                    report.warnings.push(CommitWarning::Publish {
                        tank_id: event.tank_id,
                        version: event.version,
                        event_type: event.event.event_type().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }
}
