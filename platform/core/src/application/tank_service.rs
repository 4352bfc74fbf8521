// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0

//! Tank Command Service
//!
//! Application entry point for changing tanks. Each call loads a fresh tank,
//! runs one command against it, and commits through a [`UnitOfWork`]. A
//! concurrency conflict triggers a reload and a rerun of the command, up to
//! `max_retries` times. Domain errors are returned at once.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::tank_repository::EventSourcedTankRepository;
use crate::application::unit_of_work::{CommitReport, UnitOfWork};
use crate::domain::errors::DomainError;
use crate::domain::events::{RecordedEvent, TankEvent};
use crate::domain::projection::TankProjection;
use crate::domain::repository::{EventPublisher, RepositoryError, TankReadModel};
use crate::domain::tank::{Tank, TankId, TankType};
use crate::domain::value_objects::{Location, TankCapacity};

pub const DEFAULT_COMMAND_RETRIES: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Tank not found: {0}")]
    TankNotFound(TankId),
}

impl ServiceError {
    /// Only a lost append race is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Repository(e) if e.is_concurrency())
    }
}

/// Tank after a successful command, with what the commit reported.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub tank: Tank,
    pub report: CommitReport,
    pub attempts: u32,
}

#[derive(Clone)]
pub struct TankCommandService {
    repository: EventSourcedTankRepository,
    read_model: Option<Arc<dyn TankReadModel>>,
    publisher: Option<Arc<dyn EventPublisher>>,
    max_retries: u32,
}

impl TankCommandService {
    pub fn new(repository: EventSourcedTankRepository) -> Self {
        Self {
            repository,
            read_model: None,
            publisher: None,
            max_retries: DEFAULT_COMMAND_RETRIES,
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

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn repository(&self) -> &EventSourcedTankRepository {
        &self.repository
    }

    pub fn unit_of_work(&self) -> UnitOfWork {
        let mut uow = UnitOfWork::new(self.repository.clone());
        if let Some(read_model) = &self.read_model {
            uow = uow.with_read_model(read_model.clone());
        }
        if let Some(publisher) = &self.publisher {
            uow = uow.with_publisher(publisher.clone());
        }
        uow
    }

    pub async fn create_tank(
        &self,
        name: impl Into<String>,
        capacity: TankCapacity,
        location: Location,
        tank_type: TankType,
    ) -> Result<CommandOutcome, ServiceError> {
        let (tank, events) = Tank::create(name, capacity, location, tank_type)?;
        let mut uow = self.unit_of_work();
        uow.register(&tank, events);
        let report = uow.commit().await?;
        info!(tank_id = %tank.id(), name = %tank.name(), "Tank created");
        Ok(CommandOutcome {
            tank,
            report,
            attempts: 1,
        })
    }

    /// Runs `command` against the current state of the tank and commits its
    /// events. The command may run more than once.
    pub async fn execute<F>(&self, tank_id: TankId, command: F) -> Result<CommandOutcome, ServiceError>
    where
        F: Fn(&mut Tank) -> Result<Vec<TankEvent>, DomainError>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut tank = self.get(tank_id).await?;
            let events = command(&mut tank)?;
            if events.is_empty() {
                debug!(tank_id = %tank_id, "Command produced no events");
                return Ok(CommandOutcome {
                    tank,
                    report: CommitReport::default(),
                    attempts,
                });
            }

            let mut uow = self.unit_of_work();
            uow.register(&tank, events);
            match uow.commit().await {
                Ok(report) => {
                    return Ok(CommandOutcome {
                        tank,
                        report,
                        attempts,
                    })
                }
                Err(e) if e.is_concurrency() && attempts <= self.max_retries => {
                    warn!(
                        tank_id = %tank_id,
                        attempt = attempts,
                        max_retries = self.max_retries,
                        "Concurrency conflict, reloading and retrying command"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn get(&self, tank_id: TankId) -> Result<Tank, ServiceError> {
        self.repository
            .load(tank_id)
            .await?
            .ok_or(ServiceError::TankNotFound(tank_id))
    }

    pub async fn history(&self, tank_id: TankId) -> Result<Vec<RecordedEvent>, ServiceError> {
        let history = self.repository.history(tank_id).await?;
        if history.is_empty() {
            return Err(ServiceError::TankNotFound(tank_id));
        }
        Ok(history)
    }

    /// Tank listing from the read model, or from the event store when no
    /// read model is attached.
    pub async fn list(&self) -> Result<Vec<TankProjection>, ServiceError> {
        if let Some(read_model) = &self.read_model {
            return Ok(read_model.list().await?);
        }

        let mut projections = Vec::new();
        for tank_id in self.repository.tank_ids().await? {
            if let Some(tank) = self.repository.load(tank_id).await? {
                projections.push(TankProjection::project(&tank));
            }
        }
        projections.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projections)
    }

    /// Case-insensitive name search over the tank listing.
    pub async fn search(&self, fragment: &str) -> Result<Vec<TankProjection>, ServiceError> {
        if let Some(read_model) = &self.read_model {
            return Ok(read_model.search_by_name(fragment).await?);
        }
        let needle = fragment.to_lowercase();
        let mut matches = self.list().await?;
        matches.retain(|p| p.name.to_lowercase().contains(&needle));
        Ok(matches)
    }

    /// Rewrites every projection from the event store and drops projections
    /// with no stream behind them. Returns the number rewritten.
    pub async fn rebuild_read_model(&self) -> Result<usize, ServiceError> {
        let Some(read_model) = &self.read_model else {
            return Ok(0);
        };

        let tank_ids: HashSet<TankId> = self.repository.tank_ids().await?.into_iter().collect();

        let mut removed = 0;
        for projection in read_model.list().await? {
            if !tank_ids.contains(&projection.tank_id) {
                read_model.remove(projection.tank_id).await?;
                removed += 1;
            }
        }

        let mut rebuilt = 0;
        for &tank_id in &tank_ids {
            if let Some(tank) = self.repository.load(tank_id).await? {
                read_model.upsert(&TankProjection::project(&tank)).await?;
                rebuilt += 1;
            }
        }
        info!(rebuilt, removed, "Read model rebuilt from event store");
        Ok(rebuilt)
    }
}
