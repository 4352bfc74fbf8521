// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0
//! # Tank Aggregate Root
//!
//! A [`Tank`] owns its [`Sensor`] entities and is the consistency boundary for
//! every rule that spans them.
//!
//! ## Commands and events
//!
//! Each command validates its input and the tank invariants against current
//! state. On success it builds exactly one [`TankEvent`], applies it through
//! [`Tank::apply`], and returns it to the caller. A command whose new value
//! equals the current value is a no-op and returns an empty list. A failing
//! command returns a [`DomainError`] and leaves the tank untouched.
//!
//! The returned events are the pending buffer: the caller keeps them until the
//! unit of work has appended them to the event store.
//!
//! ## Replay
//!
//! [`Tank::apply`] is the only code that mutates a tank. It performs no
//! validation, so a stream that was valid when written replays to the same
//! state regardless of how rules evolve later.
//!
//! ## Invariants (command time only)
//!
//! 1. At most [`MAX_SENSORS`] sensors.
//! 2. Sensor ids are unique within a tank.
//! 3. Activation requires at least one active sensor.
//! 4. The last active sensor of an Active tank cannot be removed or deactivated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, ReconstructionError};
use crate::domain::events::TankEvent;
use crate::domain::sensor::{validate_range, Sensor, SensorId, SensorStatus};
use crate::domain::value_objects::{Location, TankCapacity, WaterQualityParameters};

pub const MAX_SENSORS: usize = 10;
pub const MAX_NAME_LENGTH: usize = 100;

/// Unique identifier for a tank.
///
/// Like [`SensorId`] it offers explicit constructors and accessors only, so a
/// raw UUID or a sensor id can never be passed where a tank id is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TankId(Uuid);

impl TankId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for TankId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TankType {
    Freshwater,
    Saltwater,
    Brackish,
    Breeding,
    Quarantine,
    Nursery,
}

impl std::str::FromStr for TankType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "freshwater" => Ok(Self::Freshwater),
            "saltwater" | "marine" => Ok(Self::Saltwater),
            "brackish" => Ok(Self::Brackish),
            "breeding" => Ok(Self::Breeding),
            "quarantine" => Ok(Self::Quarantine),
            "nursery" => Ok(Self::Nursery),
            other => Err(DomainError::validation(format!("Unknown tank type: {other}"))),
        }
    }
}

impl fmt::Display for TankType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TankStatus {
    Active,
    Inactive,
}

impl fmt::Display for TankStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Tank aggregate root.
///
/// `version` counts every event applied, including ones not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    id: TankId,
    name: String,
    capacity: TankCapacity,
    location: Location,
    tank_type: TankType,
    status: TankStatus,
    optimal_parameters: Option<WaterQualityParameters>,
    last_maintenance_date: Option<DateTime<Utc>>,
    next_maintenance_date: Option<DateTime<Utc>>,
    sensors: Vec<Sensor>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Tank {
    // ========================================================================
    // Factory
    // ========================================================================

    /// Creates a new tank and returns it together with its `TankCreated` event.
    pub fn create(
        name: impl Into<String>,
        capacity: TankCapacity,
        location: Location,
        tank_type: TankType,
    ) -> Result<(Self, Vec<TankEvent>), DomainError> {
        let name = validate_name(name.into())?;
        let event = TankEvent::TankCreated {
            tank_id: TankId::new(),
            name,
            capacity,
            location,
            tank_type,
            occurred_at: Utc::now(),
        };
        let tank = Self::from_creation_event(&event).map_err(|e| DomainError::validation(e.to_string()))?;
        Ok((tank, vec![event]))
    }

    /// Builds version 1 of a tank from its `TankCreated` event.
    pub fn from_creation_event(event: &TankEvent) -> Result<Self, ReconstructionError> {
        match event {
            TankEvent::TankCreated {
                tank_id,
                name,
                capacity,
                location,
                tank_type,
                occurred_at,
            } => Ok(Self {
                id: *tank_id,
                name: name.clone(),
                capacity: *capacity,
                location: location.clone(),
                tank_type: *tank_type,
                status: TankStatus::Inactive,
                optimal_parameters: None,
                last_maintenance_date: None,
                next_maintenance_date: None,
                sensors: Vec::new(),
                created_at: *occurred_at,
                updated_at: *occurred_at,
                version: 1,
            }),
            other => Err(ReconstructionError::MissingCreationEvent {
                tank_id: other.tank_id().unwrap_or_default(),
                found: other.event_type().to_string(),
            }),
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    pub fn rename(&mut self, name: impl Into<String>) -> Result<Vec<TankEvent>, DomainError> {
        let name = validate_name(name.into())?;
        if name == self.name {
            return Ok(vec![]);
        }
        Ok(self.emit(TankEvent::TankNameChanged {
            tank_id: self.id,
            name,
            occurred_at: Utc::now(),
        }))
    }

    pub fn change_capacity(&mut self, capacity: TankCapacity) -> Result<Vec<TankEvent>, DomainError> {
        if capacity == self.capacity {
            return Ok(vec![]);
        }
        Ok(self.emit(TankEvent::TankCapacityChanged {
            tank_id: self.id,
            capacity,
            occurred_at: Utc::now(),
        }))
    }

    pub fn relocate(&mut self, location: Location) -> Result<Vec<TankEvent>, DomainError> {
        if location == self.location {
            return Ok(vec![]);
        }
        Ok(self.emit(TankEvent::TankRelocated {
            tank_id: self.id,
            location,
            occurred_at: Utc::now(),
        }))
    }

    pub fn activate(&mut self) -> Result<Vec<TankEvent>, DomainError> {
        if self.status == TankStatus::Active {
            return Ok(vec![]);
        }
        if !self.has_active_sensor() {
            return Err(DomainError::invariant(format!(
                "Tank {} cannot be activated without at least one active sensor",
                self.id
            )));
        }
        Ok(self.emit(TankEvent::TankActivated {
            tank_id: self.id,
            occurred_at: Utc::now(),
        }))
    }

    pub fn deactivate(&mut self) -> Result<Vec<TankEvent>, DomainError> {
        if self.status == TankStatus::Inactive {
            return Ok(vec![]);
        }
        Ok(self.emit(TankEvent::TankDeactivated {
            tank_id: self.id,
            occurred_at: Utc::now(),
        }))
    }

    pub fn set_optimal_parameters(
        &mut self,
        parameters: WaterQualityParameters,
    ) -> Result<Vec<TankEvent>, DomainError> {
        if self.optimal_parameters.as_ref() == Some(&parameters) {
            return Ok(vec![]);
        }
        Ok(self.emit(TankEvent::TankOptimalParametersSet {
            tank_id: self.id,
            parameters,
            occurred_at: Utc::now(),
        }))
    }

    pub fn schedule_maintenance(&mut self, date: DateTime<Utc>) -> Result<Vec<TankEvent>, DomainError> {
        let now = Utc::now();
        if date <= now {
            return Err(DomainError::validation(format!(
                "Maintenance date {date} must be in the future"
            )));
        }
        if self.next_maintenance_date == Some(date) {
            return Ok(vec![]);
        }
        Ok(self.emit(TankEvent::TankMaintenanceScheduled {
            tank_id: self.id,
            next_maintenance_date: date,
            occurred_at: now,
        }))
    }

    /// Records maintenance performed now. `next` optionally schedules the
    /// following visit and must lie in the future.
    pub fn complete_maintenance(
        &mut self,
        next: Option<DateTime<Utc>>,
    ) -> Result<Vec<TankEvent>, DomainError> {
        let now = Utc::now();
        if let Some(next) = next {
            if next <= now {
                return Err(DomainError::validation(format!(
                    "Next maintenance date {next} must be in the future"
                )));
            }
        }
        Ok(self.emit(TankEvent::TankMaintenanceCompleted {
            tank_id: self.id,
            last_maintenance_date: now,
            next_maintenance_date: next,
            occurred_at: now,
        }))
    }

    pub fn add_sensor(&mut self, sensor: Sensor) -> Result<Vec<TankEvent>, DomainError> {
        if self.sensor(sensor.id()).is_some() {
            return Err(DomainError::invariant(format!(
                "Sensor {} is already attached to tank {}",
                sensor.id(),
                self.id
            )));
        }
        if self.sensors.len() >= MAX_SENSORS {
            return Err(DomainError::invariant(format!(
                "Tank {} already holds the maximum of {MAX_SENSORS} sensors",
                self.id
            )));
        }
        Ok(self.emit(TankEvent::SensorAddedToTank {
            tank_id: self.id,
            sensor,
            occurred_at: Utc::now(),
        }))
    }

    pub fn remove_sensor(&mut self, sensor_id: SensorId) -> Result<Vec<TankEvent>, DomainError> {
        let sensor = self.require_sensor(sensor_id)?;
        if sensor.is_active() {
            self.guard_last_active_sensor(sensor_id, "removed")?;
        }
        Ok(self.emit(TankEvent::SensorRemovedFromTank {
            tank_id: self.id,
            sensor_id,
            occurred_at: Utc::now(),
        }))
    }

    pub fn calibrate_sensor(&mut self, sensor_id: SensorId) -> Result<Vec<TankEvent>, DomainError> {
        let sensor = self.require_sensor(sensor_id)?;
        let now = Utc::now();
        let next_due = now + sensor.sensor_type().calibration_interval();
        Ok(self.emit(TankEvent::SensorCalibrated {
            tank_id: self.id,
            sensor_id,
            calibration_date: now,
            next_calibration_date: next_due,
            occurred_at: now,
        }))
    }

    pub fn update_sensor_range(
        &mut self,
        sensor_id: SensorId,
        min_value: f64,
        max_value: f64,
    ) -> Result<Vec<TankEvent>, DomainError> {
        validate_range(min_value, max_value)?;
        let sensor = self.require_sensor(sensor_id)?;
        if sensor.min_value() == min_value && sensor.max_value() == max_value {
            return Ok(vec![]);
        }
        Ok(self.emit(TankEvent::SensorRangeUpdated {
            tank_id: self.id,
            sensor_id,
            min_value,
            max_value,
            occurred_at: Utc::now(),
        }))
    }

    pub fn activate_sensor(&mut self, sensor_id: SensorId) -> Result<Vec<TankEvent>, DomainError> {
        if self.require_sensor(sensor_id)?.is_active() {
            return Ok(vec![]);
        }
        Ok(self.emit(TankEvent::SensorActivated {
            tank_id: self.id,
            sensor_id,
            occurred_at: Utc::now(),
        }))
    }

    pub fn deactivate_sensor(&mut self, sensor_id: SensorId) -> Result<Vec<TankEvent>, DomainError> {
        if !self.require_sensor(sensor_id)?.is_active() {
            return Ok(vec![]);
        }
        self.guard_last_active_sensor(sensor_id, "deactivated")?;
        Ok(self.emit(TankEvent::SensorDeactivated {
            tank_id: self.id,
            sensor_id,
            occurred_at: Utc::now(),
        }))
    }

    pub fn change_sensor_status(
        &mut self,
        sensor_id: SensorId,
        status: SensorStatus,
    ) -> Result<Vec<TankEvent>, DomainError> {
        if self.require_sensor(sensor_id)?.status() == status {
            return Ok(vec![]);
        }
        Ok(self.emit(TankEvent::SensorStatusChanged {
            tank_id: self.id,
            sensor_id,
            status,
            occurred_at: Utc::now(),
        }))
    }

    // ========================================================================
    // State transition
    // ========================================================================

    /// Applies one event to in-memory state without validation.
    ///
    /// Total over every variant. Events that target a missing sensor, a
    /// `SensorAddedToTank` for a sensor already present, and unrecognized
    /// variants leave state unchanged but still advance `version`, since they
    /// occupy a slot in the stream.
    pub fn apply(&mut self, event: &TankEvent) {
        self.version += 1;
        if let Some(occurred_at) = event.occurred_at() {
            self.updated_at = occurred_at;
        }

        match event {
            TankEvent::TankCreated { .. } => {
                warn!(tank_id = %self.id, version = self.version, "Ignoring TankCreated on an existing tank");
            }
            TankEvent::TankNameChanged { name, .. } => self.name = name.clone(),
            TankEvent::TankCapacityChanged { capacity, .. } => self.capacity = *capacity,
            TankEvent::TankRelocated { location, .. } => self.location = location.clone(),
            TankEvent::TankActivated { .. } => self.status = TankStatus::Active,
            TankEvent::TankDeactivated { .. } => self.status = TankStatus::Inactive,
            TankEvent::TankOptimalParametersSet { parameters, .. } => {
                self.optimal_parameters = Some(parameters.clone());
            }
            TankEvent::TankMaintenanceScheduled {
                next_maintenance_date,
                ..
            } => self.next_maintenance_date = Some(*next_maintenance_date),
            TankEvent::TankMaintenanceCompleted {
                last_maintenance_date,
                next_maintenance_date,
                ..
            } => {
                self.last_maintenance_date = Some(*last_maintenance_date);
                self.next_maintenance_date = *next_maintenance_date;
            }
            TankEvent::SensorAddedToTank { sensor, .. } => {
                if self.sensor(sensor.id()).is_some() {
                    debug!(tank_id = %self.id, sensor_id = %sensor.id(), "Sensor already attached, skipping re-delivered event");
                } else {
                    self.sensors.push(sensor.clone());
                }
            }
            TankEvent::SensorRemovedFromTank { sensor_id, .. } => {
                self.sensors.retain(|s| s.id() != *sensor_id);
            }
            TankEvent::SensorCalibrated {
                sensor_id,
                calibration_date,
                next_calibration_date,
                ..
            } => self.with_sensor(*sensor_id, |s| {
                s.record_calibration(*calibration_date, *next_calibration_date)
            }),
            TankEvent::SensorRangeUpdated {
                sensor_id,
                min_value,
                max_value,
                ..
            } => self.with_sensor(*sensor_id, |s| s.set_range(*min_value, *max_value)),
            TankEvent::SensorActivated { sensor_id, .. } => self.with_sensor(*sensor_id, |s| s.set_active(true)),
            TankEvent::SensorDeactivated { sensor_id, .. } => self.with_sensor(*sensor_id, |s| s.set_active(false)),
            TankEvent::SensorStatusChanged { sensor_id, status, .. } => {
                self.with_sensor(*sensor_id, |s| s.set_status(*status))
            }
            TankEvent::Unrecognized { event_type, .. } => {
                metrics::counter!("aquacontrol_unrecognized_events_skipped_total").increment(1);
                warn!(
                    tank_id = %self.id,
                    version = self.version,
                    event_type = %event_type,
                    "Skipping unrecognized event during replay; its state change is not reflected"
                );
            }
        }
    }

    /// Replays a stored tail onto this tank, checking stream structure (not
    /// business rules) as it goes.
    pub fn replay<'a>(
        &mut self,
        events: impl IntoIterator<Item = (u64, &'a TankEvent)>,
    ) -> Result<(), ReconstructionError> {
        for (version, event) in events {
            let expected = self.version + 1;
            if version != expected {
                return Err(ReconstructionError::VersionGap {
                    tank_id: self.id,
                    expected,
                    found: version,
                });
            }
            if event.is_creation() {
                return Err(ReconstructionError::DuplicateCreationEvent {
                    tank_id: self.id,
                    version,
                });
            }
            if let Some(found) = event.tank_id() {
                if found != self.id {
                    return Err(ReconstructionError::ForeignEvent {
                        expected: self.id,
                        found,
                        version,
                    });
                }
            }
            self.apply(event);
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn id(&self) -> TankId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> &TankCapacity {
        &self.capacity
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn tank_type(&self) -> TankType {
        self.tank_type
    }

    pub fn status(&self) -> TankStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == TankStatus::Active
    }

    pub fn optimal_parameters(&self) -> Option<&WaterQualityParameters> {
        self.optimal_parameters.as_ref()
    }

    pub fn last_maintenance_date(&self) -> Option<DateTime<Utc>> {
        self.last_maintenance_date
    }

    pub fn next_maintenance_date(&self) -> Option<DateTime<Utc>> {
        self.next_maintenance_date
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn sensor(&self, sensor_id: SensorId) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.id() == sensor_id)
    }

    pub fn active_sensor_count(&self) -> usize {
        self.sensors.iter().filter(|s| s.is_active()).count()
    }

    pub fn has_active_sensor(&self) -> bool {
        self.sensors.iter().any(Sensor::is_active)
    }

    pub fn sensors_due_for_calibration(&self, at: DateTime<Utc>) -> Vec<&Sensor> {
        self.sensors.iter().filter(|s| s.is_calibration_due(at)).collect()
    }

    pub fn is_maintenance_due(&self, at: DateTime<Utc>) -> bool {
        self.next_maintenance_date.is_some_and(|due| at >= due)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn emit(&mut self, event: TankEvent) -> Vec<TankEvent> {
        self.apply(&event);
        vec![event]
    }

    fn require_sensor(&self, sensor_id: SensorId) -> Result<&Sensor, DomainError> {
        self.sensor(sensor_id).ok_or_else(|| {
            DomainError::validation(format!("Sensor {sensor_id} is not attached to tank {}", self.id))
        })
    }

    fn guard_last_active_sensor(&self, sensor_id: SensorId, action: &str) -> Result<(), DomainError> {
        if self.is_active() && self.active_sensor_count() <= 1 {
            return Err(DomainError::invariant(format!(
                "Sensor {sensor_id} is the last active sensor of active tank {} and cannot be {action}",
                self.id
            )));
        }
        Ok(())
    }

    fn with_sensor(&mut self, sensor_id: SensorId, change: impl FnOnce(&mut Sensor)) {
        match self.sensors.iter_mut().find(|s| s.id() == sensor_id) {
            Some(sensor) => change(sensor),
            None => {
                warn!(tank_id = %self.id, sensor_id = %sensor_id, version = self.version, "Event targets a sensor not attached to this tank");
            }
        }
    }
}

fn validate_name(name: String) -> Result<String, DomainError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("Tank name cannot be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(DomainError::validation(format!(
            "Tank name cannot exceed {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// Tests
// ============================================================================
