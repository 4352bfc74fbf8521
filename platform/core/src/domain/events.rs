// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0
//! # Tank Domain Events
//!
//! One variant per state transition of the [`Tank`](crate::domain::tank::Tank)
//! aggregate. Every variant carries the owning `tank_id` and the complete
//! "after" value of whatever it changes, so applying an event never needs to
//! consult prior state beyond locating the entity it targets.
//!
//! ## Serialized form
//!
//! Events are persisted as an [`EventRecord`]: an explicit `event_type` tag plus
//! a JSON object holding the variant's fields. Decoding dispatches on the tag.
//! A tag this build does not know becomes [`TankEvent::Unrecognized`] so that a
//! stream written by a newer producer still replays; a known tag whose payload
//! does not match the variant is an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::sensor::{Sensor, SensorId, SensorStatus};
use crate::domain::tank::{TankId, TankType};
use crate::domain::value_objects::{Location, TankCapacity, WaterQualityParameters};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TankEvent {
    TankCreated {
        tank_id: TankId,
        name: String,
        capacity: TankCapacity,
        location: Location,
        tank_type: TankType,
        occurred_at: DateTime<Utc>,
    },
    TankNameChanged {
        tank_id: TankId,
        name: String,
        occurred_at: DateTime<Utc>,
    },
    TankCapacityChanged {
        tank_id: TankId,
        capacity: TankCapacity,
        occurred_at: DateTime<Utc>,
    },
    TankRelocated {
        tank_id: TankId,
        location: Location,
        occurred_at: DateTime<Utc>,
    },
    TankActivated {
        tank_id: TankId,
        occurred_at: DateTime<Utc>,
    },
    TankDeactivated {
        tank_id: TankId,
        occurred_at: DateTime<Utc>,
    },
    TankOptimalParametersSet {
        tank_id: TankId,
        parameters: WaterQualityParameters,
        occurred_at: DateTime<Utc>,
    },
    TankMaintenanceScheduled {
        tank_id: TankId,
        next_maintenance_date: DateTime<Utc>,
        occurred_at: DateTime<Utc>,
    },
    TankMaintenanceCompleted {
        tank_id: TankId,
        last_maintenance_date: DateTime<Utc>,
        next_maintenance_date: Option<DateTime<Utc>>,
        occurred_at: DateTime<Utc>,
    },
    SensorAddedToTank {
        tank_id: TankId,
        sensor: Sensor,
        occurred_at: DateTime<Utc>,
    },
    SensorRemovedFromTank {
        tank_id: TankId,
        sensor_id: SensorId,
        occurred_at: DateTime<Utc>,
    },
    SensorCalibrated {
        tank_id: TankId,
        sensor_id: SensorId,
        calibration_date: DateTime<Utc>,
        next_calibration_date: DateTime<Utc>,
        occurred_at: DateTime<Utc>,
    },
    SensorRangeUpdated {
        tank_id: TankId,
        sensor_id: SensorId,
        min_value: f64,
        max_value: f64,
        occurred_at: DateTime<Utc>,
    },
    SensorActivated {
        tank_id: TankId,
        sensor_id: SensorId,
        occurred_at: DateTime<Utc>,
    },
    SensorDeactivated {
        tank_id: TankId,
        sensor_id: SensorId,
        occurred_at: DateTime<Utc>,
    },
    SensorStatusChanged {
        tank_id: TankId,
        sensor_id: SensorId,
        status: SensorStatus,
        occurred_at: DateTime<Utc>,
    },
    /// Event whose tag is unknown to this build. Preserved verbatim so it can
    /// be re-encoded without loss; skipped by the state-transition function.
    #[serde(skip)]
    Unrecognized { event_type: String, payload: Value },
}

/// Tags of every event variant this build can apply.
pub const KNOWN_EVENT_TYPES: [&str; 16] = [
    "TankCreated",
    "TankNameChanged",
    "TankCapacityChanged",
    "TankRelocated",
    "TankActivated",
    "TankDeactivated",
    "TankOptimalParametersSet",
    "TankMaintenanceScheduled",
    "TankMaintenanceCompleted",
    "SensorAddedToTank",
    "SensorRemovedFromTank",
    "SensorCalibrated",
    "SensorRangeUpdated",
    "SensorActivated",
    "SensorDeactivated",
    "SensorStatusChanged",
];

impl TankEvent {
    pub fn event_type(&self) -> &str {
        match self {
            Self::TankCreated { .. } => "TankCreated",
            Self::TankNameChanged { .. } => "TankNameChanged",
            Self::TankCapacityChanged { .. } => "TankCapacityChanged",
            Self::TankRelocated { .. } => "TankRelocated",
            Self::TankActivated { .. } => "TankActivated",
            Self::TankDeactivated { .. } => "TankDeactivated",
            Self::TankOptimalParametersSet { .. } => "TankOptimalParametersSet",
            Self::TankMaintenanceScheduled { .. } => "TankMaintenanceScheduled",
            Self::TankMaintenanceCompleted { .. } => "TankMaintenanceCompleted",
            Self::SensorAddedToTank { .. } => "SensorAddedToTank",
            Self::SensorRemovedFromTank { .. } => "SensorRemovedFromTank",
            Self::SensorCalibrated { .. } => "SensorCalibrated",
            Self::SensorRangeUpdated { .. } => "SensorRangeUpdated",
            Self::SensorActivated { .. } => "SensorActivated",
            Self::SensorDeactivated { .. } => "SensorDeactivated",
            Self::SensorStatusChanged { .. } => "SensorStatusChanged",
            Self::Unrecognized { event_type, .. } => event_type,
        }
    }

    /// Owning tank. For unrecognized events this is read from a `tank_id`
    /// payload field when one is present.
    pub fn tank_id(&self) -> Option<TankId> {
        match self {
            Self::TankCreated { tank_id, .. }
            | Self::TankNameChanged { tank_id, .. }
            | Self::TankCapacityChanged { tank_id, .. }
            | Self::TankRelocated { tank_id, .. }
            | Self::TankActivated { tank_id, .. }
            | Self::TankDeactivated { tank_id, .. }
            | Self::TankOptimalParametersSet { tank_id, .. }
            | Self::TankMaintenanceScheduled { tank_id, .. }
            | Self::TankMaintenanceCompleted { tank_id, .. }
            | Self::SensorAddedToTank { tank_id, .. }
            | Self::SensorRemovedFromTank { tank_id, .. }
            | Self::SensorCalibrated { tank_id, .. }
            | Self::SensorRangeUpdated { tank_id, .. }
            | Self::SensorActivated { tank_id, .. }
            | Self::SensorDeactivated { tank_id, .. }
            | Self::SensorStatusChanged { tank_id, .. } => Some(*tank_id),
            Self::Unrecognized { payload, .. } => payload
                .get("tank_id")
                .and_then(Value::as_str)
                .and_then(|s| TankId::from_string(s).ok()),
        }
    }

    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::TankCreated { occurred_at, .. }
            | Self::TankNameChanged { occurred_at, .. }
            | Self::TankCapacityChanged { occurred_at, .. }
            | Self::TankRelocated { occurred_at, .. }
            | Self::TankActivated { occurred_at, .. }
            | Self::TankDeactivated { occurred_at, .. }
            | Self::TankOptimalParametersSet { occurred_at, .. }
            | Self::TankMaintenanceScheduled { occurred_at, .. }
            | Self::TankMaintenanceCompleted { occurred_at, .. }
            | Self::SensorAddedToTank { occurred_at, .. }
            | Self::SensorRemovedFromTank { occurred_at, .. }
            | Self::SensorCalibrated { occurred_at, .. }
            | Self::SensorRangeUpdated { occurred_at, .. }
            | Self::SensorActivated { occurred_at, .. }
            | Self::SensorDeactivated { occurred_at, .. }
            | Self::SensorStatusChanged { occurred_at, .. } => Some(*occurred_at),
            Self::Unrecognized { .. } => None,
        }
    }

    pub fn is_creation(&self) -> bool {
        matches!(self, Self::TankCreated { .. })
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized { .. })
    }
}

// ============================================================================
// Serialized record
// ============================================================================

/// Self-describing persisted form of a [`TankEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_type: String,
    pub payload: Value,
}

impl EventRecord {
    pub fn encode(event: &TankEvent) -> Result<Self, serde_json::Error> {
        if let TankEvent::Unrecognized { event_type, payload } = event {
            return Ok(Self {
                event_type: event_type.clone(),
                payload: payload.clone(),
            });
        }

        let mut payload = serde_json::to_value(event)?;
        if let Value::Object(fields) = &mut payload {
            fields.remove("type");
        }
        Ok(Self {
            event_type: event.event_type().to_string(),
            payload,
        })
    }

    /// Decodes by tag. Unknown tags never fail.
    pub fn decode(&self) -> Result<TankEvent, serde_json::Error> {
        if !KNOWN_EVENT_TYPES.contains(&self.event_type.as_str()) {
            return Ok(TankEvent::Unrecognized {
                event_type: self.event_type.clone(),
                payload: self.payload.clone(),
            });
        }

        let mut fields: Map<String, Value> = match &self.payload {
            Value::Object(fields) => fields.clone(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "payload of {} must be a JSON object, found {}",
                    self.event_type, other
                )))
            }
        };
        fields.insert("type".to_string(), Value::String(self.event_type.clone()));
        serde_json::from_value(Value::Object(fields))
    }
}

/// An event as it sits in the log: positioned at `version` within its tank's
/// stream. This is also the unit delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub tank_id: TankId,
    pub version: u64,
    pub event: TankEvent,
    pub recorded_at: DateTime<Utc>,
}
