// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0
//! Flat read-side view of a tank, rebuilt from the aggregate after each commit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::tank::{Tank, TankId, TankStatus, TankType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankProjection {
    pub tank_id: TankId,
    pub name: String,
    pub tank_type: TankType,
    pub status: TankStatus,
    pub capacity_liters: Decimal,
    pub location: String,
    pub sensor_count: usize,
    pub active_sensor_count: usize,
    /// Earliest upcoming calibration across all sensors.
    pub next_calibration_due: Option<DateTime<Utc>>,
    pub next_maintenance_date: Option<DateTime<Utc>>,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl TankProjection {
    pub fn project(tank: &Tank) -> Self {
        Self {
            tank_id: tank.id(),
            name: tank.name().to_string(),
            tank_type: tank.tank_type(),
            status: tank.status(),
            capacity_liters: tank.capacity().in_liters(),
            location: tank.location().to_string(),
            sensor_count: tank.sensors().len(),
            active_sensor_count: tank.active_sensor_count(),
            next_calibration_due: tank.sensors().iter().map(|s| s.next_calibration_date()).min(),
            next_maintenance_date: tank.next_maintenance_date(),
            version: tank.version(),
            updated_at: tank.updated_at(),
        }
    }
}
