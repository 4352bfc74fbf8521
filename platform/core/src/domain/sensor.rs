// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0
//! # Sensor Entity
//!
//! A sensor is a child entity of [`Tank`](crate::domain::tank::Tank). It has
//! its own identity but no lifecycle outside its owning tank: it is created by
//! [`Sensor::new`], handed to `Tank::add_sensor`, and from then on only changed
//! by the tank's state-transition function. The mutators in this module are
//! crate-private for that reason.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::errors::DomainError;

/// Unique identifier for a sensor.
///
/// Wraps the raw UUID without exposing implicit conversions; use
/// [`SensorId::from_uuid`] and [`SensorId::as_uuid`] at system boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(Uuid);

impl SensorId {
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

impl Default for SensorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Temperature,
    Ph,
    DissolvedOxygen,
    Salinity,
    Turbidity,
    Ammonia,
    Nitrite,
    Nitrate,
    WaterLevel,
    FlowRate,
}

impl SensorType {
    pub const ALL: [SensorType; 10] = [
        Self::Temperature,
        Self::Ph,
        Self::DissolvedOxygen,
        Self::Salinity,
        Self::Turbidity,
        Self::Ammonia,
        Self::Nitrite,
        Self::Nitrate,
        Self::WaterLevel,
        Self::FlowRate,
    ];

    /// Days between calibrations recommended for this sensor family.
    pub fn calibration_interval_days(&self) -> i64 {
        match self {
            Self::Temperature => 180,
            Self::Ph => 30,
            Self::DissolvedOxygen => 60,
            Self::Salinity => 90,
            Self::Turbidity => 90,
            Self::Ammonia | Self::Nitrite | Self::Nitrate => 30,
            Self::WaterLevel => 365,
            Self::FlowRate => 180,
        }
    }

    pub fn calibration_interval(&self) -> Duration {
        Duration::days(self.calibration_interval_days())
    }

    pub fn unit_of_measurement(&self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Ph => "pH",
            Self::DissolvedOxygen => "mg/L",
            Self::Salinity => "ppt",
            Self::Turbidity => "NTU",
            Self::Ammonia | Self::Nitrite | Self::Nitrate => "mg/L",
            Self::WaterLevel => "cm",
            Self::FlowRate => "L/min",
        }
    }
}

impl std::str::FromStr for SensorType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "temperature" => Ok(Self::Temperature),
            "ph" => Ok(Self::Ph),
            "dissolved_oxygen" | "oxygen" => Ok(Self::DissolvedOxygen),
            "salinity" => Ok(Self::Salinity),
            "turbidity" => Ok(Self::Turbidity),
            "ammonia" => Ok(Self::Ammonia),
            "nitrite" => Ok(Self::Nitrite),
            "nitrate" => Ok(Self::Nitrate),
            "water_level" => Ok(Self::WaterLevel),
            "flow_rate" => Ok(Self::FlowRate),
            other => Err(DomainError::validation(format!("Unknown sensor type: {other}"))),
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    Online,
    Offline,
    Calibrating,
    Error,
    Maintenance,
}

impl std::str::FromStr for SensorStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            "calibrating" => Ok(Self::Calibrating),
            "error" => Ok(Self::Error),
            "maintenance" => Ok(Self::Maintenance),
            other => Err(DomainError::validation(format!("Unknown sensor status: {other}"))),
        }
    }
}

/// Measurement device attached to a tank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    id: SensorId,
    sensor_type: SensorType,
    model: String,
    manufacturer: String,
    serial_number: String,
    accuracy: f64,
    min_value: f64,
    max_value: f64,
    installation_date: DateTime<Utc>,
    calibration_date: DateTime<Utc>,
    next_calibration_date: DateTime<Utc>,
    is_active: bool,
    status: SensorStatus,
}

/// Input for [`Sensor::new`].
#[derive(Debug, Clone)]
pub struct SensorSpec {
    pub sensor_type: SensorType,
    pub model: String,
    pub manufacturer: String,
    pub serial_number: String,
    pub accuracy: f64,
    pub min_value: f64,
    pub max_value: f64,
}

impl Sensor {
    /// Factory. The sensor starts active, online and freshly calibrated at
    /// `installed_at`.
    pub fn new(spec: SensorSpec, installed_at: DateTime<Utc>) -> Result<Self, DomainError> {
        let model = required("model", spec.model)?;
        let manufacturer = required("manufacturer", spec.manufacturer)?;
        let serial_number = required("serial number", spec.serial_number)?;

        if !spec.accuracy.is_finite() || spec.accuracy <= 0.0 || spec.accuracy > 100.0 {
            return Err(DomainError::validation(format!(
                "Sensor accuracy must be within (0, 100], got {}",
                spec.accuracy
            )));
        }
        validate_range(spec.min_value, spec.max_value)?;

        Ok(Self {
            id: SensorId::new(),
            sensor_type: spec.sensor_type,
            model,
            manufacturer,
            serial_number,
            accuracy: spec.accuracy,
            min_value: spec.min_value,
            max_value: spec.max_value,
            installation_date: installed_at,
            calibration_date: installed_at,
            next_calibration_date: installed_at + spec.sensor_type.calibration_interval(),
            is_active: true,
            status: SensorStatus::Online,
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn id(&self) -> SensorId {
        self.id
    }

    pub fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn min_value(&self) -> f64 {
        self.min_value
    }

    pub fn max_value(&self) -> f64 {
        self.max_value
    }

    pub fn installation_date(&self) -> DateTime<Utc> {
        self.installation_date
    }

    pub fn calibration_date(&self) -> DateTime<Utc> {
        self.calibration_date
    }

    pub fn next_calibration_date(&self) -> DateTime<Utc> {
        self.next_calibration_date
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn status(&self) -> SensorStatus {
        self.status
    }

    pub fn is_calibration_due(&self, at: DateTime<Utc>) -> bool {
        at >= self.next_calibration_date
    }

    /// Whether `value` lies inside the measurement range of the device.
    pub fn can_measure(&self, value: f64) -> bool {
        value >= self.min_value && value <= self.max_value
    }

    // ========================================================================
    // Mutators (invoked only from Tank::apply)
    // ========================================================================

    pub(crate) fn record_calibration(&mut self, calibrated_at: DateTime<Utc>, next_due: DateTime<Utc>) {
        self.calibration_date = calibrated_at;
        self.next_calibration_date = next_due;
        if self.status == SensorStatus::Calibrating {
            self.status = SensorStatus::Online;
        }
    }

    pub(crate) fn set_range(&mut self, min_value: f64, max_value: f64) {
        self.min_value = min_value;
        self.max_value = max_value;
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.status = if active {
            SensorStatus::Online
        } else {
            SensorStatus::Offline
        };
    }

    pub(crate) fn set_status(&mut self, status: SensorStatus) {
        self.status = status;
    }
}

pub(crate) fn validate_range(min_value: f64, max_value: f64) -> Result<(), DomainError> {
    if !min_value.is_finite() || !max_value.is_finite() {
        return Err(DomainError::validation("Measurement range bounds must be finite"));
    }
    if min_value >= max_value {
        return Err(DomainError::validation(format!(
            "Measurement range minimum ({min_value}) must be less than maximum ({max_value})"
        )));
    }
    Ok(())
}

fn required(field: &str, value: String) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("Sensor {field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn spec(sensor_type: SensorType) -> SensorSpec {
        SensorSpec {
            sensor_type,
            model: "AquaProbe 3000".to_string(),
            manufacturer: "Hydrotech".to_string(),
            serial_number: "HT-0001".to_string(),
            accuracy: 98.0,
            min_value: 0.0,
            max_value: 40.0,
        }
    }

    #[test]
    fn test_sensor_factory_defaults() {
        let installed = Utc::now();
        let sensor = Sensor::new(spec(SensorType::Temperature), installed).unwrap();

        assert!(sensor.is_active());
        assert_eq!(sensor.status(), SensorStatus::Online);
        assert_eq!(sensor.calibration_date(), installed);
        assert_eq!(sensor.next_calibration_date(), installed + Duration::days(180));
    }

    #[test]
    fn test_sensor_factory_validates_strings() {
        let mut bad = spec(SensorType::Ph);
        bad.model = "  ".to_string();
        assert!(Sensor::new(bad, Utc::now()).unwrap_err().is_validation());

        let mut bad = spec(SensorType::Ph);
        bad.serial_number = String::new();
        assert!(Sensor::new(bad, Utc::now()).is_err());
    }

    #[test]
    fn test_sensor_accuracy_bounds() {
        for accuracy in [0.0, -1.0, 100.5, f64::NAN] {
            let mut s = spec(SensorType::Salinity);
            s.accuracy = accuracy;
            assert!(Sensor::new(s, Utc::now()).is_err(), "accuracy {accuracy} accepted");
        }
        let mut s = spec(SensorType::Salinity);
        s.accuracy = 100.0;
        assert!(Sensor::new(s, Utc::now()).is_ok());
    }

    #[test]
    fn test_sensor_range_must_be_ordered() {
        let mut s = spec(SensorType::Turbidity);
        s.min_value = 10.0;
        s.max_value = 10.0;
        assert!(Sensor::new(s, Utc::now()).is_err());
    }

    #[test]
    fn test_can_measure_includes_range_bounds() {
        let sensor = Sensor::new(spec(SensorType::Temperature), Utc::now()).unwrap();
        assert!(sensor.can_measure(0.0));
        assert!(sensor.can_measure(22.5));
        assert!(sensor.can_measure(40.0));
        assert!(!sensor.can_measure(-0.1));
        assert!(!sensor.can_measure(40.01));
        assert!(!sensor.can_measure(f64::NAN));
    }

    #[test]
    fn test_calibration_interval_is_type_specific() {
        assert_eq!(SensorType::Ph.calibration_interval_days(), 30);
        assert_eq!(SensorType::DissolvedOxygen.calibration_interval_days(), 60);
        assert_eq!(SensorType::WaterLevel.calibration_interval_days(), 365);
    }

    #[test]
    fn test_calibration_due() {
        let installed = Utc::now() - Duration::days(31);
        let sensor = Sensor::new(spec(SensorType::Ph), installed).unwrap();
        assert!(sensor.is_calibration_due(Utc::now()));
        assert!(!sensor.is_calibration_due(installed));
    }

    #[test]
    fn test_sensor_type_parsing() {
        use std::str::FromStr;
        assert_eq!(SensorType::from_str("dissolved-oxygen").unwrap(), SensorType::DissolvedOxygen);
        assert_eq!(SensorType::from_str("Flow Rate").unwrap(), SensorType::FlowRate);
        assert!(SensorType::from_str("radar").is_err());
    }
}
