// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0
//! # Tank Value Objects
//!
//! Immutable, validated data holders used by the tank aggregate and carried
//! verbatim inside domain events:
//!
//! - [`TankCapacity`] - positive decimal volume with a unit.
//! - [`Location`] - building/room address with optional zone and coordinates.
//! - [`WaterQualityParameters`] - optional optimal/min/max bands per metric.
//!
//! Constructors validate; there is no way to obtain an invalid instance through
//! the public API. Deserialization trusts its input because values only ever
//! enter the event log after passing through a constructor.

use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

// ============================================================================
// Capacity
// ============================================================================

/// Litres in one US liquid gallon.
const LITERS_PER_GALLON: Decimal = Decimal::from_parts(3_785_411_784, 0, 0, false, 9);
const MILLILITERS_PER_LITER: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// Scale kept after a unit conversion.
const CONVERSION_SCALE: u32 = 6;

/// Largest volume a tank may hold, in litres (one cubic kilometre).
pub const MAX_CAPACITY_LITERS: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapacityUnit {
    #[serde(rename = "L")]
    Liters,
    #[serde(rename = "ML")]
    Milliliters,
    #[serde(rename = "GAL")]
    Gallons,
}

impl CapacityUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Liters => "L",
            Self::Milliliters => "mL",
            Self::Gallons => "gal",
        }
    }

    fn liters_per_unit(&self) -> Decimal {
        match self {
            Self::Liters => Decimal::ONE,
            Self::Milliliters => Decimal::ONE / MILLILITERS_PER_LITER,
            Self::Gallons => LITERS_PER_GALLON,
        }
    }
}

impl std::str::FromStr for CapacityUnit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" | "LITER" | "LITERS" | "LITRE" | "LITRES" => Ok(Self::Liters),
            "ML" | "MILLILITER" | "MILLILITERS" => Ok(Self::Milliliters),
            "GAL" | "GALLON" | "GALLONS" => Ok(Self::Gallons),
            other => Err(DomainError::validation(format!("Unknown capacity unit: {other}"))),
        }
    }
}

/// Water volume a tank holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TankCapacity {
    value: Decimal,
    unit: CapacityUnit,
}

impl TankCapacity {
    pub fn new(value: Decimal, unit: CapacityUnit) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "Tank capacity must be greater than zero, got {value}"
            )));
        }
        match value.checked_mul(unit.liters_per_unit()) {
            Some(liters) if liters <= MAX_CAPACITY_LITERS => {}
            _ => {
                return Err(DomainError::validation(format!(
                    "Tank capacity {value} {} exceeds the maximum of {MAX_CAPACITY_LITERS} L",
                    unit.symbol()
                )))
            }
        }
        Ok(Self {
            value: value.normalize(),
            unit,
        })
    }

    pub fn liters(value: impl Into<Decimal>) -> Result<Self, DomainError> {
        Self::new(value.into(), CapacityUnit::Liters)
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn unit(&self) -> CapacityUnit {
        self.unit
    }

    /// Volume in litres. Saturates at `Decimal::MAX` for values that did not
    /// come through [`TankCapacity::new`].
    pub fn in_liters(&self) -> Decimal {
        self.value
            .checked_mul(self.unit.liters_per_unit())
            .unwrap_or(Decimal::MAX)
    }

    /// Returns the same volume expressed in `unit`.
    pub fn convert_to(&self, unit: CapacityUnit) -> Result<Self, DomainError> {
        if unit == self.unit {
            return Ok(*self);
        }
        let converted = self
            .value
            .checked_mul(self.unit.liters_per_unit())
            .and_then(|liters| liters.checked_div(unit.liters_per_unit()))
            .ok_or_else(|| {
                DomainError::validation(format!("Capacity {self} cannot be expressed in {}", unit.symbol()))
            })?
            .round_dp_with_strategy(CONVERSION_SCALE, RoundingStrategy::MidpointNearestEven);
        Self::new(converted, unit)
    }

    /// Volume comparison that ignores the unit each side is expressed in.
    pub fn same_volume_as(&self, other: &TankCapacity) -> bool {
        let scale = |c: &TankCapacity| {
            c.in_liters()
                .round_dp_with_strategy(CONVERSION_SCALE, RoundingStrategy::MidpointNearestEven)
        };
        scale(self) == scale(other)
    }
}

impl fmt::Display for TankCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.symbol())
    }
}

// ============================================================================
// Location
// ============================================================================

/// Physical placement of a tank.
///
/// Text fields compare case-insensitively; surrounding whitespace is trimmed
/// at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    building: String,
    room: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    longitude: Option<f64>,
}

impl Location {
    pub fn new(building: impl Into<String>, room: impl Into<String>) -> Result<Self, DomainError> {
        let building = required_text("building", building.into())?;
        let room = required_text("room", room.into())?;
        Ok(Self {
            building,
            room,
            zone: None,
            latitude: None,
            longitude: None,
        })
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Result<Self, DomainError> {
        self.zone = Some(required_text("zone", zone.into())?);
        Ok(self)
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Result<Self, DomainError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(DomainError::validation(format!(
                "Latitude must be within [-90, 90], got {latitude}"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(DomainError::validation(format!(
                "Longitude must be within [-180, 180], got {longitude}"
            )));
        }
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        Ok(self)
    }

    pub fn building(&self) -> &str {
        &self.building
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    pub fn latitude(&self) -> Option<f64> {
        self.latitude
    }

    pub fn longitude(&self) -> Option<f64> {
        self.longitude
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        fn same(a: &str, b: &str) -> bool {
            a.to_lowercase() == b.to_lowercase()
        }
        let zones_match = match (&self.zone, &other.zone) {
            (Some(a), Some(b)) => same(a, b),
            (None, None) => true,
            _ => false,
        };
        same(&self.building, &other.building)
            && same(&self.room, &other.room)
            && zones_match
            && self.latitude == other.latitude
            && self.longitude == other.longitude
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.building, self.room)?;
        if let Some(zone) = &self.zone {
            write!(f, " / {zone}")?;
        }
        Ok(())
    }
}

fn required_text(field: &str, value: String) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// Water quality
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterMetric {
    Temperature,
    Ph,
    DissolvedOxygen,
    Salinity,
}

impl WaterMetric {
    /// Physically meaningful bounds for thresholds on this metric.
    fn admissible(&self) -> (f64, f64) {
        match self {
            Self::Temperature => (-5.0, 50.0),
            Self::Ph => (0.0, 14.0),
            Self::DissolvedOxygen => (0.0, 50.0),
            Self::Salinity => (0.0, 60.0),
        }
    }
}

impl fmt::Display for WaterMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Temperature => "temperature",
            Self::Ph => "pH",
            Self::DissolvedOxygen => "dissolved oxygen",
            Self::Salinity => "salinity",
        };
        f.write_str(label)
    }
}

/// Optimal value and acceptable band for one metric. Every bound is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl ParameterRange {
    pub fn new(optimal: Option<f64>, min: Option<f64>, max: Option<f64>) -> Self {
        Self { optimal, min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.optimal.is_none() && self.min.is_none() && self.max.is_none()
    }

    fn validate(&self, metric: WaterMetric) -> Result<(), DomainError> {
        let (low, high) = metric.admissible();
        for value in [self.optimal, self.min, self.max].into_iter().flatten() {
            if !value.is_finite() || value < low || value > high {
                return Err(DomainError::validation(format!(
                    "{metric} threshold {value} is outside [{low}, {high}]"
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min >= max {
                return Err(DomainError::validation(format!(
                    "{metric} minimum ({min}) must be less than maximum ({max})"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingAssessment {
    BelowMinimum,
    WithinRange,
    AboveMaximum,
}

/// Target water conditions for a tank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaterQualityParameters {
    #[serde(default, skip_serializing_if = "ParameterRange::is_empty")]
    temperature: ParameterRange,
    #[serde(default, skip_serializing_if = "ParameterRange::is_empty")]
    ph: ParameterRange,
    #[serde(default, skip_serializing_if = "ParameterRange::is_empty")]
    dissolved_oxygen: ParameterRange,
    #[serde(default, skip_serializing_if = "ParameterRange::is_empty")]
    salinity: ParameterRange,
}

impl WaterQualityParameters {
    pub fn new(
        temperature: ParameterRange,
        ph: ParameterRange,
        dissolved_oxygen: ParameterRange,
        salinity: ParameterRange,
    ) -> Result<Self, DomainError> {
        temperature.validate(WaterMetric::Temperature)?;
        ph.validate(WaterMetric::Ph)?;
        dissolved_oxygen.validate(WaterMetric::DissolvedOxygen)?;
        salinity.validate(WaterMetric::Salinity)?;
        Ok(Self {
            temperature,
            ph,
            dissolved_oxygen,
            salinity,
        })
    }

    pub fn range(&self, metric: WaterMetric) -> &ParameterRange {
        match metric {
            WaterMetric::Temperature => &self.temperature,
            WaterMetric::Ph => &self.ph,
            WaterMetric::DissolvedOxygen => &self.dissolved_oxygen,
            WaterMetric::Salinity => &self.salinity,
        }
    }

    /// Classifies a reading against the configured band. Missing bounds never
    /// flag a reading.
    pub fn evaluate(&self, metric: WaterMetric, value: f64) -> ReadingAssessment {
        let range = self.range(metric);
        match (range.min, range.max) {
            (Some(min), _) if value < min => ReadingAssessment::BelowMinimum,
            (_, Some(max)) if value > max => ReadingAssessment::AboveMaximum,
            _ => ReadingAssessment::WithinRange,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_capacity_rejects_non_positive_values() {
        assert!(TankCapacity::new(Decimal::ZERO, CapacityUnit::Liters).is_err());
        assert!(TankCapacity::new(Decimal::from(-5), CapacityUnit::Gallons).is_err());
        assert!(TankCapacity::liters(1000).is_ok());
    }

    #[test]
    fn test_capacity_equality_is_numeric() {
        let a = TankCapacity::new(Decimal::from_str("1000.0").unwrap(), CapacityUnit::Liters).unwrap();
        let b = TankCapacity::new(Decimal::from_str("1000").unwrap(), CapacityUnit::Liters).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_capacity_conversion_produces_new_instance() {
        let liters = TankCapacity::liters(2).unwrap();
        let millis = liters.convert_to(CapacityUnit::Milliliters).unwrap();
        assert_eq!(millis.value(), Decimal::from(2000));
        assert_eq!(millis.unit(), CapacityUnit::Milliliters);
        assert_eq!(liters.unit(), CapacityUnit::Liters);
        assert!(liters.same_volume_as(&millis));
    }

    #[test]
    fn test_capacity_gallon_conversion() {
        let gallons = TankCapacity::new(Decimal::from(10), CapacityUnit::Gallons).unwrap();
        let liters = gallons.convert_to(CapacityUnit::Liters).unwrap();
        assert_eq!(liters.value(), Decimal::from_str("37.854118").unwrap());
    }

    #[test]
    fn test_capacity_above_maximum_is_rejected() {
        for unit in [CapacityUnit::Liters, CapacityUnit::Milliliters, CapacityUnit::Gallons] {
            let err = TankCapacity::new(Decimal::MAX, unit).unwrap_err();
            assert!(err.is_validation());
        }
        assert!(TankCapacity::new(MAX_CAPACITY_LITERS, CapacityUnit::Liters).is_ok());
        assert!(TankCapacity::new(MAX_CAPACITY_LITERS + Decimal::ONE, CapacityUnit::Liters).is_err());
        assert!(TankCapacity::new(MAX_CAPACITY_LITERS, CapacityUnit::Gallons).is_err());
    }

    #[test]
    fn test_largest_capacity_converts_between_all_units() {
        let largest = TankCapacity::liters(MAX_CAPACITY_LITERS).unwrap();
        let millis = largest.convert_to(CapacityUnit::Milliliters).unwrap();
        assert_eq!(millis.value(), MAX_CAPACITY_LITERS * Decimal::from(1000));
        let gallons = largest.convert_to(CapacityUnit::Gallons).unwrap();
        assert!(gallons.in_liters() <= MAX_CAPACITY_LITERS);
        assert_eq!(largest.in_liters(), MAX_CAPACITY_LITERS);
    }

    #[test]
    fn test_in_liters_saturates_on_unvalidated_input() {
        let raw = serde_json::json!({ "value": Decimal::MAX.to_string(), "unit": "GAL" });
        let capacity: TankCapacity = serde_json::from_value(raw).unwrap();
        assert_eq!(capacity.in_liters(), Decimal::MAX);
        assert!(capacity.convert_to(CapacityUnit::Milliliters).unwrap_err().is_validation());
    }

    #[test]
    fn test_capacity_unit_parsing() {
        assert_eq!(CapacityUnit::from_str("l").unwrap(), CapacityUnit::Liters);
        assert_eq!(CapacityUnit::from_str("GAL").unwrap(), CapacityUnit::Gallons);
        assert!(CapacityUnit::from_str("barrel").is_err());
    }

    #[test]
    fn test_location_requires_building_and_room() {
        assert!(Location::new("", "Room 1").is_err());
        assert!(Location::new("Hatchery", "   ").is_err());
        assert!(Location::new("Hatchery", "Room 1").is_ok());
    }

    #[test]
    fn test_location_coordinate_bounds() {
        let base = Location::new("Hatchery", "Room 1").unwrap();
        assert!(base.clone().with_coordinates(91.0, 0.0).is_err());
        assert!(base.clone().with_coordinates(0.0, -180.5).is_err());
        assert!(base.with_coordinates(-90.0, 180.0).is_ok());
    }

    #[test]
    fn test_location_equality_ignores_case() {
        let a = Location::new("Hatchery", "Room 1").unwrap().with_zone("North").unwrap();
        let b = Location::new("HATCHERY", " room 1 ").unwrap().with_zone("north").unwrap();
        assert_eq!(a, b);

        let c = Location::new("Hatchery", "Room 2").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_water_quality_requires_min_below_max() {
        let bad = ParameterRange::new(None, Some(8.0), Some(6.5));
        assert!(WaterQualityParameters::new(
            ParameterRange::default(),
            bad,
            ParameterRange::default(),
            ParameterRange::default()
        )
        .is_err());

        let equal = ParameterRange::new(None, Some(20.0), Some(20.0));
        assert!(WaterQualityParameters::new(
            equal,
            ParameterRange::default(),
            ParameterRange::default(),
            ParameterRange::default()
        )
        .is_err());
    }

    #[test]
    fn test_water_quality_rejects_impossible_ph() {
        let ph = ParameterRange::new(Some(15.0), None, None);
        assert!(WaterQualityParameters::new(
            ParameterRange::default(),
            ph,
            ParameterRange::default(),
            ParameterRange::default()
        )
        .is_err());
    }

    #[test]
    fn test_water_quality_evaluation() {
        let params = WaterQualityParameters::new(
            ParameterRange::new(Some(24.0), Some(20.0), Some(28.0)),
            ParameterRange::default(),
            ParameterRange::new(None, Some(5.0), None),
            ParameterRange::default(),
        )
        .unwrap();

        assert_eq!(params.evaluate(WaterMetric::Temperature, 19.5), ReadingAssessment::BelowMinimum);
        assert_eq!(params.evaluate(WaterMetric::Temperature, 24.0), ReadingAssessment::WithinRange);
        assert_eq!(params.evaluate(WaterMetric::Temperature, 30.0), ReadingAssessment::AboveMaximum);
        assert_eq!(params.evaluate(WaterMetric::DissolvedOxygen, 4.0), ReadingAssessment::BelowMinimum);
        assert_eq!(params.evaluate(WaterMetric::Salinity, 35.0), ReadingAssessment::WithinRange);
    }
}
