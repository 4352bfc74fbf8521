// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0

//! Tank and sensor commands
//!
//! Every mutating command loads the tank from the event store, runs one
//! aggregate command and commits the resulting events.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use colored::Colorize;
use rust_decimal::Decimal;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

use aquacontrol_core::application::{CommandOutcome, CommitWarning, TankCommandService};
use aquacontrol_core::domain::events::RecordedEvent;
use aquacontrol_core::domain::projection::TankProjection;
use aquacontrol_core::domain::sensor::{Sensor, SensorId, SensorSpec, SensorStatus, SensorType};
use aquacontrol_core::domain::tank::{Tank, TankId, TankType};
use aquacontrol_core::domain::value_objects::{CapacityUnit, Location, TankCapacity};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Invalid tank id '{0}'")]
    TankId(String),

    #[error("Invalid sensor id '{0}'")]
    SensorId(String),

    #[error("Unknown capacity unit '{0}'. Expected L, mL or gal")]
    CapacityUnit(String),

    #[error("Invalid timestamp '{0}'. Expected RFC 3339, e.g. 2026-11-01T08:00:00Z")]
    Timestamp(String),
}

pub fn parse_tank_id(s: &str) -> Result<TankId, InputError> {
    TankId::from_string(s.trim()).map_err(|_| InputError::TankId(s.to_string()))
}

pub fn parse_sensor_id(s: &str) -> Result<SensorId, InputError> {
    SensorId::from_string(s.trim()).map_err(|_| InputError::SensorId(s.to_string()))
}

pub fn parse_unit(s: &str) -> Result<CapacityUnit, InputError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "l" | "liter" | "liters" | "litre" | "litres" => Ok(CapacityUnit::Liters),
        "ml" | "milliliter" | "milliliters" => Ok(CapacityUnit::Milliliters),
        "gal" | "gallon" | "gallons" => Ok(CapacityUnit::Gallons),
        _ => Err(InputError::CapacityUnit(s.to_string())),
    }
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, InputError> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| InputError::Timestamp(s.to_string()))
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    /// Tank name
    #[arg(long)]
    pub name: String,

    /// Capacity value
    #[arg(long)]
    pub capacity: Decimal,

    /// Capacity unit (L, mL, gal)
    #[arg(long, default_value = "L", value_parser = parse_unit)]
    pub unit: CapacityUnit,

    #[arg(long)]
    pub building: String,

    #[arg(long)]
    pub room: String,

    #[arg(long)]
    pub zone: Option<String>,

    /// freshwater, saltwater, brackish, breeding, quarantine or nursery
    #[arg(long = "type", default_value = "freshwater")]
    pub tank_type: TankType,
}

#[derive(Args, Debug, Clone)]
pub struct SensorArgs {
    /// e.g. temperature, ph, dissolved_oxygen
    #[arg(long = "type")]
    pub sensor_type: SensorType,

    #[arg(long)]
    pub model: String,

    #[arg(long)]
    pub manufacturer: String,

    #[arg(long)]
    pub serial: String,

    /// Accuracy in percent
    #[arg(long, default_value_t = 95.0)]
    pub accuracy: f64,

    #[arg(long)]
    pub min: f64,

    #[arg(long)]
    pub max: f64,
}

impl SensorArgs {
    fn into_spec(self) -> SensorSpec {
        SensorSpec {
            sensor_type: self.sensor_type,
            model: self.model,
            manufacturer: self.manufacturer,
            serial_number: self.serial,
            accuracy: self.accuracy,
            min_value: self.min,
            max_value: self.max,
        }
    }
}

#[derive(Subcommand)]
pub enum TankCommand {
    /// Create a new tank
    Create(CreateArgs),

    /// Show a tank's current state
    Show {
        #[arg(value_parser = parse_tank_id)]
        tank_id: TankId,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List all tanks
    List {
        #[arg(long)]
        json: bool,
    },

    /// Find tanks by name fragment (case-insensitive)
    Search { fragment: String },

    /// Print a tank's event history
    History {
        #[arg(value_parser = parse_tank_id)]
        tank_id: TankId,
    },

    Rename {
        #[arg(value_parser = parse_tank_id)]
        tank_id: TankId,
        name: String,
    },

    /// Activate a tank (requires an active sensor)
    Activate {
        #[arg(value_parser = parse_tank_id)]
        tank_id: TankId,
    },

    Deactivate {
        #[arg(value_parser = parse_tank_id)]
        tank_id: TankId,
    },

    /// Install a sensor on a tank
    AddSensor {
        #[arg(value_parser = parse_tank_id)]
        tank_id: TankId,

        #[command(flatten)]
        sensor: SensorArgs,
    },

    RemoveSensor {
        #[arg(value_parser = parse_tank_id)]
        tank_id: TankId,
        #[arg(value_parser = parse_sensor_id)]
        sensor_id: SensorId,
    },

    /// Record a calibration performed now
    Calibrate {
        #[arg(value_parser = parse_tank_id)]
        tank_id: TankId,
        #[arg(value_parser = parse_sensor_id)]
        sensor_id: SensorId,
    },

    /// Change a sensor's operational status
    SensorStatus {
        #[arg(value_parser = parse_tank_id)]
        tank_id: TankId,
        #[arg(value_parser = parse_sensor_id)]
        sensor_id: SensorId,
        /// online, offline, calibrating, error or maintenance
        status: SensorStatus,
    },

    /// Schedule the next maintenance visit
    ScheduleMaintenance {
        #[arg(value_parser = parse_tank_id)]
        tank_id: TankId,
        #[arg(value_parser = parse_timestamp)]
        date: DateTime<Utc>,
    },

    /// Record maintenance performed now
    CompleteMaintenance {
        #[arg(value_parser = parse_tank_id)]
        tank_id: TankId,
        /// Next visit
        #[arg(long, value_parser = parse_timestamp)]
        next: Option<DateTime<Utc>>,
    },

    /// Rebuild the read model from the event store
    Rebuild,
}

pub async fn handle_command(command: TankCommand, config_override: Option<PathBuf>) -> Result<()> {
    let platform = super::connect(config_override).await?;
    if platform.database.is_none() {
        warn!("In-memory backend: tanks are discarded when this command exits");
    }
    run(&platform.service, command).await
}

/// Executes `command` against `service`.
pub async fn run(service: &TankCommandService, command: TankCommand) -> Result<()> {
    match command {
        TankCommand::Create(args) => {
            let capacity = TankCapacity::new(args.capacity, args.unit)?;
            let mut location = Location::new(args.building, args.room)?;
            if let Some(zone) = args.zone {
                location = location.with_zone(zone)?;
            }
            let outcome = service.create_tank(args.name, capacity, location, args.tank_type).await?;
            println!("{}", format!("✓ Tank created: {}", outcome.tank.id()).green());
            print_warnings(&outcome);
        }
        TankCommand::Show { tank_id, json } => {
            let tank = service.get(tank_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tank)?);
            } else {
                print_tank(&tank);
            }
        }
        TankCommand::List { json } => {
            let tanks = service.list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tanks)?);
            } else {
                print_projections(&tanks);
            }
        }
        TankCommand::Search { fragment } => print_projections(&service.search(&fragment).await?),
        TankCommand::History { tank_id } => print_history(&service.history(tank_id).await?),
        TankCommand::Rename { tank_id, name } => {
            report(service.execute(tank_id, |tank| tank.rename(name.clone())).await?);
        }
        TankCommand::Activate { tank_id } => report(service.execute(tank_id, Tank::activate).await?),
        TankCommand::Deactivate { tank_id } => report(service.execute(tank_id, Tank::deactivate).await?),
        TankCommand::AddSensor { tank_id, sensor } => {
            let sensor = Sensor::new(sensor.into_spec(), Utc::now())?;
            println!("Sensor id: {}", sensor.id());
            report(service.execute(tank_id, |tank| tank.add_sensor(sensor.clone())).await?);
        }
        TankCommand::RemoveSensor { tank_id, sensor_id } => {
            report(service.execute(tank_id, |tank| tank.remove_sensor(sensor_id)).await?);
        }
        TankCommand::Calibrate { tank_id, sensor_id } => {
            report(service.execute(tank_id, |tank| tank.calibrate_sensor(sensor_id)).await?);
        }
        TankCommand::SensorStatus {
            tank_id,
            sensor_id,
            status,
        } => {
            report(
                service
                    .execute(tank_id, |tank| tank.change_sensor_status(sensor_id, status))
                    .await?,
            );
        }
        TankCommand::ScheduleMaintenance { tank_id, date } => {
            report(service.execute(tank_id, |tank| tank.schedule_maintenance(date)).await?);
        }
        TankCommand::CompleteMaintenance { tank_id, next } => {
            report(service.execute(tank_id, |tank| tank.complete_maintenance(next)).await?);
        }
        TankCommand::Rebuild => {
            let rebuilt = service.rebuild_read_model().await?;
            println!("{}", format!("✓ Rebuilt {rebuilt} projection(s)").green());
        }
    }
    Ok(())
}

fn report(outcome: CommandOutcome) {
    if outcome.report.committed_events == 0 {
        println!("{}", "No change".dimmed());
    } else {
        println!(
            "{}",
            format!(
                "✓ {} event(s) committed, tank now at version {}",
                outcome.report.committed_events,
                outcome.tank.version()
            )
            .green()
        );
    }
    if outcome.attempts > 1 {
        println!("  {}", format!("(after {} attempts)", outcome.attempts).dimmed());
    }
    print_warnings(&outcome);
}

fn print_warnings(outcome: &CommandOutcome) {
    for warning in &outcome.report.warnings {
        let line = match warning {
            CommitWarning::SecondaryWrite { error, .. } => format!("⚠ Read model not updated: {error}"),
            CommitWarning::Publish {
                version,
                event_type,
                error,
                ..
            } => format!("⚠ {event_type} v{version} not published: {error}"),
        };
        println!("{}", line.yellow());
    }
}

pub fn print_tank(tank: &Tank) {
    println!("{}", tank.name().bold());
    println!("  ID: {}", tank.id());
    println!("  Type: {}", tank.tank_type());
    println!("  Status: {}", status_label(tank.is_active()));
    println!("  Capacity: {} {}", tank.capacity().value(), tank.capacity().unit().symbol());
    let location = tank.location();
    match location.zone() {
        Some(zone) => println!("  Location: {} / {} / {}", location.building(), location.room(), zone),
        None => println!("  Location: {} / {}", location.building(), location.room()),
    }
    if let Some(next) = tank.next_maintenance_date() {
        println!("  Next maintenance: {}", next.format("%Y-%m-%d %H:%M UTC"));
    }
    println!("  Version: {}", tank.version());
    println!();

    println!("{}", format!("Sensors ({}):", tank.sensors().len()).bold());
    let now = Utc::now();
    for sensor in tank.sensors() {
        let due = if sensor.is_calibration_due(now) {
            " calibration due".red().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} {} [{:?}] {}..{} {}{}",
            sensor.id(),
            sensor.sensor_type(),
            sensor.status(),
            sensor.min_value(),
            sensor.max_value(),
            sensor.sensor_type().unit_of_measurement(),
            due
        );
    }
}

fn status_label(active: bool) -> colored::ColoredString {
    if active {
        "active".green()
    } else {
        "inactive".dimmed()
    }
}

pub fn print_projections(tanks: &[TankProjection]) {
    if tanks.is_empty() {
        println!("{}", "No tanks found".dimmed());
        return;
    }
    println!(
        "{:<36}  {:<24}  {:<11}  {:<8}  {:>12}  {:>7}",
        "ID".bold(),
        "NAME".bold(),
        "TYPE".bold(),
        "STATUS".bold(),
        "LITERS".bold(),
        "SENSORS".bold()
    );
    for tank in tanks {
        println!(
            "{:<36}  {:<24}  {:<11}  {:<8}  {:>12}  {:>3}/{:<3}",
            tank.tank_id,
            tank.name,
            tank.tank_type.to_string(),
            tank.status.to_string(),
            tank.capacity_liters.round_dp(2),
            tank.active_sensor_count,
            tank.sensor_count
        );
    }
}

pub fn print_history(events: &[RecordedEvent]) {
    for recorded in events {
        println!(
            "{:>5}  {}  {}",
            recorded.version,
            recorded.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            recorded.event.event_type().cyan()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquacontrol_core::application::EventSourcedTankRepository;
    use aquacontrol_core::infrastructure::repositories::{InMemoryEventStore, InMemoryTankReadModel};
    use clap::Parser;
    use std::sync::Arc;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: TankCommand,
    }

    fn service() -> TankCommandService {
        TankCommandService::new(EventSourcedTankRepository::new(Arc::new(InMemoryEventStore::new())))
            .with_read_model(Arc::new(InMemoryTankReadModel::new()))
    }

    #[test]
    fn test_parse_unit_aliases() {
        assert_eq!(parse_unit("gal").unwrap(), CapacityUnit::Gallons);
        assert_eq!(parse_unit("Liters").unwrap(), CapacityUnit::Liters);
        assert!(parse_unit("barrels").is_err());
    }

    #[test]
    fn test_parse_timestamp_requires_rfc3339() {
        assert!(parse_timestamp("2026-11-01T08:00:00Z").is_ok());
        assert!(parse_timestamp("next tuesday").is_err());
    }

    #[test]
    fn test_create_arguments_parse() {
        let cli = TestCli::try_parse_from([
            "aquactl", "create", "--name", "Smolt 1", "--capacity", "1500.5", "--building", "Hatchery", "--room",
            "R2", "--type", "marine",
        ])
        .unwrap();
        let TankCommand::Create(args) = cli.command else {
            panic!("expected create");
        };
        assert_eq!(args.tank_type, TankType::Saltwater);
        assert_eq!(args.unit, CapacityUnit::Liters);
        assert_eq!(args.capacity, Decimal::new(15005, 1));
    }

    #[test]
    fn test_invalid_tank_id_is_rejected() {
        assert!(TestCli::try_parse_from(["aquactl", "show", "not-a-uuid"]).is_err());
    }

    #[tokio::test]
    async fn test_create_then_add_sensor_and_activate() {
        let service = service();
        let args = CreateArgs {
            name: "Grow-out 4".to_string(),
            capacity: Decimal::from(3000),
            unit: CapacityUnit::Liters,
            building: "Barn".to_string(),
            room: "East".to_string(),
            zone: None,
            tank_type: TankType::Freshwater,
        };
        run(&service, TankCommand::Create(args)).await.unwrap();
        let tank_id = service.list().await.unwrap()[0].tank_id;

        let sensor = SensorArgs {
            sensor_type: SensorType::DissolvedOxygen,
            model: "DO-9".to_string(),
            manufacturer: "AquaSense".to_string(),
            serial: "DO-0001".to_string(),
            accuracy: 98.0,
            min: 0.0,
            max: 20.0,
        };
        run(&service, TankCommand::AddSensor { tank_id, sensor }).await.unwrap();
        run(&service, TankCommand::Activate { tank_id }).await.unwrap();

        let tank = service.get(tank_id).await.unwrap();
        assert!(tank.is_active());
        assert_eq!(tank.version(), 3);
    }

    #[tokio::test]
    async fn test_oversized_capacity_is_rejected_before_commit() {
        let service = service();
        let args = CreateArgs {
            name: "Ocean".to_string(),
            capacity: Decimal::MAX,
            unit: CapacityUnit::Gallons,
            building: "Coast".to_string(),
            room: "Bay".to_string(),
            zone: None,
            tank_type: TankType::Saltwater,
        };
        let err = run(&service, TankCommand::Create(args)).await.unwrap_err();
        assert!(err.to_string().contains("exceeds the maximum"));
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_tank_surfaces() {
        let service = service();
        let err = run(&service, TankCommand::Activate { tank_id: TankId::new() }).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
