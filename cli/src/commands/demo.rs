// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0

//! Scripted walkthrough against the in-memory backend
//!
//! Creates a tank, fits sensors, activates it and runs enough commands to
//! cross the snapshot threshold, echoing every event the bus delivers.

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Args;
use colored::Colorize;

use aquacontrol_core::application::Platform;
use aquacontrol_core::domain::platform_config::{PlatformConfig, StorageBackendKind};
use aquacontrol_core::domain::repository::EventStore;
use aquacontrol_core::domain::sensor::{Sensor, SensorSpec, SensorStatus, SensorType};
use aquacontrol_core::domain::tank::{Tank, TankId, TankType};
use aquacontrol_core::domain::value_objects::{Location, TankCapacity};
use aquacontrol_core::infrastructure::EventBusError;

use super::tank::{print_history, print_tank};

#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Events past the last snapshot before a new one is written
    #[arg(long, default_value_t = 10)]
    pub snapshot_threshold: u64,

    /// Extra calibration rounds to run after activation
    #[arg(long, default_value_t = 6)]
    pub rounds: u32,

    /// Suppress the per-event echo
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DemoSummary {
    pub tank_id: TankId,
    pub final_version: u64,
    pub events_observed: usize,
    pub snapshot_version: Option<u64>,
}

pub async fn run(args: DemoArgs) -> Result<()> {
    let summary = run_scenario(&args).await?;
    println!();
    println!(
        "{}",
        format!(
            "✓ Demo finished: tank {} at version {}, {} event(s) delivered",
            summary.tank_id, summary.final_version, summary.events_observed
        )
        .green()
    );
    if let Some(version) = summary.snapshot_version {
        println!("  Latest snapshot at version {version}");
    }
    Ok(())
}

fn sensor(sensor_type: SensorType, serial: &str, min: f64, max: f64) -> Result<Sensor> {
    let spec = SensorSpec {
        sensor_type,
        model: "Demo Probe".to_string(),
        manufacturer: "AquaSense".to_string(),
        serial_number: serial.to_string(),
        accuracy: 97.5,
        min_value: min,
        max_value: max,
    };
    Ok(Sensor::new(spec, Utc::now())?)
}

pub async fn run_scenario(args: &DemoArgs) -> Result<DemoSummary> {
    let mut config = PlatformConfig::default();
    config.spec.storage.backend = StorageBackendKind::InMemory;
    config.spec.event_sourcing.snapshot_threshold = args.snapshot_threshold;
    config.validate()?;

    let platform = Platform::from_config(&config).await?;
    let mut receiver = platform.event_bus.subscribe();
    let service = &platform.service;

    let created = service
        .create_tank(
            "Demo Raceway",
            TankCapacity::liters(12_000)?,
            Location::new("Hatchery", "Raceway 1")?.with_zone("North")?,
            TankType::Freshwater,
        )
        .await?;
    let tank_id = created.tank.id();

    let temperature = sensor(SensorType::Temperature, "T-100", -5.0, 40.0)?;
    let oxygen = sensor(SensorType::DissolvedOxygen, "DO-200", 0.0, 20.0)?;
    let temperature_id = temperature.id();
    let oxygen_id = oxygen.id();

    service.execute(tank_id, |tank| tank.add_sensor(temperature.clone())).await?;
    service.execute(tank_id, |tank| tank.add_sensor(oxygen.clone())).await?;
    service.execute(tank_id, Tank::activate).await?;
    service
        .execute(tank_id, |tank| tank.schedule_maintenance(Utc::now() + Duration::days(14)))
        .await?;

    for round in 0..args.rounds {
        let target = if round % 2 == 0 { temperature_id } else { oxygen_id };
        service.execute(tank_id, |tank| tank.calibrate_sensor(target)).await?;
    }

    service
        .execute(tank_id, |tank| tank.change_sensor_status(oxygen_id, SensorStatus::Maintenance))
        .await?;
    service.execute(tank_id, |tank| tank.rename("Demo Raceway A")).await?;

    let mut events_observed = 0;
    loop {
        match receiver.try_recv() {
            Ok(event) => {
                events_observed += 1;
                if !args.quiet {
                    println!(
                        "{} v{} {}",
                        "event".dimmed(),
                        event.version,
                        event.event.event_type().cyan()
                    );
                }
            }
            Err(EventBusError::Empty) | Err(EventBusError::Closed) => break,
            Err(EventBusError::Lagged(missed)) => {
                println!("{}", format!("⚠ Receiver lagged, {missed} event(s) missed").yellow());
            }
        }
    }

    let tank = service.get(tank_id).await?;
    let snapshot_version = service
        .repository()
        .store()
        .read_snapshot(tank_id)
        .await?
        .map(|snapshot| snapshot.version);

    if !args.quiet {
        println!();
        print_tank(&tank);
        println!();
        println!("{}", "History:".bold());
        print_history(&service.history(tank_id).await?);
    }

    Ok(DemoSummary {
        tank_id,
        final_version: tank.version(),
        events_observed,
        snapshot_version,
    })
}
