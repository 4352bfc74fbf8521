// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0

//! Property-Based Tests for Tank Replay
//!
//! Random command sequences are run against a fresh tank. Failing commands
//! are simply dropped, as a caller would drop them.
//!
//! # Test Properties
//!
//! 1. **Persistence Roundtrip**: load(save(commands)) == in-memory state
//! 2. **Snapshot Equivalence**: snapshot at any version + tail == full replay

use std::sync::Arc;

use aquacontrol_core::application::tank_repository::EventSourcedTankRepository;
use aquacontrol_core::domain::events::TankEvent;
use aquacontrol_core::domain::sensor::{Sensor, SensorId, SensorSpec, SensorStatus, SensorType};
use aquacontrol_core::domain::tank::{Tank, TankType};
use aquacontrol_core::domain::value_objects::{Location, TankCapacity};
use aquacontrol_core::infrastructure::repositories::InMemoryEventStore;
use chrono::{Duration, Utc};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Command {
    AddSensor(usize),
    RemoveSensor(usize),
    Activate,
    Deactivate,
    Rename(String),
    ChangeCapacity(u32),
    Calibrate(usize),
    ActivateSensor(usize),
    DeactivateSensor(usize),
    UpdateRange(usize, f64, f64),
    ChangeStatus(usize, usize),
    ScheduleMaintenance(i64),
    CompleteMaintenance,
}

const STATUSES: [SensorStatus; 5] = [
    SensorStatus::Online,
    SensorStatus::Offline,
    SensorStatus::Calibrating,
    SensorStatus::Error,
    SensorStatus::Maintenance,
];

// =============================================================================
// Strategies
// =============================================================================

fn command_strategy() -> impl Strategy<Value = Command> {
    prop_oneof![
        3 => (0usize..SensorType::ALL.len()).prop_map(Command::AddSensor),
        1 => any::<usize>().prop_map(Command::RemoveSensor),
        2 => Just(Command::Activate),
        1 => Just(Command::Deactivate),
        1 => "[A-Za-z][A-Za-z0-9 ]{0,20}".prop_map(Command::Rename),
        1 => (1u32..50_000).prop_map(Command::ChangeCapacity),
        1 => any::<usize>().prop_map(Command::Calibrate),
        1 => any::<usize>().prop_map(Command::ActivateSensor),
        1 => any::<usize>().prop_map(Command::DeactivateSensor),
        1 => (any::<usize>(), -100.0f64..100.0, 0.001f64..250.0)
            .prop_map(|(i, min, width)| Command::UpdateRange(i, min, min + width)),
        1 => (any::<usize>(), 0usize..STATUSES.len()).prop_map(|(i, s)| Command::ChangeStatus(i, s)),
        1 => (1i64..365).prop_map(Command::ScheduleMaintenance),
        1 => Just(Command::CompleteMaintenance),
    ]
}

fn sensor_spec(sensor_type: SensorType) -> SensorSpec {
    SensorSpec {
        sensor_type,
        model: "Probe".to_string(),
        manufacturer: "AquaSense".to_string(),
        serial_number: "P-1".to_string(),
        accuracy: 95.5,
        min_value: 0.0,
        max_value: 100.0,
    }
}

fn pick(tank: &Tank, i: usize) -> Option<SensorId> {
    let sensors = tank.sensors();
    (!sensors.is_empty()).then(|| sensors[i % sensors.len()].id())
}

/// Applies `command`, returning its events or nothing when it was rejected.
fn run(tank: &mut Tank, command: &Command) -> Vec<TankEvent> {
    let result = match command {
        Command::AddSensor(t) => Sensor::new(sensor_spec(SensorType::ALL[*t]), Utc::now())
            .and_then(|sensor| tank.add_sensor(sensor)),
        Command::RemoveSensor(i) => match pick(tank, *i) {
            Some(id) => tank.remove_sensor(id),
            None => return vec![],
        },
        Command::Activate => tank.activate(),
        Command::Deactivate => tank.deactivate(),
        Command::Rename(name) => tank.rename(name.clone()),
        Command::ChangeCapacity(liters) => TankCapacity::liters(*liters).and_then(|c| tank.change_capacity(c)),
        Command::Calibrate(i) => match pick(tank, *i) {
            Some(id) => tank.calibrate_sensor(id),
            None => return vec![],
        },
        Command::ActivateSensor(i) => match pick(tank, *i) {
            Some(id) => tank.activate_sensor(id),
            None => return vec![],
        },
        Command::DeactivateSensor(i) => match pick(tank, *i) {
            Some(id) => tank.deactivate_sensor(id),
            None => return vec![],
        },
        Command::UpdateRange(i, min, max) => match pick(tank, *i) {
            Some(id) => tank.update_sensor_range(id, *min, *max),
            None => return vec![],
        },
        Command::ChangeStatus(i, s) => match pick(tank, *i) {
            Some(id) => tank.change_sensor_status(id, STATUSES[*s]),
            None => return vec![],
        },
        Command::ScheduleMaintenance(days) => tank.schedule_maintenance(Utc::now() + Duration::days(*days)),
        Command::CompleteMaintenance => tank.complete_maintenance(None),
    };
    result.unwrap_or_default()
}

fn execute_all(commands: &[Command]) -> (Tank, Vec<TankEvent>) {
    let (mut tank, mut history) = Tank::create(
        "Property Tank",
        TankCapacity::liters(750).unwrap(),
        Location::new("Research", "R-7").unwrap(),
        TankType::Brackish,
    )
    .unwrap();

    for command in commands {
        let before = tank.clone();
        let events = run(&mut tank, command);
        if events.is_empty() {
            assert_eq!(tank, before, "rejected or no-op command mutated state: {command:?}");
        }
        history.extend(events);
    }
    (tank, history)
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: persisting the events and loading them reproduces the
    /// command-path state field for field.
    #[test]
    fn prop_load_matches_command_path(commands in prop::collection::vec(command_strategy(), 0..40)) {
        let (tank, mut history) = execute_all(&commands);
        prop_assert_eq!(tank.version(), history.len() as u64);

        let loaded = tokio_test::block_on(async {
            let repository = EventSourcedTankRepository::with_snapshot_threshold(
                Arc::new(InMemoryEventStore::new()),
                u64::MAX,
            );
            repository.save(&tank, &mut history).await.unwrap();
            repository.load(tank.id()).await.unwrap()
        });
        prop_assert_eq!(loaded, Some(tank));
    }

    /// Property: seeding from a snapshot at any version and replaying the tail
    /// equals a full replay.
    #[test]
    fn prop_snapshot_plus_tail_equals_full_replay(
        commands in prop::collection::vec(command_strategy(), 1..40),
        split in any::<prop::sample::Index>(),
    ) {
        let (tank, mut history) = execute_all(&commands);
        let cut = split.index(history.len()) + 1;

        let mut prefix = Tank::from_creation_event(&history[0]).unwrap();
        prefix
            .replay(history[1..cut].iter().enumerate().map(|(i, e)| (i as u64 + 2, e)))
            .unwrap();
        prop_assert_eq!(prefix.version(), cut as u64);

        let (full, from_snapshot) = tokio_test::block_on(async {
            let full_repo = EventSourcedTankRepository::with_snapshot_threshold(
                Arc::new(InMemoryEventStore::new()),
                u64::MAX,
            );
            let mut copy = history.clone();
            full_repo.save(&tank, &mut copy).await.unwrap();

            let snap_repo = EventSourcedTankRepository::with_snapshot_threshold(
                Arc::new(InMemoryEventStore::new()),
                u64::MAX,
            );
            snap_repo.save(&tank, &mut history).await.unwrap();
            snap_repo.snapshot(&prefix).await.unwrap();

            (
                full_repo.load(tank.id()).await.unwrap(),
                snap_repo.load(tank.id()).await.unwrap(),
            )
        });
        prop_assert_eq!(&full, &Some(tank));
        prop_assert_eq!(from_snapshot, full);
    }
}
