// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0

use aquacontrol_core::application::tank_repository::EventSourcedTankRepository;
use aquacontrol_core::application::tank_service::TankCommandService;
use aquacontrol_core::application::unit_of_work::{CommitWarning, UnitOfWork};
use aquacontrol_core::domain::events::{EventRecord, RecordedEvent, TankEvent};
use aquacontrol_core::domain::projection::TankProjection;
use aquacontrol_core::domain::repository::{
    EventPublisher, EventStore, PublishError, RepositoryError, Snapshot, TankReadModel,
};
use aquacontrol_core::domain::sensor::{Sensor, SensorSpec, SensorType};
use aquacontrol_core::domain::tank::{Tank, TankId, TankStatus, TankType, MAX_SENSORS};
use aquacontrol_core::domain::value_objects::{Location, TankCapacity};
use aquacontrol_core::infrastructure::event_bus::EventBus;
use aquacontrol_core::infrastructure::repositories::{InMemoryEventStore, InMemoryTankReadModel};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

fn temperature_sensor() -> Sensor {
    Sensor::new(
        SensorSpec {
            sensor_type: SensorType::Temperature,
            model: "ThermoLine T2".to_string(),
            manufacturer: "AquaSense".to_string(),
            serial_number: "AS-T2-0042".to_string(),
            accuracy: 98.0,
            min_value: -5.0,
            max_value: 45.0,
        },
        Utc::now(),
    )
    .unwrap()
}

fn tank_a() -> (Tank, Vec<TankEvent>) {
    Tank::create(
        "Tank A",
        TankCapacity::liters(1000).unwrap(),
        Location::new("Hatchery", "Room 1").unwrap(),
        TankType::Freshwater,
    )
    .unwrap()
}

/// Delegates to an in-memory store and records every `after_version` read.
struct RecordingStore {
    inner: InMemoryEventStore,
    reads: Mutex<Vec<u64>>,
}

impl RecordingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryEventStore::new(),
            reads: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EventStore for RecordingStore {
    async fn append(
        &self,
        tank_id: TankId,
        events: &[TankEvent],
        expected_version: u64,
    ) -> Result<Vec<RecordedEvent>, RepositoryError> {
        self.inner.append(tank_id, events, expected_version).await
    }

    async fn read_events(&self, tank_id: TankId, after_version: u64) -> Result<Vec<RecordedEvent>, RepositoryError> {
        self.reads.lock().push(after_version);
        self.inner.read_events(tank_id, after_version).await
    }

    async fn current_version(&self, tank_id: TankId) -> Result<u64, RepositoryError> {
        self.inner.current_version(tank_id).await
    }

    async fn stream_ids(&self) -> Result<Vec<TankId>, RepositoryError> {
        self.inner.stream_ids().await
    }

    async fn read_snapshot(&self, tank_id: TankId) -> Result<Option<Snapshot>, RepositoryError> {
        self.inner.read_snapshot(tank_id).await
    }

    async fn write_snapshot(&self, _snapshot: &Snapshot) -> Result<(), RepositoryError> {
        Err(RepositoryError::Database("snapshot table is read-only".to_string()))
    }
}

struct BrokenReadModel;

#[async_trait]
impl TankReadModel for BrokenReadModel {
    async fn upsert(&self, _projection: &TankProjection) -> Result<(), RepositoryError> {
        Err(RepositoryError::Database("connection reset".to_string()))
    }

    async fn remove(&self, _tank_id: TankId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Database("connection reset".to_string()))
    }

    async fn find_by_id(&self, _tank_id: TankId) -> Result<Option<TankProjection>, RepositoryError> {
        Ok(None)
    }

    async fn list(&self) -> Result<Vec<TankProjection>, RepositoryError> {
        Ok(Vec::new())
    }

    async fn search_by_name(&self, _fragment: &str) -> Result<Vec<TankProjection>, RepositoryError> {
        Ok(Vec::new())
    }
}

struct ClosedPublisher;

#[async_trait]
impl EventPublisher for ClosedPublisher {
    async fn publish(&self, _event: &RecordedEvent) -> Result<(), PublishError> {
        Err(PublishError::Closed)
    }
}

#[tokio::test]
async fn test_reference_scenario_with_forced_snapshot() {
    let store = Arc::new(InMemoryEventStore::new());
    let repository = EventSourcedTankRepository::new(store.clone());

    let (mut tank, mut pending) = tank_a();
    pending.extend(tank.add_sensor(temperature_sensor()).unwrap());
    repository.save(&tank, &mut pending).await.unwrap();

    let snapshot = repository.snapshot(&tank).await.unwrap();
    assert_eq!(snapshot.version, 2);

    pending.extend(tank.activate().unwrap());
    repository.save(&tank, &mut pending).await.unwrap();
    assert_eq!(tank.status(), TankStatus::Active);
    assert_eq!(tank.version(), 3);

    let loaded = repository.load(tank.id()).await.unwrap().unwrap();
    assert_eq!(loaded, tank);
    assert_eq!(store.read_events(tank.id(), 2).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_snapshot_load_replays_only_the_tail() {
    let store = Arc::new(RecordingStore::new());
    let repository = EventSourcedTankRepository::new(store.clone());

    let (mut tank, mut pending) = tank_a();
    pending.extend(tank.add_sensor(temperature_sensor()).unwrap());
    repository.save(&tank, &mut pending).await.unwrap();

    // Seed the snapshot directly since this store refuses snapshot writes.
    store
        .inner
        .write_snapshot(&Snapshot {
            tank_id: tank.id(),
            version: tank.version(),
            state: serde_json::to_value(&tank).unwrap(),
            taken_at: Utc::now(),
        })
        .await
        .unwrap();

    pending.extend(tank.activate().unwrap());
    repository.save(&tank, &mut pending).await.unwrap();

    let loaded = repository.load(tank.id()).await.unwrap().unwrap();
    assert_eq!(loaded, tank);
    assert_eq!(*store.reads.lock(), vec![2]);
}

#[tokio::test]
async fn test_snapshot_write_failure_does_not_fail_load() {
    let store = Arc::new(RecordingStore::new());
    let repository = EventSourcedTankRepository::with_snapshot_threshold(store.clone(), 2);

    let (mut tank, mut pending) = tank_a();
    pending.extend(tank.rename("Tank B").unwrap());
    pending.extend(tank.rename("Tank C").unwrap());
    repository.save(&tank, &mut pending).await.unwrap();

    let loaded = repository.load(tank.id()).await.unwrap().unwrap();
    assert_eq!(loaded.name(), "Tank C");
    assert!(store.read_snapshot(tank.id()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sensor_cap_survives_persistence() {
    let repository = EventSourcedTankRepository::new(Arc::new(InMemoryEventStore::new()));
    let (mut tank, mut pending) = tank_a();
    for _ in 0..MAX_SENSORS {
        pending.extend(tank.add_sensor(temperature_sensor()).unwrap());
    }
    repository.save(&tank, &mut pending).await.unwrap();

    let mut loaded = repository.load(tank.id()).await.unwrap().unwrap();
    assert_eq!(loaded.sensors().len(), 10);
    let err = loaded.add_sensor(temperature_sensor()).unwrap_err();
    assert!(err.is_invariant_violation());
    assert_eq!(loaded.version(), 11);
}

#[tokio::test]
async fn test_remove_last_active_sensor_requires_deactivation() {
    let repository = EventSourcedTankRepository::new(Arc::new(InMemoryEventStore::new()));
    let (mut tank, mut pending) = tank_a();
    let sensor = temperature_sensor();
    let sensor_id = sensor.id();
    pending.extend(tank.add_sensor(sensor).unwrap());
    pending.extend(tank.activate().unwrap());
    repository.save(&tank, &mut pending).await.unwrap();

    let mut loaded = repository.load(tank.id()).await.unwrap().unwrap();
    assert!(loaded.remove_sensor(sensor_id).unwrap_err().is_invariant_violation());

    pending.extend(loaded.deactivate().unwrap());
    pending.extend(loaded.remove_sensor(sensor_id).unwrap());
    repository.save(&loaded, &mut pending).await.unwrap();

    let reloaded = repository.load(tank.id()).await.unwrap().unwrap();
    assert!(reloaded.sensors().is_empty());
    assert_eq!(reloaded.status(), TankStatus::Inactive);
}

#[tokio::test]
async fn test_redelivered_sensor_event_is_idempotent_on_replay() {
    let store = Arc::new(InMemoryEventStore::new());
    let repository = EventSourcedTankRepository::new(store.clone());
    let (mut tank, mut pending) = tank_a();
    pending.extend(tank.add_sensor(temperature_sensor()).unwrap());
    let duplicate = pending[1].clone();
    repository.save(&tank, &mut pending).await.unwrap();

    store
        .append_records(tank.id(), vec![EventRecord::encode(&duplicate).unwrap()], 2)
        .unwrap();

    let loaded = repository.load(tank.id()).await.unwrap().unwrap();
    assert_eq!(loaded.sensors(), tank.sensors());
    assert_eq!(loaded.version(), 3);
}

#[tokio::test]
async fn test_event_from_newer_producer_is_skipped() {
    let store = Arc::new(InMemoryEventStore::new());
    let repository = EventSourcedTankRepository::new(store.clone());
    let (mut tank, mut pending) = tank_a();
    repository.save(&tank, &mut pending).await.unwrap();

    store
        .append_records(
            tank.id(),
            vec![EventRecord {
                event_type: "TankWaterChanged".to_string(),
                payload: json!({"tank_id": tank.id().to_string(), "percent": 30}),
            }],
            1,
        )
        .unwrap();

    let mut loaded = repository.load(tank.id()).await.unwrap().unwrap();
    assert_eq!(loaded.version(), 2);
    assert_eq!(loaded.name(), "Tank A");

    // The skipped event still occupies its slot, so the next save lines up.
    pending.extend(loaded.rename("Tank A2").unwrap());
    repository.save(&loaded, &mut pending).await.unwrap();
    tank = repository.load(tank.id()).await.unwrap().unwrap();
    assert_eq!(tank.version(), 3);
}

#[tokio::test]
async fn test_foreign_event_in_stream_is_fatal() {
    let store = Arc::new(InMemoryEventStore::new());
    let repository = EventSourcedTankRepository::new(store.clone());
    let (tank, mut pending) = tank_a();
    repository.save(&tank, &mut pending).await.unwrap();

    let stray = TankEvent::TankActivated {
        tank_id: TankId::new(),
        occurred_at: Utc::now(),
    };
    store
        .append_records(tank.id(), vec![EventRecord::encode(&stray).unwrap()], 1)
        .unwrap();

    let err = repository.load(tank.id()).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Reconstruction(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_writers_single_winner() {
    let store = Arc::new(InMemoryEventStore::new());
    let repository = EventSourcedTankRepository::new(store.clone());
    let (tank, mut pending) = tank_a();
    repository.save(&tank, &mut pending).await.unwrap();

    let mut copies = Vec::new();
    for _ in 0..8 {
        copies.push(repository.load(tank.id()).await.unwrap().unwrap());
    }

    let mut handles = Vec::new();
    for (i, mut copy) in copies.into_iter().enumerate() {
        let repository = repository.clone();
        handles.push(tokio::spawn(async move {
            let mut events = copy.rename(format!("Writer {i}")).unwrap();
            repository.save(&copy, &mut events).await
        }));
    }

    let mut winners = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(e) if e.is_concurrency() => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(winners, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(store.current_version(tank.id()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_service_retries_lost_race() {
    let store = Arc::new(InMemoryEventStore::new());
    let service = TankCommandService::new(EventSourcedTankRepository::new(store.clone()));
    let tank_id = service
        .create_tank(
            "Tank A",
            TankCapacity::liters(1000).unwrap(),
            Location::new("Hatchery", "Room 1").unwrap(),
            TankType::Freshwater,
        )
        .await
        .unwrap()
        .tank
        .id();

    let first = temperature_sensor();
    let second = temperature_sensor();
    let (a, b) = tokio::join!(
        service.execute(tank_id, |tank| tank.add_sensor(first.clone())),
        service.execute(tank_id, |tank| tank.add_sensor(second.clone())),
    );
    a.unwrap();
    b.unwrap();

    let tank = service.get(tank_id).await.unwrap();
    assert_eq!(tank.sensors().len(), 2);
    assert_eq!(tank.version(), 3);
}

#[tokio::test]
async fn test_secondary_failures_are_warnings() {
    let store = Arc::new(InMemoryEventStore::new());
    let repository = EventSourcedTankRepository::new(store.clone());
    let mut uow = UnitOfWork::new(repository.clone())
        .with_read_model(Arc::new(BrokenReadModel))
        .with_publisher(Arc::new(ClosedPublisher));

    let (mut tank, mut events) = tank_a();
    events.extend(tank.add_sensor(temperature_sensor()).unwrap());
    uow.register(&tank, events);

    let report = uow.commit().await.unwrap();
    assert_eq!(report.committed_events, 2);
    let secondary = report
        .warnings
        .iter()
        .filter(|w| matches!(w, CommitWarning::SecondaryWrite { .. }))
        .count();
    let publish = report
        .warnings
        .iter()
        .filter(|w| matches!(w, CommitWarning::Publish { .. }))
        .count();
    assert_eq!(secondary, 1);
    assert_eq!(publish, 2);

    assert_eq!(repository.load(tank.id()).await.unwrap().unwrap(), tank);
}

#[tokio::test]
async fn test_subscriber_sees_committed_events_in_order() {
    let bus = EventBus::new(32);
    let service = TankCommandService::new(EventSourcedTankRepository::new(Arc::new(InMemoryEventStore::new())))
        .with_read_model(Arc::new(InMemoryTankReadModel::new()))
        .with_publisher(Arc::new(bus.clone()));

    let outcome = service
        .create_tank(
            "Tank A",
            TankCapacity::liters(1000).unwrap(),
            Location::new("Hatchery", "Room 1").unwrap(),
            TankType::Freshwater,
        )
        .await
        .unwrap();
    let tank_id = outcome.tank.id();
    let mut receiver = bus.subscribe_tank(tank_id);

    let sensor = temperature_sensor();
    service.execute(tank_id, |tank| tank.add_sensor(sensor.clone())).await.unwrap();
    service.execute(tank_id, Tank::activate).await.unwrap();

    let added = receiver.recv().await.unwrap();
    let activated = receiver.recv().await.unwrap();
    assert_eq!((added.version, activated.version), (2, 3));
    assert_eq!(activated.event.event_type(), "TankActivated");
}
