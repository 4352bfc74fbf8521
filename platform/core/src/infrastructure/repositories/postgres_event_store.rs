// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0

//! PostgreSQL Event Store
//!
//! # Schema
//!
//! - `tank_events (tank_id, version)` primary key enforces one event per stream
//!   position. A racing writer that passed the version pre-check still loses
//!   on the insert, and the unique violation is reported as a concurrency
//!   conflict.
//! - `tank_snapshots` keeps one row per tank, upserted only forwards.
//!
//! # Usage
//!
//! ```no_run
//! use sqlx::PgPool;
//! use aquacontrol_core::infrastructure::repositories::PostgresEventStore;
//!
//! # async fn run(database_url: &str) -> anyhow::Result<()> {
//! let pool = PgPool::connect(database_url).await?;
//! let store = PostgresEventStore::new(pool);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;

use super::decode_record;
use crate::domain::events::{EventRecord, RecordedEvent, TankEvent};
use crate::domain::repository::{EventStore, RepositoryError, Snapshot};
use crate::domain::tank::TankId;

pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn stream_version<'e, E>(executor: E, tank_id: TankId) -> Result<u64, RepositoryError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let version: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) FROM tank_events WHERE tank_id = $1",
        )
        .bind(tank_id.as_uuid())
        .fetch_one(executor)
        .await?;
        Ok(version as u64)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(
        &self,
        tank_id: TankId,
        events: &[TankEvent],
        expected_version: u64,
    ) -> Result<Vec<RecordedEvent>, RepositoryError> {
        let records = events
            .iter()
            .map(EventRecord::encode)
            .collect::<Result<Vec<_>, _>>()?;

        let mut tx = self.pool.begin().await?;

        let actual = Self::stream_version(&mut *tx, tank_id).await?;
        if actual != expected_version {
            return Err(RepositoryError::Concurrency {
                tank_id,
                expected: expected_version,
                actual,
            });
        }

        let mut recorded = Vec::with_capacity(events.len());
        for (offset, (record, event)) in records.into_iter().zip(events).enumerate() {
            let version = expected_version + offset as u64 + 1;
            let recorded_at: DateTime<Utc> = sqlx::query_scalar(
                r#"
                INSERT INTO tank_events (tank_id, version, event_type, payload)
                VALUES ($1, $2, $3, $4)
                RETURNING recorded_at
                "#,
            )
            .bind(tank_id.as_uuid())
            .bind(version as i64)
            .bind(&record.event_type)
            .bind(&record.payload)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RepositoryError::Concurrency {
                        tank_id,
                        expected: expected_version,
                        actual: version,
                    }
                } else {
                    RepositoryError::Database(format!("Failed to append tank event: {}", e))
                }
            })?;

            recorded.push(RecordedEvent {
                tank_id,
                version,
                event: event.clone(),
                recorded_at,
            });
        }

        tx.commit().await?;
        Ok(recorded)
    }

    async fn read_events(
        &self,
        tank_id: TankId,
        after_version: u64,
    ) -> Result<Vec<RecordedEvent>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT version, event_type, payload, recorded_at
            FROM tank_events
            WHERE tank_id = $1 AND version > $2
            ORDER BY version ASC
            "#,
        )
        .bind(tank_id.as_uuid())
        .bind(after_version as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let version: i64 = row.get("version");
                let record = EventRecord {
                    event_type: row.get("event_type"),
                    payload: row.get("payload"),
                };
                decode_record(tank_id, version as u64, &record, row.get("recorded_at"))
            })
            .collect()
    }

    async fn current_version(&self, tank_id: TankId) -> Result<u64, RepositoryError> {
        Self::stream_version(&self.pool, tank_id).await
    }

    async fn stream_ids(&self) -> Result<Vec<TankId>, RepositoryError> {
        let ids: Vec<uuid::Uuid> =
            sqlx::query_scalar("SELECT DISTINCT tank_id FROM tank_events ORDER BY tank_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().map(TankId::from_uuid).collect())
    }

    async fn read_snapshot(&self, tank_id: TankId) -> Result<Option<Snapshot>, RepositoryError> {
        let row = sqlx::query(
            "SELECT version, state, taken_at FROM tank_snapshots WHERE tank_id = $1",
        )
        .bind(tank_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let version: i64 = row.get("version");
            Snapshot {
                tank_id,
                version: version as u64,
                state: row.get("state"),
                taken_at: row.get("taken_at"),
            }
        }))
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO tank_snapshots (tank_id, version, state, taken_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tank_id) DO UPDATE SET
                version = EXCLUDED.version,
                state = EXCLUDED.state,
                taken_at = EXCLUDED.taken_at
            WHERE tank_snapshots.version <= EXCLUDED.version
            "#,
        )
        .bind(snapshot.tank_id.as_uuid())
        .bind(snapshot.version as i64)
        .bind(&snapshot.state)
        .bind(snapshot.taken_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to write snapshot: {}", e)))?;

        Ok(())
    }
}
