// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0

//! PostgreSQL Tank Read Model
//!
//! Stores each [`TankProjection`] as JSONB alongside the columns it is
//! filtered and sorted by. Upserts only move a row forward in version.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::projection::TankProjection;
use crate::domain::repository::{RepositoryError, TankReadModel};
use crate::domain::tank::TankId;

pub struct PostgresTankReadModel {
    pool: PgPool,
}

impl PostgresTankReadModel {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn from_row(row: PgRow) -> Result<TankProjection, RepositoryError> {
    let projection: serde_json::Value = row.get("projection");
    Ok(serde_json::from_value(projection)?)
}

#[async_trait]
impl TankReadModel for PostgresTankReadModel {
    async fn upsert(&self, projection: &TankProjection) -> Result<(), RepositoryError> {
        let json = serde_json::to_value(projection)?;

        sqlx::query(
            r#"
            INSERT INTO tank_read_model (tank_id, name, status, projection, version, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tank_id) DO UPDATE SET
                name = EXCLUDED.name,
                status = EXCLUDED.status,
                projection = EXCLUDED.projection,
                version = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at
            WHERE tank_read_model.version <= EXCLUDED.version
            "#,
        )
        .bind(projection.tank_id.as_uuid())
        .bind(&projection.name)
        .bind(projection.status.to_string())
        .bind(json)
        .bind(projection.version as i64)
        .bind(projection.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to upsert tank projection: {}", e)))?;

        Ok(())
    }

    async fn remove(&self, tank_id: TankId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM tank_read_model WHERE tank_id = $1")
            .bind(tank_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, tank_id: TankId) -> Result<Option<TankProjection>, RepositoryError> {
        sqlx::query("SELECT projection FROM tank_read_model WHERE tank_id = $1")
            .bind(tank_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .map(from_row)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<TankProjection>, RepositoryError> {
        sqlx::query("SELECT projection FROM tank_read_model ORDER BY name, tank_id")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(from_row)
            .collect()
    }

    async fn search_by_name(&self, fragment: &str) -> Result<Vec<TankProjection>, RepositoryError> {
        let pattern = format!("%{}%", fragment.to_lowercase());
        sqlx::query(
            "SELECT projection FROM tank_read_model WHERE LOWER(name) LIKE $1 ORDER BY name, tank_id",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(from_row)
        .collect()
    }
}
