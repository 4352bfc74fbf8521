// Copyright (c) 2026 AquaControl Platform Team
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Pool
//!
//! Wraps `sqlx::postgres::PgPool` in a thin `Database` newtype that is
//! injected into the PostgreSQL event store and read model.
//!
//! `migrate` creates the schema idempotently, so it is safe to run on every
//! startup.

use anyhow::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tank_events (
        tank_id      UUID        NOT NULL,
        version      BIGINT      NOT NULL,
        event_type   TEXT        NOT NULL,
        payload      JSONB       NOT NULL,
        recorded_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (tank_id, version)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tank_snapshots (
        tank_id   UUID        PRIMARY KEY,
        version   BIGINT      NOT NULL,
        state     JSONB       NOT NULL,
        taken_at  TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tank_read_model (
        tank_id     UUID        PRIMARY KEY,
        name        TEXT        NOT NULL,
        status      TEXT        NOT NULL,
        projection  JSONB       NOT NULL,
        version     BIGINT      NOT NULL,
        updated_at  TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_tank_read_model_name ON tank_read_model (LOWER(name))",
];

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        info!(statements = SCHEMA.len(), "Database schema is up to date");
        Ok(())
    }
}
