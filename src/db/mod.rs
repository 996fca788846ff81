// SPDX-License-Identifier: MIT

//! Database layer (SQLite via sqlx).
//!
//! Typed operations grouped per table:
//! - `state_tokens`: single-use OAuth state tokens
//! - `strava_tokens`: encrypted provider access/refresh tokens
//! - `profiles`: user profiles and connection flags
//! - `activities`: imported activities, best efforts, aggregate stats
//! - `training_days`: parsed training-plan days

pub mod activities;
pub mod profiles;
pub mod state_tokens;
pub mod strava_tokens;
pub mod training_days;

use crate::error::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database handle shared across the application.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Connect to the database and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::Database(format!("Invalid database URL: {}", e)))?
            .create_if_missing(true);

        // In-memory SQLite gets one DB per connection, so pin the pool to a
        // single connection there.
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect: {}", e)))?;

        let db = Self { pool };
        db.migrate().await?;

        tracing::info!(url = database_url, "Connected to SQLite");
        Ok(db)
    }

    /// Create an in-memory database for tests.
    pub async fn connect_in_memory() -> Result<Self, AppError> {
        Self::connect("sqlite::memory:").await
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply the schema idempotently.
    async fn migrate(&self) -> Result<(), AppError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Migration failed: {}", e)))?;
        Ok(())
    }
}

/// Full schema. `IF NOT EXISTS` keeps this safe to re-run on every boot.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS oauth_state_tokens (
    token         TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL,
    redirect_url  TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    expires_at    TEXT NOT NULL,
    used_at       TEXT
);

CREATE TABLE IF NOT EXISTS strava_tokens (
    user_id                  TEXT PRIMARY KEY,
    access_token_encrypted   TEXT NOT NULL,
    refresh_token_encrypted  TEXT NOT NULL,
    expires_at               TEXT NOT NULL,
    updated_at               TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS profiles (
    user_id              TEXT PRIMARY KEY,
    display_name         TEXT,
    strava_connected     INTEGER NOT NULL DEFAULT 0,
    strava_athlete_id    INTEGER,
    strava_connected_at  TEXT,
    created_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS activities (
    user_id               TEXT NOT NULL,
    strava_id             INTEGER NOT NULL,
    name                  TEXT NOT NULL,
    sport_type            TEXT NOT NULL,
    start_date            TEXT NOT NULL,
    distance_meters       REAL NOT NULL,
    moving_time_seconds   INTEGER NOT NULL,
    elapsed_time_seconds  INTEGER NOT NULL,
    average_heartrate     REAL,
    max_heartrate         REAL,
    average_watts         REAL,
    average_cadence       REAL,
    kudos_count           INTEGER NOT NULL DEFAULT 0,
    achievement_count     INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, strava_id)
);

CREATE TABLE IF NOT EXISTS best_efforts (
    effort_id            TEXT PRIMARY KEY,
    user_id              TEXT NOT NULL,
    distance_label       TEXT NOT NULL,
    distance_meters      REAL NOT NULL,
    moving_time_seconds  INTEGER NOT NULL,
    source_activity_id   INTEGER NOT NULL,
    achieved_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS athlete_stats (
    user_id              TEXT NOT NULL,
    period               TEXT NOT NULL,
    count                INTEGER NOT NULL,
    distance_meters      REAL NOT NULL,
    moving_time_seconds  INTEGER NOT NULL,
    elevation_gain_meters REAL NOT NULL,
    PRIMARY KEY (user_id, period)
);

CREATE TABLE IF NOT EXISTS training_days (
    plan_id                   TEXT NOT NULL,
    date                      TEXT NOT NULL,
    session                   TEXT NOT NULL,
    description               TEXT,
    mileage_breakdown         TEXT,
    pace_targets              TEXT,
    estimated_distance_km     REAL,
    estimated_time_minutes    INTEGER,
    detailed_fields_generated INTEGER NOT NULL DEFAULT 0,
    estimated_calories        INTEGER,
    target_cadence            TEXT,
    heart_rate_zones          TEXT,
    PRIMARY KEY (plan_id, date)
);

CREATE INDEX IF NOT EXISTS idx_activities_user_start
    ON activities (user_id, start_date DESC);

CREATE INDEX IF NOT EXISTS idx_best_efforts_user
    ON best_efforts (user_id);
"#;
