// SPDX-License-Identifier: MIT

//! User profiles, connection flags, and the transactional connect /
//! disconnect mutations.
//!
//! The connection flags and the token row must never disagree, so the
//! connect and disconnect paths write both inside a single transaction.

use super::Db;
use crate::error::AppError;
use crate::models::{Profile, StravaTokenRecord};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

impl Db {
    /// Get a user profile.
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        let row = sqlx::query(
            "SELECT user_id, display_name, strava_connected, strava_athlete_id,
                    strava_connected_at, created_at
             FROM profiles WHERE user_id = ?1",
        )
        .bind(user_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::Database(format!("Failed to load profile: {}", e)))?;

        row.map(|r| row_to_profile(&r)).transpose()
    }

    /// Create a profile if one does not exist yet.
    pub async fn ensure_profile(&self, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO profiles (user_id, created_at) VALUES (?1, ?2)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id.to_string())
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::Database(format!("Failed to create profile: {}", e)))?;
        Ok(())
    }

    /// Persist exchanged tokens and set the connection flags, atomically.
    ///
    /// Used by the OAuth callback handler. A missing profile row is created
    /// so a first-time connect cannot leave tokens without flags.
    pub async fn connect_strava_account(
        &self,
        record: &StravaTokenRecord,
        athlete_id: i64,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query(
            "INSERT INTO strava_tokens
                 (user_id, access_token_encrypted, refresh_token_encrypted, expires_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (user_id) DO UPDATE SET
                 access_token_encrypted = excluded.access_token_encrypted,
                 refresh_token_encrypted = excluded.refresh_token_encrypted,
                 expires_at = excluded.expires_at,
                 updated_at = excluded.updated_at",
        )
        .bind(record.user_id.to_string())
        .bind(&record.access_token_encrypted)
        .bind(&record.refresh_token_encrypted)
        .bind(record.expires_at)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(format!("Failed to store tokens: {}", e)))?;

        sqlx::query(
            "INSERT INTO profiles
                 (user_id, strava_connected, strava_athlete_id, strava_connected_at, created_at)
             VALUES (?1, 1, ?2, ?3, ?3)
             ON CONFLICT (user_id) DO UPDATE SET
                 strava_connected = 1,
                 strava_athlete_id = excluded.strava_athlete_id,
                 strava_connected_at = excluded.strava_connected_at",
        )
        .bind(record.user_id.to_string())
        .bind(athlete_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(format!("Failed to update connection flags: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit connect: {}", e)))?;
        Ok(())
    }

    /// Disconnect: clear flags, delete tokens, and purge all imported data,
    /// atomically. Idempotent — disconnecting an unconnected user succeeds.
    pub async fn disconnect_strava_account(&self, user_id: Uuid) -> Result<(), AppError> {
        let uid = user_id.to_string();
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query(
            "UPDATE profiles SET strava_connected = 0, strava_athlete_id = NULL,
                 strava_connected_at = NULL
             WHERE user_id = ?1",
        )
        .bind(&uid)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(format!("Failed to clear connection flags: {}", e)))?;

        sqlx::query("DELETE FROM strava_tokens WHERE user_id = ?1")
            .bind(&uid)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete tokens: {}", e)))?;

        sqlx::query("DELETE FROM activities WHERE user_id = ?1")
            .bind(&uid)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete activities: {}", e)))?;

        sqlx::query("DELETE FROM best_efforts WHERE user_id = ?1")
            .bind(&uid)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete best efforts: {}", e)))?;

        sqlx::query("DELETE FROM athlete_stats WHERE user_id = ?1")
            .bind(&uid)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete stats: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit disconnect: {}", e)))?;

        tracing::info!(user_id = %user_id, "Strava account disconnected, imported data purged");
        Ok(())
    }
}

fn row_to_profile(row: &SqliteRow) -> Result<Profile, AppError> {
    let user_id_raw: String = row
        .try_get("user_id")
        .map_err(|e| AppError::Database(e.to_string()))?;
    let connected_at: Option<DateTime<Utc>> = row
        .try_get("strava_connected_at")
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Profile {
        user_id: Uuid::parse_str(&user_id_raw)
            .map_err(|e| AppError::Database(format!("Corrupt user_id: {}", e)))?,
        display_name: row
            .try_get("display_name")
            .map_err(|e| AppError::Database(e.to_string()))?,
        strava_connected: row
            .try_get::<bool, _>("strava_connected")
            .map_err(|e| AppError::Database(e.to_string()))?,
        strava_athlete_id: row
            .try_get("strava_athlete_id")
            .map_err(|e| AppError::Database(e.to_string()))?,
        strava_connected_at: connected_at,
        created_at: row
            .try_get("created_at")
            .map_err(|e| AppError::Database(e.to_string()))?,
    })
}
