// SPDX-License-Identifier: MIT

//! Encrypted Strava token storage (at most one live record per user).

use super::Db;
use crate::error::AppError;
use crate::models::StravaTokenRecord;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

impl Db {
    /// Get the encrypted token record for a user, if connected.
    pub async fn get_strava_tokens(
        &self,
        user_id: Uuid,
    ) -> Result<Option<StravaTokenRecord>, AppError> {
        let row = sqlx::query(
            "SELECT user_id, access_token_encrypted, refresh_token_encrypted,
                    expires_at, updated_at
             FROM strava_tokens WHERE user_id = ?1",
        )
        .bind(user_id.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::Database(format!("Failed to load tokens: {}", e)))?;

        row.map(|r| row_to_token_record(&r)).transpose()
    }

    /// Upsert the token record for a user.
    pub async fn upsert_strava_tokens(&self, record: &StravaTokenRecord) -> Result<(), AppError> {
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
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::Database(format!("Failed to upsert tokens: {}", e)))?;
        Ok(())
    }

    /// Delete the token record (disconnect).
    pub async fn delete_strava_tokens(&self, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM strava_tokens WHERE user_id = ?1")
            .bind(user_id.to_string())
            .execute(self.pool())
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete tokens: {}", e)))?;
        Ok(())
    }
}

fn row_to_token_record(row: &SqliteRow) -> Result<StravaTokenRecord, AppError> {
    let user_id_raw: String = row
        .try_get("user_id")
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(StravaTokenRecord {
        user_id: Uuid::parse_str(&user_id_raw)
            .map_err(|e| AppError::Database(format!("Corrupt user_id: {}", e)))?,
        access_token_encrypted: row
            .try_get("access_token_encrypted")
            .map_err(|e| AppError::Database(e.to_string()))?,
        refresh_token_encrypted: row
            .try_get("refresh_token_encrypted")
            .map_err(|e| AppError::Database(e.to_string()))?,
        expires_at: row
            .try_get("expires_at")
            .map_err(|e| AppError::Database(e.to_string()))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| AppError::Database(e.to_string()))?,
    })
}
