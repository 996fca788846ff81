// SPDX-License-Identifier: MIT

//! Imported activities, derived best efforts, and aggregate stats.
//!
//! Activities and stats are replaced wholesale per import run (there is a
//! brief visibility gap between the delete and the insert; callers should
//! expect eventual consistency after an import completes). Best efforts are
//! upserted under a synthetic id so re-runs never duplicate.

use super::Db;
use crate::error::AppError;
use crate::models::{BestEffort, ImportedActivity, StatTotals};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

/// Rows per INSERT when bulk-writing activities.
const INSERT_BATCH_SIZE: usize = 50;

impl Db {
    /// Replace all imported activities for a user with the given set.
    pub async fn replace_activities(
        &self,
        user_id: Uuid,
        activities: &[ImportedActivity],
    ) -> Result<(), AppError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query("DELETE FROM activities WHERE user_id = ?1")
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("Failed to clear activities: {}", e)))?;

        for chunk in activities.chunks(INSERT_BATCH_SIZE) {
            for activity in chunk {
                sqlx::query(
                    "INSERT INTO activities
                         (user_id, strava_id, name, sport_type, start_date, distance_meters,
                          moving_time_seconds, elapsed_time_seconds, average_heartrate,
                          max_heartrate, average_watts, average_cadence, kudos_count,
                          achievement_count)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                     ON CONFLICT (user_id, strava_id) DO NOTHING",
                )
                .bind(activity.user_id.to_string())
                .bind(activity.strava_id)
                .bind(&activity.name)
                .bind(&activity.sport_type)
                .bind(activity.start_date)
                .bind(activity.distance_meters)
                .bind(activity.moving_time_seconds)
                .bind(activity.elapsed_time_seconds)
                .bind(activity.average_heartrate)
                .bind(activity.max_heartrate)
                .bind(activity.average_watts)
                .bind(activity.average_cadence)
                .bind(activity.kudos_count)
                .bind(activity.achievement_count)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::Database(format!("Failed to insert activity: {}", e)))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit activities: {}", e)))?;
        Ok(())
    }

    /// Most recent activities for a user, newest first.
    pub async fn get_recent_activities(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<ImportedActivity>, AppError> {
        let rows = sqlx::query(
            "SELECT user_id, strava_id, name, sport_type, start_date, distance_meters,
                    moving_time_seconds, elapsed_time_seconds, average_heartrate,
                    max_heartrate, average_watts, average_cadence, kudos_count,
                    achievement_count
             FROM activities WHERE user_id = ?1
             ORDER BY start_date DESC LIMIT ?2",
        )
        .bind(user_id.to_string())
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::Database(format!("Failed to load activities: {}", e)))?;

        rows.iter().map(row_to_activity).collect()
    }

    /// Count of imported activities for a user.
    pub async fn count_activities(&self, user_id: Uuid) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM activities WHERE user_id = ?1")
            .bind(user_id.to_string())
            .fetch_one(self.pool())
            .await
            .map_err(|e| AppError::Database(format!("Failed to count activities: {}", e)))?;
        row.try_get("n").map_err(|e| AppError::Database(e.to_string()))
    }

    /// Upsert one derived best effort.
    pub async fn upsert_best_effort(&self, effort: &BestEffort) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO best_efforts
                 (effort_id, user_id, distance_label, distance_meters, moving_time_seconds,
                  source_activity_id, achieved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (effort_id) DO UPDATE SET
                 moving_time_seconds = excluded.moving_time_seconds,
                 source_activity_id = excluded.source_activity_id,
                 achieved_at = excluded.achieved_at",
        )
        .bind(&effort.effort_id)
        .bind(effort.user_id.to_string())
        .bind(&effort.distance_label)
        .bind(effort.distance_meters)
        .bind(effort.moving_time_seconds)
        .bind(effort.source_activity_id)
        .bind(effort.achieved_at)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::Database(format!("Failed to upsert best effort: {}", e)))?;
        Ok(())
    }

    /// All best efforts for a user.
    pub async fn get_best_efforts(&self, user_id: Uuid) -> Result<Vec<BestEffort>, AppError> {
        let rows = sqlx::query(
            "SELECT effort_id, user_id, distance_label, distance_meters, moving_time_seconds,
                    source_activity_id, achieved_at
             FROM best_efforts WHERE user_id = ?1 ORDER BY distance_meters",
        )
        .bind(user_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::Database(format!("Failed to load best efforts: {}", e)))?;

        rows.iter().map(row_to_best_effort).collect()
    }

    /// Replace all aggregate stats rows for a user.
    pub async fn replace_athlete_stats(
        &self,
        user_id: Uuid,
        stats: &[StatTotals],
    ) -> Result<(), AppError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query("DELETE FROM athlete_stats WHERE user_id = ?1")
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("Failed to clear stats: {}", e)))?;

        for totals in stats {
            sqlx::query(
                "INSERT INTO athlete_stats
                     (user_id, period, count, distance_meters, moving_time_seconds,
                      elevation_gain_meters)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(totals.user_id.to_string())
            .bind(&totals.period)
            .bind(totals.count)
            .bind(totals.distance_meters)
            .bind(totals.moving_time_seconds)
            .bind(totals.elevation_gain_meters)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert stats: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit stats: {}", e)))?;
        Ok(())
    }

    /// Aggregate stats rows for a user.
    pub async fn get_athlete_stats(&self, user_id: Uuid) -> Result<Vec<StatTotals>, AppError> {
        let rows = sqlx::query(
            "SELECT user_id, period, count, distance_meters, moving_time_seconds,
                    elevation_gain_meters
             FROM athlete_stats WHERE user_id = ?1",
        )
        .bind(user_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::Database(format!("Failed to load stats: {}", e)))?;

        rows.iter().map(row_to_stat_totals).collect()
    }
}

fn parse_user_id(row: &SqliteRow) -> Result<Uuid, AppError> {
    let raw: String = row
        .try_get("user_id")
        .map_err(|e| AppError::Database(e.to_string()))?;
    Uuid::parse_str(&raw).map_err(|e| AppError::Database(format!("Corrupt user_id: {}", e)))
}

fn row_to_activity(row: &SqliteRow) -> Result<ImportedActivity, AppError> {
    let get = |e: sqlx::Error| AppError::Database(e.to_string());
    Ok(ImportedActivity {
        user_id: parse_user_id(row)?,
        strava_id: row.try_get("strava_id").map_err(get)?,
        name: row.try_get("name").map_err(get)?,
        sport_type: row.try_get("sport_type").map_err(get)?,
        start_date: row.try_get("start_date").map_err(get)?,
        distance_meters: row.try_get("distance_meters").map_err(get)?,
        moving_time_seconds: row.try_get("moving_time_seconds").map_err(get)?,
        elapsed_time_seconds: row.try_get("elapsed_time_seconds").map_err(get)?,
        average_heartrate: row.try_get("average_heartrate").map_err(get)?,
        max_heartrate: row.try_get("max_heartrate").map_err(get)?,
        average_watts: row.try_get("average_watts").map_err(get)?,
        average_cadence: row.try_get("average_cadence").map_err(get)?,
        kudos_count: row.try_get("kudos_count").map_err(get)?,
        achievement_count: row.try_get("achievement_count").map_err(get)?,
    })
}

fn row_to_best_effort(row: &SqliteRow) -> Result<BestEffort, AppError> {
    let get = |e: sqlx::Error| AppError::Database(e.to_string());
    Ok(BestEffort {
        effort_id: row.try_get("effort_id").map_err(get)?,
        user_id: parse_user_id(row)?,
        distance_label: row.try_get("distance_label").map_err(get)?,
        distance_meters: row.try_get("distance_meters").map_err(get)?,
        moving_time_seconds: row.try_get("moving_time_seconds").map_err(get)?,
        source_activity_id: row.try_get("source_activity_id").map_err(get)?,
        achieved_at: row.try_get("achieved_at").map_err(get)?,
    })
}

fn row_to_stat_totals(row: &SqliteRow) -> Result<StatTotals, AppError> {
    let get = |e: sqlx::Error| AppError::Database(e.to_string());
    Ok(StatTotals {
        user_id: parse_user_id(row)?,
        period: row.try_get("period").map_err(get)?,
        count: row.try_get("count").map_err(get)?,
        distance_meters: row.try_get("distance_meters").map_err(get)?,
        moving_time_seconds: row.try_get("moving_time_seconds").map_err(get)?,
        elevation_gain_meters: row.try_get("elevation_gain_meters").map_err(get)?,
    })
}
