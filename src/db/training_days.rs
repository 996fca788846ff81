// SPDX-License-Identifier: MIT

//! Parsed training-plan day storage.
//!
//! A re-parse replaces every row for the plan; the enhancement step
//! mutates individual rows in place.

use super::Db;
use crate::error::AppError;
use crate::models::TrainingDay;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

/// Detail fields filled in by the enhancement step.
#[derive(Debug, Clone)]
pub struct DayEnhancement {
    pub estimated_calories: Option<i64>,
    pub target_cadence: Option<String>,
    pub heart_rate_zones: Option<String>,
}

impl Db {
    /// Replace all training days for a plan with a freshly parsed set.
    pub async fn replace_training_days(
        &self,
        plan_id: Uuid,
        days: &[TrainingDay],
    ) -> Result<(), AppError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query("DELETE FROM training_days WHERE plan_id = ?1")
            .bind(plan_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("Failed to clear training days: {}", e)))?;

        for day in days {
            sqlx::query(
                "INSERT INTO training_days
                     (plan_id, date, session, description, mileage_breakdown, pace_targets,
                      estimated_distance_km, estimated_time_minutes, detailed_fields_generated,
                      estimated_calories, target_cadence, heart_rate_zones)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )
            .bind(day.plan_id.to_string())
            .bind(day.date)
            .bind(&day.session)
            .bind(&day.description)
            .bind(&day.mileage_breakdown)
            .bind(&day.pace_targets)
            .bind(day.estimated_distance_km)
            .bind(day.estimated_time_minutes)
            .bind(day.detailed_fields_generated)
            .bind(day.estimated_calories)
            .bind(&day.target_cadence)
            .bind(&day.heart_rate_zones)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("Failed to insert training day: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("Failed to commit training days: {}", e)))?;
        Ok(())
    }

    /// All training days for a plan, ordered by date.
    pub async fn get_training_days(&self, plan_id: Uuid) -> Result<Vec<TrainingDay>, AppError> {
        let rows = sqlx::query(
            "SELECT plan_id, date, session, description, mileage_breakdown, pace_targets,
                    estimated_distance_km, estimated_time_minutes, detailed_fields_generated,
                    estimated_calories, target_cadence, heart_rate_zones
             FROM training_days WHERE plan_id = ?1 ORDER BY date",
        )
        .bind(plan_id.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::Database(format!("Failed to load training days: {}", e)))?;

        rows.iter().map(row_to_training_day).collect()
    }

    /// Fill the detail fields on one day and flip `detailed_fields_generated`.
    ///
    /// Returns `false` when the (plan, date) row does not exist.
    pub async fn apply_day_enhancement(
        &self,
        plan_id: Uuid,
        date: NaiveDate,
        enhancement: &DayEnhancement,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE training_days SET
                 detailed_fields_generated = 1,
                 estimated_calories = ?1,
                 target_cadence = ?2,
                 heart_rate_zones = ?3
             WHERE plan_id = ?4 AND date = ?5",
        )
        .bind(enhancement.estimated_calories)
        .bind(&enhancement.target_cadence)
        .bind(&enhancement.heart_rate_zones)
        .bind(plan_id.to_string())
        .bind(date)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::Database(format!("Failed to apply enhancement: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_training_day(row: &SqliteRow) -> Result<TrainingDay, AppError> {
    let get = |e: sqlx::Error| AppError::Database(e.to_string());
    let plan_id_raw: String = row.try_get("plan_id").map_err(get)?;

    Ok(TrainingDay {
        plan_id: Uuid::parse_str(&plan_id_raw)
            .map_err(|e| AppError::Database(format!("Corrupt plan_id: {}", e)))?,
        date: row.try_get("date").map_err(get)?,
        session: row.try_get("session").map_err(get)?,
        description: row.try_get("description").map_err(get)?,
        mileage_breakdown: row.try_get("mileage_breakdown").map_err(get)?,
        pace_targets: row.try_get("pace_targets").map_err(get)?,
        estimated_distance_km: row.try_get("estimated_distance_km").map_err(get)?,
        estimated_time_minutes: row.try_get("estimated_time_minutes").map_err(get)?,
        detailed_fields_generated: row.try_get("detailed_fields_generated").map_err(get)?,
        estimated_calories: row.try_get("estimated_calories").map_err(get)?,
        target_cadence: row.try_get("target_cadence").map_err(get)?,
        heart_rate_zones: row.try_get("heart_rate_zones").map_err(get)?,
    })
}
