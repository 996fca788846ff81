// SPDX-License-Identifier: MIT

//! Authenticated JSON API: import, connection status, plan parsing and
//! enhancement.

use crate::db::training_days::DayEnhancement;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::models::StatTotals;
use crate::services::EnhancementProgress;
use crate::AppState;
use axum::extract::{Extension, Path, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub success: bool,
    pub activities_count: usize,
    pub stats_data: Vec<StatTotals>,
}

/// `POST /api/strava/import`: pull activities and stats for the caller.
pub async fn import_activities(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ImportResponse>, AppError> {
    let summary = state.import_service.import(user.user_id).await?;

    Ok(Json(ImportResponse {
        success: true,
        activities_count: summary.activities_count,
        stats_data: summary.stats,
    }))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// `POST /api/strava/disconnect`: revoke and purge. Idempotent.
pub async fn disconnect_strava(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MessageResponse>, AppError> {
    state.strava_service.disconnect(user.user_id).await?;

    Ok(Json(MessageResponse {
        success: true,
        message: "Strava account disconnected".to_string(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub connected: bool,
    pub athlete_id: Option<i64>,
    pub connected_at: Option<String>,
    pub activities_count: i64,
}

/// `GET /api/strava/status`: connection flags for the caller.
pub async fn strava_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<StatusResponse>, AppError> {
    let profile = state.db.get_profile(user.user_id).await?;
    let activities_count = state.db.count_activities(user.user_id).await?;

    let response = match profile {
        Some(p) => StatusResponse {
            connected: p.strava_connected,
            athlete_id: p.strava_athlete_id,
            connected_at: p
                .strava_connected_at
                .map(crate::time_utils::format_utc_rfc3339),
            activities_count,
        },
        None => StatusResponse {
            connected: false,
            athlete_id: None,
            connected_at: None,
            activities_count,
        },
    };

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsePlanRequest {
    pub plan_id: Uuid,
    pub plan_text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsePlanResponse {
    pub success: bool,
    pub parsed_days: usize,
    pub message: String,
}

/// `POST /api/plans/parse`: parse plan text into stored training days.
pub async fn parse_plan(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<AuthUser>,
    Json(request): Json<ParsePlanRequest>,
) -> Result<Json<ParsePlanResponse>, AppError> {
    let parsed_days = state
        .plan_service
        .parse(request.plan_id, &request.plan_text)
        .await?;

    Ok(Json(ParsePlanResponse {
        success: true,
        parsed_days,
        message: format!("Parsed {} training days", parsed_days),
    }))
}

/// `GET /api/plans/{plan_id}/enhancement`: progress of the enhancement
/// pass, computed from the stored rows on demand.
pub async fn plan_enhancement(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<AuthUser>,
    Path(plan_id): Path<Uuid>,
) -> Result<Json<EnhancementProgress>, AppError> {
    let progress = state.plan_service.stored_progress(plan_id).await?;
    Ok(Json(progress))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceDayRequest {
    pub estimated_calories: Option<i64>,
    pub target_cadence: Option<String>,
    pub heart_rate_zones: Option<String>,
}

/// `POST /api/plans/{plan_id}/days/{date}/enhance`: fill the detail
/// fields on one training day.
pub async fn enhance_day(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<AuthUser>,
    Path((plan_id, date)): Path<(Uuid, NaiveDate)>,
    Json(request): Json<EnhanceDayRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let enhancement = DayEnhancement {
        estimated_calories: request.estimated_calories,
        target_cadence: request.target_cadence,
        heart_rate_zones: request.heart_rate_zones,
    };

    let updated = state
        .db
        .apply_day_enhancement(plan_id, date, &enhancement)
        .await?;

    if !updated {
        return Err(AppError::NotFound(format!(
            "No training day {} in plan {}",
            date, plan_id
        )));
    }

    Ok(Json(MessageResponse {
        success: true,
        message: format!("Enhanced training day {}", date),
    }))
}
