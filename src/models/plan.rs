// SPDX-License-Identifier: MIT

//! Training-plan day model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One structured day of a training plan, unique per (plan, date).
///
/// Rows are replaced wholesale when a plan document is re-parsed. The
/// enhancement step later fills the optional detail fields in place and
/// flips `detailed_fields_generated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingDay {
    pub plan_id: Uuid,
    pub date: NaiveDate,
    /// Session title, e.g. "Easy Run" or "Interval Session"
    pub session: String,
    pub description: Option<String>,
    /// Mileage breakdown, e.g. "2 mi warmup, 4x800m, 2 mi cooldown"
    pub mileage_breakdown: Option<String>,
    /// Pace targets, e.g. "8:30-9:00 /mi"
    pub pace_targets: Option<String>,
    pub estimated_distance_km: Option<f64>,
    pub estimated_time_minutes: Option<i64>,
    /// Whether the enhancement step has filled the detail fields below
    pub detailed_fields_generated: bool,
    pub estimated_calories: Option<i64>,
    pub target_cadence: Option<String>,
    pub heart_rate_zones: Option<String>,
}
