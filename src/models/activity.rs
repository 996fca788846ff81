// SPDX-License-Identifier: MIT

//! Imported activity, best-effort, and aggregate-stats models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One imported Strava activity, unique per (user, Strava activity id).
///
/// The whole set is replaced wholesale on each import run rather than
/// merged incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedActivity {
    pub user_id: Uuid,
    /// Strava activity ID
    pub strava_id: i64,
    pub name: String,
    pub sport_type: String,
    pub start_date: DateTime<Utc>,
    /// Distance in meters
    pub distance_meters: f64,
    /// Moving time in seconds
    pub moving_time_seconds: i64,
    /// Elapsed time in seconds
    pub elapsed_time_seconds: i64,
    pub average_heartrate: Option<f64>,
    pub max_heartrate: Option<f64>,
    pub average_watts: Option<f64>,
    pub average_cadence: Option<f64>,
    pub kudos_count: i64,
    pub achievement_count: i64,
}

/// A user's fastest observed time over a canonical race distance.
///
/// Keyed by the synthetic id `{user_id}:{label}` so repeated import runs
/// upsert instead of duplicating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestEffort {
    /// Synthetic id, `{user_id}:{distance label}`
    pub effort_id: String,
    pub user_id: Uuid,
    /// Distance bucket label, e.g. "5K"
    pub distance_label: String,
    /// Canonical distance in meters
    pub distance_meters: f64,
    /// Fastest moving time in seconds
    pub moving_time_seconds: i64,
    /// Strava activity the effort came from
    pub source_activity_id: i64,
    pub achieved_at: DateTime<Utc>,
}

/// Aggregate run totals for one period ("recent", "ytd", "all").
///
/// Mirrors the provider's athlete-stats payload; replaced wholesale on
/// each import run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatTotals {
    pub user_id: Uuid,
    /// "recent", "ytd", or "all"
    pub period: String,
    pub count: i64,
    pub distance_meters: f64,
    pub moving_time_seconds: i64,
    pub elevation_gain_meters: f64,
}
