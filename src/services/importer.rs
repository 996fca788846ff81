// SPDX-License-Identifier: MIT

//! Activity/stats importer.
//!
//! Pulls aggregate stats and a bounded window of activity history from
//! Strava, keeps only runs, replaces the stored set wholesale, and derives
//! per-distance best efforts. Network failures degrade gracefully: partial
//! data is preferable to total failure, and the import only fails outright
//! when no valid access token could be obtained.

use crate::db::Db;
use crate::error::AppError;
use crate::models::{BestEffort, ImportedActivity, StatTotals};
use crate::services::strava::{StravaActivitySummary, StravaAthleteStats, StravaService};
use chrono::{Duration, Utc};
use uuid::Uuid;

/// Look-back window for the activity list.
const LOOKBACK_DAYS: i64 = 183; // ~6 months

/// Activities requested per page.
const PER_PAGE: u32 = 100;

/// Safety cap on pages fetched in one run.
const MAX_PAGES: u32 = 10;

/// Safety cap on total activities fetched in one run.
const MAX_ITEMS: usize = 500;

/// Fixed delay between provider page fetches.
const INTER_CALL_DELAY_MS: u64 = 200;

/// How many recent runs are scanned for best efforts.
const BEST_EFFORT_SCAN_LIMIT: u32 = 50;

/// Canonical race distances with per-distance tolerance bands.
///
/// Longer distances are more standardized, so they get tighter bands.
/// The 5K band is ±8% (±400 m), boundary inclusive.
const RACE_DISTANCES: &[(&str, f64, f64)] = &[
    ("1 Mile", 1_609.34, 0.10),
    ("5K", 5_000.0, 0.08),
    ("10K", 10_000.0, 0.06),
    ("Half Marathon", 21_097.5, 0.04),
    ("Marathon", 42_195.0, 0.03),
];

/// What one import run achieved.
#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub activities_count: usize,
    pub stats: Vec<StatTotals>,
}

/// Imports activities and stats for connected users.
#[derive(Clone)]
pub struct ImportService {
    strava: StravaService,
    db: Db,
}

impl ImportService {
    pub fn new(strava: StravaService, db: Db) -> Self {
        Self { strava, db }
    }

    /// Run a full import for one user.
    pub async fn import(&self, user_id: Uuid) -> Result<ImportSummary, AppError> {
        // The only unrecoverable step: without a token nothing can be fetched.
        let access_token = self.strava.get_valid_access_token(user_id).await?;

        let stats = self.import_stats(user_id, &access_token).await;
        let activities = self.import_activities(user_id, &access_token).await?;
        self.recompute_best_efforts(user_id).await;

        Ok(ImportSummary {
            activities_count: activities,
            stats,
        })
    }

    /// Fetch and replace aggregate stats. Failures are logged, not fatal.
    async fn import_stats(&self, user_id: Uuid, access_token: &str) -> Vec<StatTotals> {
        let athlete_id = match self.db.get_profile(user_id).await {
            Ok(Some(profile)) => profile.strava_athlete_id,
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user_id, "Profile lookup failed");
                None
            }
        };

        let Some(athlete_id) = athlete_id else {
            tracing::warn!(user_id = %user_id, "No athlete id on profile, skipping stats");
            return Vec::new();
        };

        let raw = match self
            .strava
            .client()
            .get_athlete_stats(access_token, athlete_id)
            .await
        {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user_id, "Stats fetch failed, continuing");
                return Vec::new();
            }
        };

        let rows = map_stats(user_id, &raw);
        if let Err(e) = self.db.replace_athlete_stats(user_id, &rows).await {
            tracing::warn!(error = %e, user_id = %user_id, "Stats persistence failed");
            return Vec::new();
        }
        rows
    }

    /// Paginate the activity list, filter to runs, and replace the stored
    /// set. Returns the number of rows stored.
    async fn import_activities(
        &self,
        user_id: Uuid,
        access_token: &str,
    ) -> Result<usize, AppError> {
        let after = (Utc::now() - Duration::days(LOOKBACK_DAYS)).timestamp();
        let mut fetched: Vec<StravaActivitySummary> = Vec::new();

        for page in 1..=MAX_PAGES {
            if page > 1 {
                tokio::time::sleep(std::time::Duration::from_millis(INTER_CALL_DELAY_MS)).await;
            }

            let batch = match self
                .strava
                .client()
                .list_activities(access_token, after, page, PER_PAGE)
                .await
            {
                Ok(b) => b,
                Err(e) => {
                    // Partial results are accepted; stop paginating.
                    tracing::warn!(error = %e, page, user_id = %user_id,
                        "Activity page fetch failed, stopping pagination");
                    break;
                }
            };

            if batch.is_empty() {
                break;
            }
            fetched.extend(batch);

            if fetched.len() >= MAX_ITEMS {
                fetched.truncate(MAX_ITEMS);
                break;
            }
        }

        let runs: Vec<ImportedActivity> = fetched
            .iter()
            .filter(|a| is_run(a))
            .map(|a| map_activity(user_id, a))
            .collect();

        self.db.replace_activities(user_id, &runs).await?;

        tracing::info!(
            user_id = %user_id,
            fetched = fetched.len(),
            stored = runs.len(),
            "Activity import complete"
        );
        Ok(runs.len())
    }

    /// Recompute best efforts from the most recent stored runs. Failures
    /// are logged without failing the import.
    async fn recompute_best_efforts(&self, user_id: Uuid) {
        let recent = match self
            .db
            .get_recent_activities(user_id, BEST_EFFORT_SCAN_LIMIT)
            .await
        {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user_id, "Best-effort scan failed");
                return;
            }
        };

        for effort in calculate_best_efforts(user_id, &recent) {
            if let Err(e) = self.db.upsert_best_effort(&effort).await {
                tracing::warn!(error = %e, label = %effort.distance_label,
                    "Best-effort upsert failed");
            }
        }
    }
}

/// Decide whether a provider activity counts as a run.
///
/// Prefers the sport-type tag; falls back to a case-insensitive "run"
/// substring on the name when tags are absent or ambiguous.
fn is_run(activity: &StravaActivitySummary) -> bool {
    let tag = activity
        .sport_type
        .as_deref()
        .or(activity.activity_type.as_deref());

    match tag {
        Some(t) if !t.is_empty() => t.to_lowercase().contains("run"),
        _ => activity.name.to_lowercase().contains("run"),
    }
}

fn map_activity(user_id: Uuid, a: &StravaActivitySummary) -> ImportedActivity {
    ImportedActivity {
        user_id,
        strava_id: a.id,
        name: a.name.clone(),
        sport_type: a
            .sport_type
            .clone()
            .or_else(|| a.activity_type.clone())
            .unwrap_or_else(|| "Run".to_string()),
        start_date: a.start_date,
        distance_meters: a.distance,
        moving_time_seconds: a.moving_time,
        elapsed_time_seconds: a.elapsed_time,
        average_heartrate: a.average_heartrate,
        max_heartrate: a.max_heartrate,
        average_watts: a.average_watts,
        average_cadence: a.average_cadence,
        kudos_count: a.kudos_count,
        achievement_count: a.achievement_count,
    }
}

fn map_stats(user_id: Uuid, raw: &StravaAthleteStats) -> Vec<StatTotals> {
    [
        ("recent", &raw.recent_run_totals),
        ("ytd", &raw.ytd_run_totals),
        ("all", &raw.all_run_totals),
    ]
    .into_iter()
    .map(|(period, totals)| StatTotals {
        user_id,
        period: period.to_string(),
        count: totals.count,
        distance_meters: totals.distance,
        moving_time_seconds: totals.moving_time,
        elevation_gain_meters: totals.elevation_gain,
    })
    .collect()
}

/// Derive best efforts over the canonical race distances.
///
/// For each distance, the fastest moving time among activities whose
/// distance falls inside the tolerance band wins. The band boundary is
/// inclusive. Synthetic ids keep repeated runs from duplicating rows.
pub fn calculate_best_efforts(
    user_id: Uuid,
    activities: &[ImportedActivity],
) -> Vec<BestEffort> {
    let mut efforts = Vec::new();

    for &(label, canonical, tolerance) in RACE_DISTANCES {
        let band = canonical * tolerance;

        let best = activities
            .iter()
            .filter(|a| (a.distance_meters - canonical).abs() <= band)
            .filter(|a| a.moving_time_seconds > 0)
            .min_by_key(|a| a.moving_time_seconds);

        if let Some(activity) = best {
            efforts.push(BestEffort {
                effort_id: format!("{}:{}", user_id, label),
                user_id,
                distance_label: label.to_string(),
                distance_meters: canonical,
                moving_time_seconds: activity.moving_time_seconds,
                source_activity_id: activity.strava_id,
                achieved_at: activity.start_date,
            });
        }
    }

    efforts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn run(id: i64, distance: f64, moving_time: i64) -> ImportedActivity {
        ImportedActivity {
            user_id: Uuid::nil(),
            strava_id: id,
            name: format!("Run {}", id),
            sport_type: "Run".to_string(),
            start_date: Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
            distance_meters: distance,
            moving_time_seconds: moving_time,
            elapsed_time_seconds: moving_time + 30,
            average_heartrate: None,
            max_heartrate: None,
            average_watts: None,
            average_cadence: None,
            kudos_count: 0,
            achievement_count: 0,
        }
    }

    fn summary(name: &str, sport_type: Option<&str>) -> StravaActivitySummary {
        StravaActivitySummary {
            id: 1,
            name: name.to_string(),
            sport_type: sport_type.map(str::to_string),
            activity_type: None,
            start_date: Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
            distance: 5000.0,
            moving_time: 1500,
            elapsed_time: 1530,
            average_heartrate: None,
            max_heartrate: None,
            average_watts: None,
            average_cadence: None,
            kudos_count: 0,
            achievement_count: 0,
        }
    }

    #[test]
    fn test_5k_best_effort_selects_minimum_within_band() {
        let user = Uuid::nil();
        let activities = vec![
            run(1, 5000.0, 1500),
            run(2, 5100.0, 1400), // fastest qualifying
            run(3, 4000.0, 1000), // outside band, ignored despite fast time
            run(4, 5400.0, 1450), // exactly at the ±400m boundary, included
        ];

        let efforts = calculate_best_efforts(user, &activities);
        let five_k = efforts.iter().find(|e| e.distance_label == "5K").unwrap();

        assert_eq!(five_k.moving_time_seconds, 1400);
        assert_eq!(five_k.source_activity_id, 2);
        assert_eq!(five_k.effort_id, format!("{}:5K", user));
    }

    #[test]
    fn test_boundary_activity_can_win() {
        let user = Uuid::nil();
        let activities = vec![run(1, 5000.0, 1500), run(2, 5400.0, 1200)];

        let efforts = calculate_best_efforts(user, &activities);
        let five_k = efforts.iter().find(|e| e.distance_label == "5K").unwrap();
        assert_eq!(five_k.source_activity_id, 2);
    }

    #[test]
    fn test_no_qualifying_activities_yields_no_effort() {
        let efforts = calculate_best_efforts(Uuid::nil(), &[run(1, 800.0, 300)]);
        assert!(efforts.is_empty());
    }

    #[test]
    fn test_zero_moving_time_ignored() {
        let efforts = calculate_best_efforts(Uuid::nil(), &[run(1, 5000.0, 0)]);
        assert!(efforts.iter().all(|e| e.distance_label != "5K"));
    }

    #[test]
    fn test_is_run_by_sport_type() {
        assert!(is_run(&summary("Morning workout", Some("Run"))));
        assert!(is_run(&summary("Intervals", Some("TrailRun"))));
        assert!(!is_run(&summary("Morning workout", Some("Ride"))));
    }

    #[test]
    fn test_is_run_name_fallback() {
        assert!(is_run(&summary("Lunch RUN", None)));
        assert!(!is_run(&summary("Lunch swim", None)));
    }
}
