// SPDX-License-Identifier: MIT

//! Import persistence tests: wholesale replacement and best-effort upserts.

mod common;

use chrono::{Duration, Utc};
use stride_tracker::error::AppError;
use stride_tracker::models::{BestEffort, ImportedActivity};
use uuid::Uuid;

fn activity(user_id: Uuid, strava_id: i64, distance: f64, moving_time: i64) -> ImportedActivity {
    ImportedActivity {
        user_id,
        strava_id,
        name: format!("Run {}", strava_id),
        sport_type: "Run".to_string(),
        start_date: Utc::now() - Duration::days(strava_id),
        distance_meters: distance,
        moving_time_seconds: moving_time,
        elapsed_time_seconds: moving_time + 60,
        average_heartrate: Some(150.0),
        max_heartrate: Some(175.0),
        average_watts: None,
        average_cadence: Some(172.0),
        kudos_count: 3,
        achievement_count: 1,
    }
}

#[tokio::test]
async fn test_reimport_keeps_one_row_per_activity() {
    let state = common::test_state().await;
    let user_id = Uuid::new_v4();

    let batch = vec![
        activity(user_id, 1, 5000.0, 1500),
        activity(user_id, 2, 10000.0, 3100),
    ];

    state.db.replace_activities(user_id, &batch).await.unwrap();
    state.db.replace_activities(user_id, &batch).await.unwrap();

    assert_eq!(state.db.count_activities(user_id).await.unwrap(), 2);

    let stored = state.db.get_recent_activities(user_id, 50).await.unwrap();
    assert_eq!(stored.len(), 2);
    // Newest first.
    assert_eq!(stored[0].strava_id, 1);
}

#[tokio::test]
async fn test_replacement_drops_stale_activities() {
    let state = common::test_state().await;
    let user_id = Uuid::new_v4();

    state
        .db
        .replace_activities(user_id, &[activity(user_id, 1, 5000.0, 1500)])
        .await
        .unwrap();
    state
        .db
        .replace_activities(user_id, &[activity(user_id, 2, 8000.0, 2400)])
        .await
        .unwrap();

    let stored = state.db.get_recent_activities(user_id, 50).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].strava_id, 2);
}

#[tokio::test]
async fn test_best_effort_upsert_overwrites_same_distance() {
    let state = common::test_state().await;
    let user_id = Uuid::new_v4();

    let mut effort = BestEffort {
        effort_id: format!("{}:5K", user_id),
        user_id,
        distance_label: "5K".to_string(),
        distance_meters: 5000.0,
        moving_time_seconds: 1500,
        source_activity_id: 1,
        achieved_at: Utc::now(),
    };

    state.db.upsert_best_effort(&effort).await.unwrap();

    effort.moving_time_seconds = 1400;
    effort.source_activity_id = 2;
    state.db.upsert_best_effort(&effort).await.unwrap();

    let stored = state.db.get_best_efforts(user_id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].moving_time_seconds, 1400);
    assert_eq!(stored[0].source_activity_id, 2);
}

#[tokio::test]
async fn test_import_without_connection_fails() {
    let state = common::test_state().await;

    let result = state.import_service.import(Uuid::new_v4()).await;
    assert!(matches!(result, Err(AppError::NotConnected)));
}
