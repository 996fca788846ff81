// SPDX-License-Identifier: MIT

//! HTTP-level tests: authentication gate, health, status, plan endpoints.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use stride_tracker::routes::create_router;
use tower::ServiceExt;
use uuid::Uuid;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let state = common::test_state().await;
    let app = create_router(state);

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_protected_routes_reject_anonymous_requests() {
    let state = common::test_state().await;

    let cases = [
        (Method::GET, "/auth/strava/connect"),
        (Method::POST, "/api/strava/import"),
        (Method::POST, "/api/strava/disconnect"),
        (Method::GET, "/api/strava/status"),
        (Method::POST, "/api/plans/parse"),
    ];

    for (method, uri) in cases {
        let app = create_router(state.clone());
        let response = app
            .oneshot(
                Request::builder()
                    .method(method.clone())
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{} {} should require auth",
            method,
            uri
        );
    }
}

#[tokio::test]
async fn test_garbage_jwt_rejected() {
    let state = common::test_state().await;
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::get("/api/strava/status")
                .header(header::AUTHORIZATION, "Bearer not.a.jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_reports_unconnected_by_default() {
    let state = common::test_state().await;
    let auth = common::bearer(&state, Uuid::new_v4());
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::get("/api/strava/status")
                .header(header::AUTHORIZATION, &auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["connected"], false);
    assert_eq!(body["activitiesCount"], 0);
}

#[tokio::test]
async fn test_security_headers_on_responses() {
    let state = common::test_state().await;
    let app = create_router(state);

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers["X-Content-Type-Options"], "nosniff");
    assert_eq!(headers["X-Frame-Options"], "DENY");
}

#[tokio::test]
async fn test_plan_parse_and_enhancement_flow() {
    let state = common::test_state().await;
    let auth = common::bearer(&state, Uuid::new_v4());
    let plan_id = Uuid::new_v4();

    let plan_text = "\
2025-03-01 | Easy Run | Conversational | N/A | 9:30/mi | 4 miles | 40\n\
this line is junk\n\
2025-03-02 | Rest | Full rest | N/A | N/A | 0 | 0";

    let parse_body = serde_json::json!({ "planId": plan_id, "planText": plan_text });

    let response = create_router(state.clone())
        .oneshot(
            Request::post("/api/plans/parse")
                .header(header::AUTHORIZATION, &auth)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(parse_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["parsedDays"], 2);

    // Nothing enhanced yet.
    let response = create_router(state.clone())
        .oneshot(
            Request::get(format!("/api/plans/{}/enhancement", plan_id))
                .header(header::AUTHORIZATION, &auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["enhanced"], 0);
    assert_eq!(body["percentage"], 0);

    // Enhance one day.
    let enhance_body = serde_json::json!({
        "estimatedCalories": 450,
        "targetCadence": "170-180",
        "heartRateZones": "Z2"
    });

    let response = create_router(state.clone())
        .oneshot(
            Request::post(format!("/api/plans/{}/days/2025-03-01/enhance", plan_id))
                .header(header::AUTHORIZATION, &auth)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(enhance_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let response = create_router(state.clone())
        .oneshot(
            Request::get(format!("/api/plans/{}/enhancement", plan_id))
                .header(header::AUTHORIZATION, &auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["enhanced"], 1);
    assert_eq!(body["percentage"], 50);
}

#[tokio::test]
async fn test_enhance_unknown_day_is_404() {
    let state = common::test_state().await;
    let auth = common::bearer(&state, Uuid::new_v4());

    let response = create_router(state)
        .oneshot(
            Request::post(format!(
                "/api/plans/{}/days/2025-01-01/enhance",
                Uuid::new_v4()
            ))
            .header(header::AUTHORIZATION, &auth)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_plan_parse_with_no_valid_lines_is_400() {
    let state = common::test_state().await;
    let auth = common::bearer(&state, Uuid::new_v4());

    let parse_body = serde_json::json!({
        "planId": Uuid::new_v4(),
        "planText": "nothing useful here"
    });

    let response = create_router(state)
        .oneshot(
            Request::post("/api/plans/parse")
                .header(header::AUTHORIZATION, &auth)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(parse_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
