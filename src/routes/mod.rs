// SPDX-License-Identifier: MIT

//! HTTP routing.
//!
//! Two route groups: the callback and health endpoints are public, every
//! `/api` and connect endpoint sits behind the JWT middleware so no
//! request side effects happen for unauthenticated callers.

pub mod api;
pub mod auth;

use crate::middleware::{require_auth, security::add_security_headers};
use crate::AppState;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the full application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/auth/strava/connect", get(auth::strava_connect))
        .route("/api/strava/import", post(api::import_activities))
        .route("/api/strava/disconnect", post(api::disconnect_strava))
        .route("/api/strava/status", get(api::strava_status))
        .route("/api/plans/parse", post(api::parse_plan))
        .route("/api/plans/{plan_id}/enhancement", get(api::plan_enhancement))
        .route(
            "/api/plans/{plan_id}/days/{date}/enhance",
            post(api::enhance_day),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health))
        .route("/auth/strava/callback", get(auth::strava_callback))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(add_security_headers))
        .layer(cors_layer(&state.config.frontend_url))
        .with_state(state)
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let origin = frontend_url
        .parse::<HeaderValue>()
        .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:5173"));

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
