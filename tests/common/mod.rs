// SPDX-License-Identifier: MIT

//! Shared test harness: an app wired to an in-memory database and a
//! provider client pointed at an unroutable address so nothing leaves
//! the machine.

use std::sync::Arc;
use stride_tracker::config::Config;
use stride_tracker::db::Db;
use stride_tracker::middleware::auth::create_jwt;
use stride_tracker::services::{
    ImportService, PlanService, StravaClient, StravaService, TokenCipher,
};
use stride_tracker::AppState;
use uuid::Uuid;

pub async fn test_state() -> Arc<AppState> {
    let config = Config::test_default();
    let db = Db::connect_in_memory().await.expect("in-memory db");
    let cipher = TokenCipher::new(config.token_encryption_key);

    let client = StravaClient::new("test_client_id".to_string(), "test_secret".to_string())
        .with_base_url("http://127.0.0.1:9");
    let strava_service = StravaService::new(&config, db.clone(), cipher).with_client(client);
    let import_service = ImportService::new(strava_service.clone(), db.clone());
    let plan_service = PlanService::new(db.clone());

    Arc::new(AppState {
        config,
        db,
        strava_service,
        import_service,
        plan_service,
    })
}

/// `Authorization` header value for a signed-in user.
pub fn bearer(state: &AppState, user_id: Uuid) -> String {
    let token = create_jwt(user_id, &state.config.jwt_signing_key).expect("jwt");
    format!("Bearer {}", token)
}
