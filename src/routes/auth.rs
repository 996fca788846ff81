// SPDX-License-Identifier: MIT

//! Strava OAuth endpoints.
//!
//! The callback always answers with a redirect back to the front end,
//! carrying a success or failure indicator in the query string. Returning
//! JSON here would strand the user's browser on the API origin.

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::services::audit::{self, RequestContext};
use crate::AppState;
use axum::extract::{Extension, Query, State};
use axum::http::HeaderMap;
use axum::response::Redirect;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    /// Front-end URL to return to after the flow completes.
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// `GET /auth/strava/connect`: issue a state token and redirect to the
/// provider's consent screen.
pub async fn strava_connect(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
) -> Result<Redirect, AppError> {
    let origin = params
        .redirect_uri
        .unwrap_or_else(|| state.config.frontend_url.clone());

    audit::connection_initiated(user.user_id, &origin, &request_context(&headers));

    state.db.ensure_profile(user.user_id).await?;

    let callback_url = format!("{}/auth/strava/callback", state.config.api_url);
    let authorize_url = state
        .strava_service
        .begin_connect(user.user_id, &origin, &callback_url)
        .await?;

    Ok(Redirect::temporary(&authorize_url))
}

/// `GET /auth/strava/callback`: run the callback state machine and
/// redirect the browser regardless of outcome.
pub async fn strava_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let outcome = state
        .strava_service
        .handle_callback(
            params.code.as_deref(),
            params.state.as_deref(),
            params.error.as_deref(),
        )
        .await;

    Redirect::temporary(&outcome.location())
}

fn request_context(headers: &HeaderMap) -> RequestContext {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    RequestContext {
        ip_address: header_str("x-forwarded-for"),
        user_agent: header_str("user-agent"),
    }
}
