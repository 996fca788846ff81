// SPDX-License-Identifier: MIT

//! Strava OAuth and API client plus the token-lifecycle service.
//!
//! Handles:
//! - Authorization URL construction and state-token issuance
//! - The callback state machine (validate state, exchange code, persist)
//! - Token storage/refresh with at-rest encryption
//! - Disconnection and data purge

use crate::config::Config;
use crate::db::Db;
use crate::error::{AppError, StateTokenError};
use crate::models::StravaTokenRecord;
use crate::services::audit;
use crate::services::crypto::TokenCipher;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// OAuth scope requested on connect.
const STRAVA_SCOPE: &str = "activity:read_all";

/// Shared per-user refresh locks, preventing duplicate refresh calls.
pub type RefreshLocks = Arc<DashMap<Uuid, Arc<Mutex<()>>>>;

// ─────────────────────────────────────────────────────────────────────────────
// StravaClient - low-level HTTP wire calls
// ─────────────────────────────────────────────────────────────────────────────

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    api_base: String,
    oauth_base: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: "https://www.strava.com/api/v3".to_string(),
            oauth_base: "https://www.strava.com/oauth".to_string(),
            client_id,
            client_secret,
        }
    }

    /// Point the client at a different server (tests).
    pub fn with_base_url(mut self, base: &str) -> Self {
        self.api_base = format!("{}/api/v3", base);
        self.oauth_base = format!("{}/oauth", base);
        self
    }

    /// Build the provider authorization URL for a connect redirect.
    pub fn authorization_url(&self, callback_url: &str, state: &str) -> String {
        format!(
            "{}/authorize?client_id={}&response_type=code&redirect_uri={}&approval_prompt=force&scope={}&state={}",
            self.oauth_base,
            self.client_id,
            urlencoding::encode(callback_url),
            urlencoding::encode(STRAVA_SCOPE),
            state,
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token exchange request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Strava token exchange failed");
            return Err(AppError::StravaApi(format!(
                "Token exchange failed with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("Failed to parse token response: {}", e)))
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_base))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token refresh request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StravaApi(format!(
                "Token refresh failed with status {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("Failed to parse refresh response: {}", e)))
    }

    /// Deauthorize the application for a user.
    pub async fn deauthorize(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!("{}/deauthorize", self.oauth_base))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Deauthorization request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::StravaApi(format!(
                "Deauthorization failed with status {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Aggregate athlete stats (recent / year-to-date / all-time totals).
    pub async fn get_athlete_stats(
        &self,
        access_token: &str,
        athlete_id: i64,
    ) -> Result<StravaAthleteStats, AppError> {
        let url = format!("{}/athletes/{}/stats", self.api_base, athlete_id);
        self.get_json(&url, access_token, &[]).await
    }

    /// List activities (paginated), newest first, since `after`.
    pub async fn list_activities(
        &self,
        access_token: &str,
        after: i64, // Unix timestamp
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let url = format!("{}/athlete/activities", self.api_base);
        self.get_json(
            &url,
            access_token,
            &[
                ("after", after.to_string()),
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
            ],
        )
        .await
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Strava rate limit hit (429)");
            }
            return Err(AppError::StravaApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
    }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Relative expiry in seconds; the absolute expiry is computed locally
    pub expires_in: i64,
    pub athlete: StravaAthlete,
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: i64,
    #[serde(default)]
    pub firstname: Option<String>,
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub sport_type: Option<String>,
    #[serde(default, rename = "type")]
    pub activity_type: Option<String>,
    pub start_date: chrono::DateTime<Utc>,
    pub distance: f64,
    pub moving_time: i64,
    pub elapsed_time: i64,
    #[serde(default)]
    pub average_heartrate: Option<f64>,
    #[serde(default)]
    pub max_heartrate: Option<f64>,
    #[serde(default)]
    pub average_watts: Option<f64>,
    #[serde(default)]
    pub average_cadence: Option<f64>,
    #[serde(default)]
    pub kudos_count: i64,
    #[serde(default)]
    pub achievement_count: i64,
}

/// Aggregate totals for one period, as reported by Strava.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaTotals {
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub moving_time: i64,
    #[serde(default)]
    pub elevation_gain: f64,
}

/// Athlete stats payload (run totals only; ride/swim totals are ignored).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaAthleteStats {
    #[serde(default)]
    pub recent_run_totals: StravaTotals,
    #[serde(default)]
    pub ytd_run_totals: StravaTotals,
    #[serde(default)]
    pub all_run_totals: StravaTotals,
}

// ─────────────────────────────────────────────────────────────────────────────
// Callback state machine
// ─────────────────────────────────────────────────────────────────────────────

/// Terminal failure reasons for one callback request.
///
/// Every reason maps to exactly one redirect indicator, keeping the
/// internal-failure-to-redirect mapping exhaustive and testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackFailure {
    /// The user declined consent at the provider
    AccessDenied,
    /// Unknown state token
    InvalidState,
    /// State token was already consumed (replayed callback)
    StateReused,
    /// State token expired before the callback arrived
    StateExpired,
    /// Code exchange or token persistence failed
    ConnectionFailed,
}

impl CallbackFailure {
    /// Query-string indicator appended to the redirect URL.
    pub fn query_code(self) -> &'static str {
        match self {
            Self::AccessDenied => "access_denied",
            Self::InvalidState => "invalid_state",
            Self::StateReused => "state_reused",
            Self::StateExpired => "state_expired",
            Self::ConnectionFailed => "strava_connection_failed",
        }
    }
}

/// Outcome of one callback request: where to send the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Connected { redirect_url: String },
    Failed { redirect_url: String, reason: CallbackFailure },
}

impl CallbackOutcome {
    /// Full redirect target including the success/failure indicator.
    pub fn location(&self) -> String {
        match self {
            Self::Connected { redirect_url } => format!("{}?strava=connected", redirect_url),
            Self::Failed { redirect_url, reason } => {
                format!("{}?error={}", redirect_url, reason.query_code())
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StravaService - token lifecycle and OAuth flows
// ─────────────────────────────────────────────────────────────────────────────

/// High-level Strava service owning the token lifecycle.
#[derive(Clone)]
pub struct StravaService {
    client: StravaClient,
    db: Db,
    cipher: TokenCipher,
    /// Frontend origin used when a failed callback has no usable state
    fallback_redirect: String,
    /// Per-user mutex to serialize token refresh operations.
    refresh_locks: RefreshLocks,
}

impl StravaService {
    /// Create a new Strava service. Credentials come from [`Config`], not
    /// process-wide globals, so tests can construct isolated instances.
    pub fn new(config: &Config, db: Db, cipher: TokenCipher) -> Self {
        Self {
            client: StravaClient::new(
                config.strava_client_id.clone(),
                config.strava_client_secret.clone(),
            ),
            db,
            cipher,
            fallback_redirect: config.frontend_url.clone(),
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    /// Swap the underlying client (tests point it at a local server).
    pub fn with_client(mut self, client: StravaClient) -> Self {
        self.client = client;
        self
    }

    // ─── Connect flow ────────────────────────────────────────────────────────

    /// Begin the connect flow: issue a state token and build the provider
    /// authorization URL. The state write must succeed before any redirect.
    pub async fn begin_connect(
        &self,
        user_id: Uuid,
        frontend_origin: &str,
        callback_url: &str,
    ) -> Result<String, AppError> {
        let state = self.db.issue_state_token(user_id, frontend_origin).await?;
        Ok(self.client.authorization_url(callback_url, &state))
    }

    // ─── Callback state machine ──────────────────────────────────────────────

    /// Run the callback state machine for one inbound request.
    ///
    /// ReceivedCallback → StateValidated → CodeExchanged → TokensPersisted
    /// (connection flags update in the same transaction) → Redirected.
    /// Every early exit carries a distinct failure reason; the caller always
    /// answers with a redirect, never JSON.
    pub async fn handle_callback(
        &self,
        code: Option<&str>,
        state: Option<&str>,
        provider_error: Option<&str>,
    ) -> CallbackOutcome {
        // ReceivedCallback: provider-signalled denial is terminal before any
        // state lookup.
        if let Some(err) = provider_error {
            tracing::warn!(error = %err, "OAuth error from Strava");
            return CallbackOutcome::Failed {
                redirect_url: self.fallback_redirect.clone(),
                reason: CallbackFailure::AccessDenied,
            };
        }

        let (Some(code), Some(state)) = (code, state) else {
            tracing::warn!("Callback missing code or state parameter");
            return CallbackOutcome::Failed {
                redirect_url: self.fallback_redirect.clone(),
                reason: CallbackFailure::InvalidState,
            };
        };

        // StateValidated: single-use consumption; the failure kind decides
        // the redirect indicator.
        let consumed = match self.db.consume_state_token(state).await {
            Ok(c) => c,
            Err(AppError::StateToken(kind)) => {
                let reason = match kind {
                    StateTokenError::NotFound => CallbackFailure::InvalidState,
                    StateTokenError::AlreadyUsed => CallbackFailure::StateReused,
                    StateTokenError::Expired => CallbackFailure::StateExpired,
                };
                tracing::warn!(reason = ?reason, "State validation failed");
                audit::callback_rejected(reason.query_code());
                return CallbackOutcome::Failed {
                    redirect_url: self.fallback_redirect.clone(),
                    reason,
                };
            }
            Err(e) => {
                tracing::error!(error = %e, "State lookup failed");
                return CallbackOutcome::Failed {
                    redirect_url: self.fallback_redirect.clone(),
                    reason: CallbackFailure::ConnectionFailed,
                };
            }
        };

        // CodeExchanged
        let exchanged = match self.client.exchange_code(code).await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(error = %e, user_id = %consumed.user_id, "Code exchange failed");
                return CallbackOutcome::Failed {
                    redirect_url: consumed.redirect_url,
                    reason: CallbackFailure::ConnectionFailed,
                };
            }
        };

        // TokensPersisted + connection flags, one transaction
        if let Err(e) = self.persist_exchange(consumed.user_id, &exchanged).await {
            tracing::error!(error = %e, user_id = %consumed.user_id, "Token persistence failed");
            return CallbackOutcome::Failed {
                redirect_url: consumed.redirect_url,
                reason: CallbackFailure::ConnectionFailed,
            };
        }

        audit::connection_established(consumed.user_id, exchanged.athlete.id);

        // Redirected
        CallbackOutcome::Connected {
            redirect_url: consumed.redirect_url,
        }
    }

    /// Encrypt and store exchanged tokens, updating connection flags in the
    /// same transaction.
    async fn persist_exchange(
        &self,
        user_id: Uuid,
        exchanged: &TokenExchangeResponse,
    ) -> Result<(), AppError> {
        let record = StravaTokenRecord {
            user_id,
            access_token_encrypted: self.cipher.encode(&exchanged.access_token)?,
            refresh_token_encrypted: self.cipher.encode(&exchanged.refresh_token)?,
            expires_at: Utc::now() + Duration::seconds(exchanged.expires_in),
            updated_at: Utc::now(),
        };

        self.db
            .connect_strava_account(&record, exchanged.athlete.id)
            .await
    }

    // ─── Token vault ─────────────────────────────────────────────────────────

    /// Get a valid (non-expired) access token for the given user.
    ///
    /// Refreshes with Strava when the stored token is expired or expires
    /// within the margin. Refresh failures leave the stored record
    /// untouched and surface as [`AppError::RefreshFailed`] so the front
    /// end can prompt reconnection.
    pub async fn get_valid_access_token(&self, user_id: Uuid) -> Result<String, AppError> {
        // Serialize refreshes per user; a second task waits here and then
        // sees the refreshed row.
        let lock = self
            .refresh_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let record = self
            .db
            .get_strava_tokens(user_id)
            .await?
            .ok_or(AppError::NotConnected)?;

        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
        if Utc::now() + margin < record.expires_at {
            return self.cipher.decode(&record.access_token_encrypted);
        }

        tracing::info!(user_id = %user_id, "Access token expired, refreshing");

        let refresh_token = self.cipher.decode(&record.refresh_token_encrypted)?;
        let refreshed = match self.client.refresh_token(&refresh_token).await {
            Ok(t) => t,
            Err(e) => {
                // Stored tokens stay as-is; the caller must reconnect.
                return Err(AppError::RefreshFailed(e.to_string()));
            }
        };

        let updated = StravaTokenRecord {
            user_id,
            access_token_encrypted: self.cipher.encode(&refreshed.access_token)?,
            refresh_token_encrypted: self.cipher.encode(&refreshed.refresh_token)?,
            expires_at: Utc::now() + Duration::seconds(refreshed.expires_in),
            updated_at: Utc::now(),
        };
        self.db.upsert_strava_tokens(&updated).await?;

        tracing::info!(user_id = %user_id, "Token refreshed");
        Ok(refreshed.access_token)
    }

    // ─── Disconnect ──────────────────────────────────────────────────────────

    /// Disconnect the user's Strava account.
    ///
    /// Best-effort deauthorization at the provider, then an atomic local
    /// purge of flags, tokens, and imported data. Idempotent.
    pub async fn disconnect(&self, user_id: Uuid) -> Result<(), AppError> {
        if let Ok(Some(record)) = self.db.get_strava_tokens(user_id).await {
            match self.cipher.decode(&record.access_token_encrypted) {
                Ok(access_token) => {
                    if let Err(e) = self.client.deauthorize(&access_token).await {
                        tracing::warn!(error = %e, user_id = %user_id,
                            "Strava deauthorization failed, continuing with local purge");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, user_id = %user_id,
                        "Failed to decrypt token for deauthorization, continuing");
                }
            }
        }

        self.db.disconnect_strava_account(user_id).await?;
        audit::connection_revoked(user_id);
        Ok(())
    }

    /// Low-level client accessor for the importer.
    pub fn client(&self) -> &StravaClient {
        &self.client
    }

    /// Database handle shared with the importer.
    pub fn db(&self) -> &Db {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url_parameters() {
        let client = StravaClient::new("123".to_string(), "secret".to_string());
        let url = client.authorization_url("https://api.example.com/auth/strava/callback", "tok");

        assert!(url.starts_with("https://www.strava.com/oauth/authorize?"));
        assert!(url.contains("client_id=123"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("approval_prompt=force"));
        assert!(url.contains("scope=activity%3Aread_all"));
        assert!(url.contains("state=tok"));
        assert!(url.contains(&format!(
            "redirect_uri={}",
            urlencoding::encode("https://api.example.com/auth/strava/callback")
        )));
    }

    #[test]
    fn test_failure_reasons_map_to_distinct_codes() {
        let reasons = [
            CallbackFailure::AccessDenied,
            CallbackFailure::InvalidState,
            CallbackFailure::StateReused,
            CallbackFailure::StateExpired,
            CallbackFailure::ConnectionFailed,
        ];
        let codes: std::collections::HashSet<_> =
            reasons.iter().map(|r| r.query_code()).collect();
        assert_eq!(codes.len(), reasons.len());
    }

    #[test]
    fn test_callback_outcome_locations() {
        let ok = CallbackOutcome::Connected {
            redirect_url: "https://app.example.com".to_string(),
        };
        assert_eq!(ok.location(), "https://app.example.com?strava=connected");

        let denied = CallbackOutcome::Failed {
            redirect_url: "https://app.example.com".to_string(),
            reason: CallbackFailure::StateReused,
        };
        assert_eq!(denied.location(), "https://app.example.com?error=state_reused");
    }
}
