// SPDX-License-Identifier: MIT

//! User profile and provider token models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User profile row, including Strava connection flags.
///
/// The connection flags must stay consistent with the presence of a
/// [`StravaTokenRecord`]: both are written inside one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    /// Display name (collected during onboarding)
    pub display_name: Option<String>,
    /// Whether a Strava account is currently linked
    pub strava_connected: bool,
    /// Strava athlete ID, set when connected
    pub strava_athlete_id: Option<i64>,
    /// When the Strava account was linked
    pub strava_connected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Encrypted Strava OAuth tokens for one user.
///
/// At most one live row per user. Token fields hold AES-256-GCM
/// ciphertext, base64-encoded; see `services::crypto::TokenCipher`.
#[derive(Debug, Clone)]
pub struct StravaTokenRecord {
    pub user_id: Uuid,
    pub access_token_encrypted: String,
    pub refresh_token_encrypted: String,
    /// Absolute expiry of the access token
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
