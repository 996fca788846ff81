// SPDX-License-Identifier: MIT

//! Application configuration loaded from environment variables.
//!
//! All secrets are read once at startup and threaded explicitly through
//! service constructors; nothing reads the environment after boot.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// Public base URL of this API (used to build the OAuth callback URI)
    pub api_url: String,
    /// SQLite database URL
    pub database_url: String,
    /// Server port
    pub port: u16,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// 32-byte key for AES-256-GCM token encryption at rest
    pub token_encryption_key: [u8; 32],
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            api_url: env::var("API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:stride_tracker.db".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            token_encryption_key: parse_encryption_key(
                &env::var("TOKEN_ENCRYPTION_KEY")
                    .map_err(|_| ConfigError::Missing("TOKEN_ENCRYPTION_KEY"))?,
            )?,
        })
    }

    /// Default config for tests only.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            api_url: "http://localhost:8080".to_string(),
            database_url: "sqlite::memory:".to_string(),
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            token_encryption_key: [7u8; 32],
        }
    }
}

/// Parse a hex-encoded 32-byte AES key.
fn parse_encryption_key(raw: &str) -> Result<[u8; 32], ConfigError> {
    let raw = raw.trim();
    if raw.len() != 64 || !raw.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ConfigError::Invalid(
            "TOKEN_ENCRYPTION_KEY must be 64 hex characters (32 bytes)",
        ));
    }

    let mut key = [0u8; 32];
    for (i, byte) in key.iter_mut().enumerate() {
        // Slicing is safe: length and charset were validated above
        *byte = u8::from_str_radix(&raw[i * 2..i * 2 + 2], 16)
            .map_err(|_| ConfigError::Invalid("TOKEN_ENCRYPTION_KEY is not valid hex"))?;
    }
    Ok(key)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration value: {0}")]
    Invalid(&'static str),
}
