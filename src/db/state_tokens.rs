// SPDX-License-Identifier: MIT

//! Single-use OAuth state-token store.
//!
//! A state token binds a user and a return URL to one in-flight OAuth
//! handshake. Tokens expire after a few minutes and are consumable exactly
//! once; consumed tokens are kept for audit rather than deleted.

use super::Db;
use crate::error::{AppError, StateTokenError};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sqlx::Row;
use uuid::Uuid;

/// How long an issued state token stays valid.
const STATE_TOKEN_TTL_MINUTES: i64 = 10;

/// Identity and return destination bound to a consumed state token.
#[derive(Debug, Clone)]
pub struct ConsumedState {
    pub user_id: Uuid,
    pub redirect_url: String,
}

impl Db {
    /// Issue a new state token for an OAuth handshake.
    ///
    /// The caller must not redirect the browser unless this write
    /// succeeded.
    pub async fn issue_state_token(
        &self,
        user_id: Uuid,
        redirect_url: &str,
    ) -> Result<String, AppError> {
        let token = generate_state_token();
        let now = Utc::now();
        let expires_at = now + Duration::minutes(STATE_TOKEN_TTL_MINUTES);

        sqlx::query(
            "INSERT INTO oauth_state_tokens (token, user_id, redirect_url, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&token)
        .bind(user_id.to_string())
        .bind(redirect_url)
        .bind(now)
        .bind(expires_at)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::Database(format!("Failed to store state token: {}", e)))?;

        Ok(token)
    }

    /// Validate a state token and mark it used, atomically.
    ///
    /// Only one concurrent caller for the same token value can win; all
    /// others observe [`StateTokenError::AlreadyUsed`]. Expired tokens fail
    /// with [`StateTokenError::Expired`] regardless of whether they were
    /// consumed.
    pub async fn consume_state_token(&self, token: &str) -> Result<ConsumedState, AppError> {
        let row = sqlx::query(
            "SELECT user_id, redirect_url, expires_at, used_at
             FROM oauth_state_tokens WHERE token = ?1",
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::Database(format!("Failed to load state token: {}", e)))?
        .ok_or(AppError::StateToken(StateTokenError::NotFound))?;

        let expires_at: DateTime<Utc> = row
            .try_get("expires_at")
            .map_err(|e| AppError::Database(e.to_string()))?;
        if Utc::now() > expires_at {
            return Err(AppError::StateToken(StateTokenError::Expired));
        }

        let used_at: Option<DateTime<Utc>> = row
            .try_get("used_at")
            .map_err(|e| AppError::Database(e.to_string()))?;
        if used_at.is_some() {
            return Err(AppError::StateToken(StateTokenError::AlreadyUsed));
        }

        // The conditional UPDATE is the actual consumption point; the reads
        // above only classify the failure. Zero rows affected here means a
        // concurrent caller won the race.
        let result = sqlx::query(
            "UPDATE oauth_state_tokens SET used_at = ?1 WHERE token = ?2 AND used_at IS NULL",
        )
        .bind(Utc::now())
        .bind(token)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::Database(format!("Failed to consume state token: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::StateToken(StateTokenError::AlreadyUsed));
        }

        let user_id_raw: String = row
            .try_get("user_id")
            .map_err(|e| AppError::Database(e.to_string()))?;
        let user_id = Uuid::parse_str(&user_id_raw)
            .map_err(|e| AppError::Database(format!("Corrupt user_id in state token: {}", e)))?;
        let redirect_url: String = row
            .try_get("redirect_url")
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(ConsumedState {
            user_id,
            redirect_url,
        })
    }
}

/// Generate a cryptographically random, URL-safe opaque token.
fn generate_state_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_tokens_are_unique_and_url_safe() {
        let a = generate_state_token();
        let b = generate_state_token();

        assert_ne!(a, b);
        assert!(!a.contains('+'));
        assert!(!a.contains('/'));
        assert!(!a.contains('='));
        assert_eq!(a.len(), 43); // 32 bytes, unpadded base64
    }

    #[tokio::test]
    async fn test_state_token_consumed_exactly_once() {
        let db = Db::connect_in_memory().await.unwrap();
        let user_id = Uuid::new_v4();

        let token = db
            .issue_state_token(user_id, "http://localhost:5173")
            .await
            .unwrap();

        let consumed = db.consume_state_token(&token).await.unwrap();
        assert_eq!(consumed.user_id, user_id);
        assert_eq!(consumed.redirect_url, "http://localhost:5173");

        let second = db.consume_state_token(&token).await;
        assert!(matches!(
            second,
            Err(AppError::StateToken(StateTokenError::AlreadyUsed))
        ));
    }

    #[tokio::test]
    async fn test_unknown_state_token_not_found() {
        let db = Db::connect_in_memory().await.unwrap();
        let result = db.consume_state_token("no-such-token").await;
        assert!(matches!(
            result,
            Err(AppError::StateToken(StateTokenError::NotFound))
        ));
    }

    #[tokio::test]
    async fn test_expired_state_token_rejected() {
        let db = Db::connect_in_memory().await.unwrap();
        let token = db
            .issue_state_token(Uuid::new_v4(), "http://localhost:5173")
            .await
            .unwrap();

        // Backdate the expiry.
        sqlx::query("UPDATE oauth_state_tokens SET expires_at = ?1 WHERE token = ?2")
            .bind(Utc::now() - Duration::minutes(1))
            .bind(&token)
            .execute(db.pool())
            .await
            .unwrap();

        let result = db.consume_state_token(&token).await;
        assert!(matches!(
            result,
            Err(AppError::StateToken(StateTokenError::Expired))
        ));

        // Expiry wins even for tokens that were also consumed.
        sqlx::query("UPDATE oauth_state_tokens SET used_at = ?1 WHERE token = ?2")
            .bind(Utc::now())
            .bind(&token)
            .execute(db.pool())
            .await
            .unwrap();

        let result = db.consume_state_token(&token).await;
        assert!(matches!(
            result,
            Err(AppError::StateToken(StateTokenError::Expired))
        ));
    }
}
