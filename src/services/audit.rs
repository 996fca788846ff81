// SPDX-License-Identifier: MIT

//! Security audit events.
//!
//! Sensitive account operations emit structured log records under the
//! `security_audit` target so they can be filtered and shipped separately
//! from application logs. Token values are never logged.

use uuid::Uuid;

/// Context captured from the request that triggered the event.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// User started the provider connection flow.
pub fn connection_initiated(user_id: Uuid, origin: &str, ctx: &RequestContext) {
    tracing::info!(
        target: "security_audit",
        event = "oauth_connection_initiated",
        user_id = %user_id,
        origin,
        ip_address = ctx.ip_address.as_deref().unwrap_or("unknown"),
        user_agent = ctx.user_agent.as_deref().unwrap_or("unknown"),
        "OAuth connection initiated"
    );
}

/// Provider account successfully linked.
pub fn connection_established(user_id: Uuid, athlete_id: i64) {
    tracing::info!(
        target: "security_audit",
        event = "oauth_connection_established",
        user_id = %user_id,
        athlete_id,
        "OAuth connection established"
    );
}

/// Provider connection removed and derived data purged.
pub fn connection_revoked(user_id: Uuid) {
    tracing::info!(
        target: "security_audit",
        event = "oauth_connection_revoked",
        user_id = %user_id,
        "OAuth connection revoked"
    );
}

/// Callback rejected before any state change.
pub fn callback_rejected(reason: &str) {
    tracing::warn!(
        target: "security_audit",
        event = "oauth_callback_rejected",
        reason,
        "OAuth callback rejected"
    );
}
