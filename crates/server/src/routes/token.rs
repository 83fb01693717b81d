// crates/server/src/routes/token.rs
//! Session token issuance.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct IssueTokenRequest {
    /// Optional client label, logged for debugging; never encoded into
    /// the token.
    pub client_hint: Option<String>,
    /// Optional TTL override in seconds.
    pub ttl_s: Option<u64>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct IssueTokenResponse {
    pub session_id: String,
    pub token: String,
    /// Expiry as unix seconds.
    pub expires_at: i64,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

/// POST /api/token — issue a fresh signed session token.
///
/// Tokens are self-contained and cannot be revoked: validity is purely
/// signature + expiry.
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    request: Option<Json<IssueTokenRequest>>,
) -> Json<IssueTokenResponse> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let session_id = Uuid::new_v4().to_string();
    let ttl = request
        .ttl_s
        .map(Duration::from_secs)
        .unwrap_or_else(|| state.authority.default_ttl());

    let token = state.authority.issue(&session_id, ttl);
    let expires_in = ttl.as_secs();
    let expires_at = Utc::now().timestamp() + expires_in as i64;

    tracing::info!(
        session_id = %session_id,
        client_hint = ?request.client_hint,
        expires_in,
        "issued session token"
    );

    Json(IssueTokenResponse {
        session_id,
        token,
        expires_at,
        expires_in,
    })
}

/// Create the token routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/token", post(issue_token))
}
