// crates/core/src/token.rs
//! HMAC-signed session tokens.
//!
//! A token is `base64url(payload) + "." + base64url(signature)` where the
//! payload is compact JSON `{"sid": ..., "exp": ...}` and the signature is
//! HMAC-SHA256 over the payload bytes under the process secret. Tokens are
//! self-contained: verification needs no server-side session table, which
//! also means there is no revocation — once issued, a token stays valid
//! until its encoded expiry.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime: one hour.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Verified token payload.
///
/// Field order matters: `issue` serializes this struct directly, so the
/// signed bytes are deterministic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    /// Owning session id.
    pub sid: String,
    /// Expiry as unix seconds.
    pub exp: i64,
}

/// Issues and verifies session tokens. Stateless apart from the secret,
/// which is read-only after startup.
pub struct TokenAuthority {
    secret: Vec<u8>,
    default_ttl: Duration,
}

impl TokenAuthority {
    pub fn new(secret: impl Into<Vec<u8>>, default_ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issue a token for `session_id` expiring `ttl` from now.
    pub fn issue(&self, session_id: &str, ttl: Duration) -> String {
        let claims = TokenClaims {
            sid: session_id.to_string(),
            exp: Utc::now().timestamp() + ttl.as_secs() as i64,
        };
        self.issue_claims(&claims)
    }

    fn issue_claims(&self, claims: &TokenClaims) -> String {
        let payload = serde_json::to_vec(claims).expect("claims serialize to JSON");
        let sig = self.sign(&payload);
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(sig)
        )
    }

    /// Verify a token: structure, signature (constant time), expiry, then
    /// payload shape, in that order.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let (payload_b64, sig_b64) = token.split_once('.').ok_or(AuthError::InvalidFormat)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::InvalidFormat)?;
        let sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| AuthError::InvalidFormat)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key size");
        mac.update(&payload);
        mac.verify_slice(&sig)
            .map_err(|_| AuthError::InvalidSignature)?;

        let value: serde_json::Value =
            serde_json::from_slice(&payload).map_err(|_| AuthError::MalformedPayload)?;
        let exp = value.get("exp").and_then(|v| v.as_i64()).unwrap_or(0);
        if exp < Utc::now().timestamp() {
            return Err(AuthError::Expired);
        }
        let sid = value
            .get("sid")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::MalformedPayload)?;

        Ok(TokenClaims {
            sid: sid.to_string(),
            exp,
        })
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key size");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}
