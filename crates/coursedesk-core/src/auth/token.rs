//! Bearer token claim decoding.
//!
//! Tokens are JWTs issued by the auth service. Only the payload is read, for
//! local expiry bookkeeping; the signature is never checked and the issuer is
//! trusted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;

use super::TokenError;

/// Claims read from an access token payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenClaims {
    pub expires_at: i64,
    pub issued_at: i64,
    pub subject_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    exp: i64,
    iat: i64,
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    sub: Option<serde_json::Value>,
}

impl TokenClaims {
    /// True when the token expires before `now + skew`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.expires_at < (now + skew).timestamp()
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expires_at, 0).single()
    }

    /// Seconds left before the token expires, ignoring any skew buffer
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        self.expires_at - now.timestamp()
    }
}

/// Decode a `header.payload.signature` token into its claims.
pub fn decode(token: &str) -> Result<TokenClaims, TokenError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(TokenError::Malformed(format!(
            "expected 3 parts, found {}",
            parts.len()
        )));
    }

    let payload = parts[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| TokenError::Malformed(format!("payload is not base64url: {}", e)))?;

    let raw: RawClaims = serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::Malformed(format!("payload is not valid claims JSON: {}", e)))?;

    // `id` is what the auth service issues; fall back to a numeric `sub`
    let subject_id = raw.id.or_else(|| match raw.sub {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    });

    Ok(TokenClaims {
        expires_at: raw.exp,
        issued_at: raw.iat,
        subject_id,
    })
}

/// Build an unsigned token carrying the given payload. Test helper.
#[cfg(test)]
pub(crate) fn encode_unsigned(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{}.{}.signature", header, body)
}

/// Token for user `id` expiring `expires_in_secs` from now. Test helper.
#[cfg(test)]
pub(crate) fn token_expiring_in(id: i64, expires_in_secs: i64) -> String {
    let now = Utc::now().timestamp();
    encode_unsigned(&serde_json::json!({
        "id": id,
        "username": "emilys",
        "iat": now,
        "exp": now + expires_in_secs,
    }))
}
