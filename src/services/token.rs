use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// Claims bound into a self-service link. Nothing is persisted server-side;
/// the token is the whole credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub booking_id: String,
    pub email: String,
    pub expires_at: i64,
}

/// Single opaque failure for malformed, tampered and expired tokens alike,
/// so the response gives no oracle about which check tripped.
#[derive(Debug, PartialEq, Eq)]
pub struct TokenError;

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid or expired")
    }
}

impl std::error::Error for TokenError {}

/// URL-safe bearer token: `base64url(claims).base64url(hmac_sha256(claims))`.
pub fn issue(secret: &str, booking_id: &str, email: &str, ttl: Duration) -> String {
    issue_at(secret, booking_id, email, ttl, Utc::now().timestamp())
}

pub fn validate(secret: &str, token: &str) -> Result<TokenClaims, TokenError> {
    validate_at(secret, token, Utc::now().timestamp())
}

fn issue_at(secret: &str, booking_id: &str, email: &str, ttl: Duration, now: i64) -> String {
    let claims = serde_json::json!({
        "booking_id": booking_id,
        "email": email,
        "expires_at": now + ttl.num_seconds(),
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    let tag = URL_SAFE_NO_PAD.encode(sign(secret, payload.as_bytes()));
    format!("{payload}.{tag}")
}

fn validate_at(secret: &str, token: &str, now: i64) -> Result<TokenClaims, TokenError> {
    let (payload_b64, tag_b64) = token.split_once('.').ok_or(TokenError)?;
    let tag = URL_SAFE_NO_PAD.decode(tag_b64).map_err(|_| TokenError)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| TokenError)?;
    mac.update(payload_b64.as_bytes());
    // Constant-time comparison.
    mac.verify_slice(&tag).map_err(|_| TokenError)?;

    let payload = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| TokenError)?;
    let claims: TokenClaims = serde_json::from_slice(&payload).map_err(|_| TokenError)?;

    if now > claims.expires_at {
        return Err(TokenError);
    }
    Ok(claims)
}

fn sign(secret: &str, payload: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}
