//! Session token verification.
//!
//! Tokens are minted by the external auth service and verified here:
//! `base64url(user_id:expires_unix) . base64url(hmac_sha256(payload, key))`.
//! This module can also sign tokens, which the auth service and the test
//! suite share.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use pith_core::{Error, Result};

use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Sign a session token for `user_id`, valid for `ttl_secs`.
pub fn sign_token(key: &str, user_id: Uuid, ttl_secs: u64) -> String {
    let expires = chrono::Utc::now().timestamp() + ttl_secs as i64;
    let payload = format!("{}:{}", user_id, expires);
    let tag = hmac_tag(key, &payload);
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(payload.as_bytes()),
        URL_SAFE_NO_PAD.encode(tag)
    )
}

/// Verify a session token and return the authenticated user id.
pub fn verify_token(key: &str, token: &str) -> Result<Uuid> {
    let (payload_b64, tag_b64) = token
        .split_once('.')
        .ok_or_else(|| Error::Unauthorized("malformed token".to_string()))?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| Error::Unauthorized("malformed token".to_string()))?;
    let payload =
        String::from_utf8(payload).map_err(|_| Error::Unauthorized("malformed token".to_string()))?;
    let tag = URL_SAFE_NO_PAD
        .decode(tag_b64)
        .map_err(|_| Error::Unauthorized("malformed token".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|_| Error::Unauthorized("invalid signing key".to_string()))?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&tag)
        .map_err(|_| Error::Unauthorized("invalid token signature".to_string()))?;

    let (user_id, expires) = payload
        .split_once(':')
        .ok_or_else(|| Error::Unauthorized("malformed token".to_string()))?;
    let expires: i64 = expires
        .parse()
        .map_err(|_| Error::Unauthorized("malformed token".to_string()))?;
    if expires < chrono::Utc::now().timestamp() {
        return Err(Error::Unauthorized("token expired".to_string()));
    }

    Uuid::parse_str(user_id).map_err(|_| Error::Unauthorized("malformed token".to_string()))
}

fn hmac_tag(key: &str, payload: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Authenticated user id, extracted from the `Authorization: Bearer` header.
pub struct AuthUser(pub Uuid);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = crate::handlers::ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::Unauthorized("missing Authorization header".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| Error::Unauthorized("expected Bearer token".to_string()))?;
        let user_id = verify_token(&state.session_signing_key, token)?;
        Ok(AuthUser(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips() {
        let user_id = Uuid::new_v4();
        let token = sign_token("secret", user_id, 3600);
        assert_eq!(verify_token("secret", &token).unwrap(), user_id);
    }

    #[test]
    fn wrong_key_is_rejected() {
        let token = sign_token("secret", Uuid::new_v4(), 3600);
        assert!(matches!(
            verify_token("other", &token),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let user_id = Uuid::new_v4();
        let token = sign_token("secret", user_id, 3600);
        let (_, tag) = token.split_once('.').unwrap();
        let forged_payload =
            URL_SAFE_NO_PAD.encode(format!("{}:{}", Uuid::new_v4(), i64::MAX).as_bytes());
        let forged = format!("{}.{}", forged_payload, tag);
        assert!(verify_token("secret", &forged).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let user_id = Uuid::new_v4();
        // Already expired: ttl of 0 with the timestamp strictly in the past.
        let expires = chrono::Utc::now().timestamp() - 10;
        let payload = format!("{}:{}", user_id, expires);
        let tag = hmac_tag("secret", &payload);
        let token = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(tag)
        );
        assert!(matches!(
            verify_token("secret", &token),
            Err(Error::Unauthorized(msg)) if msg.contains("expired")
        ));
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        assert!(verify_token("secret", "").is_err());
        assert!(verify_token("secret", "no-dot-here").is_err());
        assert!(verify_token("secret", "a.b").is_err());
    }
}
