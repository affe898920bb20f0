// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token issuance and verification (HS256 JWT).
//!
//! Tokens carry `{sub, iat, exp}` only. There is no revocation list: a
//! session ends when the token expires or the cookie is cleared.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::claims::SessionClaims;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Why a session token was not accepted.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session has expired")]
    Expired,

    /// Bad signature, malformed token, wrong algorithm or missing claims.
    #[error("session token is invalid")]
    Invalid,

    #[error("failed to sign session token: {0}")]
    Signing(String),
}

/// Signing and verification keys for session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    /// Session lifetime in seconds.
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Sign a session token for `user_id`, valid from now.
    pub fn sign(&self, user_id: &str) -> Result<String, SessionError> {
        self.sign_at(user_id, Utc::now().timestamp())
    }

    /// Sign a session token as if issued at `issued_at` (Unix seconds).
    pub fn sign_at(&self, user_id: &str, issued_at: i64) -> Result<String, SessionError> {
        let claims = SessionClaims {
            sub: user_id.to_string(),
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl_secs as i64),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| SessionError::Signing(e.to_string()))
    }

    /// Verify signature and expiry and return the claims.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data = decode::<SessionClaims>(token, &self.decoding, &validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid,
            },
        )?;

        if token_data.claims.sub.is_empty() {
            return Err(SessionError::Invalid);
        }

        Ok(token_data.claims)
    }
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
    const WEEK: u64 = 7 * 24 * 60 * 60;

    #[test]
    fn sign_then_verify_returns_user_id() {
        let keys = SessionKeys::new(SECRET, WEEK);
        let token = keys.sign("user_123").unwrap();

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "user_123");
        assert_eq!(claims.exp - claims.iat, WEEK as i64);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let keys = SessionKeys::new(SECRET, 3600);
        let two_hours_ago = Utc::now().timestamp() - 7200;
        let token = keys.sign_at("user_123", two_hours_ago).unwrap();

        assert_eq!(keys.verify(&token), Err(SessionError::Expired));
    }

    #[test]
    fn token_within_leeway_is_accepted() {
        let keys = SessionKeys::new(SECRET, 3600);
        // Expired 30 seconds ago, inside the 60 second leeway
        let issued = Utc::now().timestamp() - 3630;
        let token = keys.sign_at("user_123", issued).unwrap();

        assert!(keys.verify(&token).is_ok());
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let keys = SessionKeys::new(SECRET, WEEK);
        let other = SessionKeys::new(b"another-secret-another-secret-xx", WEEK);
        let token = other.sign("user_123").unwrap();

        assert_eq!(keys.verify(&token), Err(SessionError::Invalid));
    }

    #[test]
    fn tampered_payload_is_invalid() {
        let keys = SessionKeys::new(SECRET, WEEK);
        let token = keys.sign("user_123").unwrap();

        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let forged = keys.sign("user_999").unwrap();
        // Splice another user's payload under the original signature
        parts[1] = forged.split('.').nth(1).unwrap().to_string();
        let tampered = parts.join(".");

        assert_eq!(keys.verify(&tampered), Err(SessionError::Invalid));
    }

    #[test]
    fn garbage_is_invalid() {
        let keys = SessionKeys::new(SECRET, WEEK);
        assert_eq!(keys.verify("not-a-jwt"), Err(SessionError::Invalid));
        assert_eq!(keys.verify(""), Err(SessionError::Invalid));
    }

    #[test]
    fn debug_hides_keys() {
        let keys = SessionKeys::new(SECRET, WEEK);
        let debug = format!("{keys:?}");
        assert!(debug.contains("ttl_secs"));
        assert!(!debug.contains("0123456789abcdef"));
    }
}
