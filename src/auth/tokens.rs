use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims embedded in every bearer token issued by the server.
///
/// Tokens are stateless: there is no server-side session row, so validity is
/// purely a function of the HMAC signature and the `exp` claim.  Rotating
/// the signing secret therefore invalidates every outstanding token at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Standard JWT subject — set to the user's email.
    pub sub: String,

    /// Issued-at (Unix timestamp, seconds).
    pub iat: i64,

    /// Standard JWT expiry (Unix timestamp, seconds).
    /// Always `iat` + the configured lifetime (30 minutes by default).
    pub exp: i64,
}

#[derive(Error, Debug)]
pub enum TokenError {
    /// The token could not be parsed or its signature did not verify.
    /// Expiry is deliberately NOT part of this — see [`TokenService::validate`].
    #[error("malformed or unverifiable token: {0}")]
    Malformed(#[source] jsonwebtoken::errors::Error),

    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Issues and verifies HS256-signed bearer tokens.
///
/// The secret is process-wide immutable configuration injected at startup;
/// cloning this shares the same key material.
#[derive(Clone)]
pub struct TokenService {
    secret: Arc<String>,
    expiry_minutes: u64,
}

impl TokenService {
    pub fn new(secret: impl Into<String>, expiry_minutes: u64) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            expiry_minutes,
        }
    }

    /// Sign a token for `subject` expiring `expiry_minutes` from now.
    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        self.issue_at(subject, unix_now())
    }

    /// Clock-injected variant of [`issue`](Self::issue) — the only way to
    /// mint a token with a past `iat` (expiry tests depend on this).
    pub fn issue_at(&self, subject: &str, now: i64) -> Result<String, TokenError> {
        let claims = JwtClaims {
            sub: subject.to_string(),
            iat: now,
            exp: now + (self.expiry_minutes * 60) as i64,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(TokenError::Signing)
    }

    /// Extract the subject from a token, verifying structure and signature
    /// but NOT expiry.  An expired-but-well-signed token still yields its
    /// subject; whether it is *usable* is answered by [`validate`](Self::validate).
    pub fn extract_subject(&self, token: &str) -> Result<String, TokenError> {
        Ok(self.decode_claims(token)?.sub)
    }

    /// Full check: signature verifies, subject matches, and the token has
    /// not expired against the wall clock.  No clock-skew leeway.
    pub fn validate(&self, token: &str, expected_subject: &str) -> bool {
        self.validate_at(token, expected_subject, unix_now())
    }

    /// Clock-injected variant of [`validate`](Self::validate).
    pub fn validate_at(&self, token: &str, expected_subject: &str, now: i64) -> bool {
        match self.decode_claims(token) {
            Ok(claims) => claims.sub == expected_subject && claims.exp >= now,
            Err(_) => false,
        }
    }

    /// Token lifetime in seconds — for `expires_in` response fields.
    pub fn expiry_secs(&self) -> u64 {
        self.expiry_minutes * 60
    }

    fn decode_claims(&self, token: &str) -> Result<JwtClaims, TokenError> {
        // Expiry is checked by `validate_at` against an explicit clock, so
        // the library's own exp check (which adds 60s of leeway) is off.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        decode::<JwtClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(TokenError::Malformed)
    }
}

/// Current Unix timestamp in seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn service() -> TokenService {
        TokenService::new(SECRET, 30)
    }

    #[test]
    fn issue_then_extract_round_trips_subject() {
        let svc = service();
        let token = svc.issue("alice@example.com").unwrap();
        assert_eq!(svc.extract_subject(&token).unwrap(), "alice@example.com");
    }

    #[test]
    fn fresh_token_validates_for_its_subject() {
        let svc = service();
        let token = svc.issue("alice@example.com").unwrap();
        assert!(svc.validate(&token, "alice@example.com"));
    }

    #[test]
    fn token_does_not_validate_for_a_different_subject() {
        let svc = service();
        let token = svc.issue("alice@example.com").unwrap();
        assert!(!svc.validate(&token, "bob@example.com"));
    }

    #[test]
    fn token_expires_after_thirty_one_minutes() {
        let svc = service();
        let issued = unix_now();
        let token = svc.issue_at("alice@example.com", issued).unwrap();

        // Still valid just inside the lifetime...
        assert!(svc.validate_at(&token, "alice@example.com", issued + 29 * 60));
        // ...rejected past it, even though the subject is correct.
        assert!(!svc.validate_at(&token, "alice@example.com", issued + 31 * 60));
    }

    #[test]
    fn expired_token_still_yields_its_subject() {
        let svc = service();
        let issued = unix_now() - 3600;
        let token = svc.issue_at("alice@example.com", issued).unwrap();
        assert_eq!(svc.extract_subject(&token).unwrap(), "alice@example.com");
        assert!(!svc.validate(&token, "alice@example.com"));
    }

    #[test]
    fn garbage_token_is_malformed() {
        let svc = service();
        assert!(matches!(
            svc.extract_subject("not-a-jwt"),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn token_signed_with_another_secret_is_malformed() {
        let svc = service();
        let other = TokenService::new("ffffffffffffffffffffffffffffffff", 30);
        let token = other.issue("alice@example.com").unwrap();
        assert!(matches!(
            svc.extract_subject(&token),
            Err(TokenError::Malformed(_))
        ));
        assert!(!svc.validate(&token, "alice@example.com"));
    }

    #[test]
    fn tampered_payload_is_malformed() {
        let svc = service();
        let token = svc.issue("alice@example.com").unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        parts[1] = format!("{}AA", parts[1]);
        let tampered = parts.join(".");
        assert!(svc.extract_subject(&tampered).is_err());
    }
}
