//! Signed, time-limited tokens plus opaque verification tokens.
//!
//! Access and reset tokens are HS256 JWTs signed with **distinct** secrets:
//! a reset token that leaks through the weaker email channel can never be
//! replayed as a session token. Expiry is checked against the injected
//! clock with zero leeway so tests can drive it deterministically.

use anyhow::{Context, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, Rng};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::Clock;
use crate::domain::Role;
use crate::error::ApiError;

/// Claim bundle carried by an access token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub username: String,
    pub role: Role,
    pub email: String,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResetClaims {
    sub: String,
    exp: i64,
}

pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    reset_encoding: EncodingKey,
    reset_decoding: DecodingKey,
    access_ttl_minutes: i64,
    reset_ttl_minutes: i64,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    #[must_use]
    pub fn new(
        access_secret: &SecretString,
        reset_secret: &SecretString,
        access_ttl_minutes: i64,
        reset_ttl_minutes: i64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.expose_secret().as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.expose_secret().as_bytes()),
            reset_encoding: EncodingKey::from_secret(reset_secret.expose_secret().as_bytes()),
            reset_decoding: DecodingKey::from_secret(reset_secret.expose_secret().as_bytes()),
            access_ttl_minutes,
            reset_ttl_minutes,
            clock,
        }
    }

    pub fn issue_access_token(&self, username: &str, role: Role, email: &str) -> Result<String> {
        let exp = (self.clock.now() + chrono::Duration::minutes(self.access_ttl_minutes))
            .timestamp();
        let claims = AccessClaims {
            username: username.to_string(),
            role,
            email: email.to_string(),
            exp,
        };
        encode(&Header::default(), &claims, &self.access_encoding)
            .context("failed to sign access token")
    }

    /// Decode and validate an access token. Signature or claim-shape
    /// failures are `MalformedToken`; a good signature past `exp` is
    /// `TokenExpired`.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, ApiError> {
        let data = decode::<AccessClaims>(token, &self.access_decoding, &lenient_validation())
            .map_err(|_| ApiError::MalformedToken)?;
        if data.claims.exp < self.clock.now().timestamp() {
            return Err(ApiError::TokenExpired);
        }
        Ok(data.claims)
    }

    pub fn issue_reset_token(&self, email: &str) -> Result<String> {
        let exp =
            (self.clock.now() + chrono::Duration::minutes(self.reset_ttl_minutes)).timestamp();
        let claims = ResetClaims {
            sub: email.to_string(),
            exp,
        };
        encode(&Header::default(), &claims, &self.reset_encoding)
            .context("failed to sign reset token")
    }

    /// Return the subject email only for a valid, unexpired reset token.
    /// Every failure mode collapses to `None`; the caller treats it as an
    /// invalid token, never as a crash.
    #[must_use]
    pub fn verify_reset_token(&self, token: &str) -> Option<String> {
        let data = decode::<ResetClaims>(token, &self.reset_decoding, &lenient_validation()).ok()?;
        if data.claims.exp < self.clock.now().timestamp() {
            return None;
        }
        Some(data.claims.sub)
    }
}

/// Expiry is checked manually against the injected clock, so the library's
/// own wall-clock `exp` validation stays off.
fn lenient_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    validation
}

/// Cryptographically random alphanumeric string for email verification.
/// Not self-verifying: validity is a store lookup plus the stored expiry.
#[must_use]
pub fn generate_opaque_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{generate_opaque_token, TokenService};
    use crate::clock::ManualClock;
    use crate::domain::Role;
    use crate::error::ApiError;
    use chrono::{TimeZone, Utc};
    use secrecy::SecretString;
    use std::sync::Arc;

    fn service(clock: ManualClock) -> TokenService {
        TokenService::new(
            &SecretString::from("access-secret".to_string()),
            &SecretString::from("reset-secret".to_string()),
            3000,
            30,
            Arc::new(clock),
        )
    }

    fn clock_at_noon() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn access_token_round_trips_claims() {
        let tokens = service(clock_at_noon());
        let token = tokens
            .issue_access_token("amal", Role::Teacher, "amal@example.com")
            .unwrap();
        let claims = tokens.verify_access_token(&token).unwrap();
        assert_eq!(claims.username, "amal");
        assert_eq!(claims.role, Role::Teacher);
        assert_eq!(claims.email, "amal@example.com");
    }

    #[test]
    fn access_token_expires_with_the_clock() {
        let clock = clock_at_noon();
        let tokens = service(clock.clone());
        let token = tokens
            .issue_access_token("amal", Role::Teacher, "amal@example.com")
            .unwrap();
        clock.advance(chrono::Duration::minutes(3001));
        assert!(matches!(
            tokens.verify_access_token(&token),
            Err(ApiError::TokenExpired)
        ));
    }

    #[test]
    fn tampered_token_is_malformed() {
        let tokens = service(clock_at_noon());
        let mut token = tokens
            .issue_access_token("amal", Role::Teacher, "amal@example.com")
            .unwrap();
        token.push('x');
        assert!(matches!(
            tokens.verify_access_token(&token),
            Err(ApiError::MalformedToken)
        ));
    }

    #[test]
    fn reset_token_is_not_an_access_token() {
        let tokens = service(clock_at_noon());
        let reset = tokens.issue_reset_token("amal@example.com").unwrap();
        // Distinct secrets: a reset token must fail the access check.
        assert!(tokens.verify_access_token(&reset).is_err());
        // And the other way around.
        let access = tokens
            .issue_access_token("amal", Role::Teacher, "amal@example.com")
            .unwrap();
        assert!(tokens.verify_reset_token(&access).is_none());
    }

    #[test]
    fn reset_token_returns_subject_until_expiry() {
        let clock = clock_at_noon();
        let tokens = service(clock.clone());
        let token = tokens.issue_reset_token("amal@example.com").unwrap();
        assert_eq!(
            tokens.verify_reset_token(&token).as_deref(),
            Some("amal@example.com")
        );
        clock.advance(chrono::Duration::minutes(31));
        assert!(tokens.verify_reset_token(&token).is_none());
    }

    #[test]
    fn opaque_tokens_are_alphanumeric_and_sized() {
        let token = generate_opaque_token(40);
        assert_eq!(token.len(), 40);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_opaque_token(40));
    }
}
