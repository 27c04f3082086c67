//! Account lifecycle: signup with email verification, signin, password
//! reset. The per-user state machine is one-way: `unverified(token, expiry)`
//! becomes `verified`, never the reverse.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::warn;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::tokens::{generate_opaque_token, TokenService};
use crate::clock::Clock;
use crate::domain::{Role, User};
use crate::email::{reset_email, verification_email, EmailSender};
use crate::error::ApiError;
use crate::store::UserStore;

const OPAQUE_TOKEN_LENGTH: usize = 40;

pub struct AccountService {
    users: Arc<dyn UserStore>,
    tokens: Arc<TokenService>,
    mailer: Arc<dyn EmailSender>,
    clock: Arc<dyn Clock>,
    verification_expire_hours: i64,
    base_url: String,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<TokenService>,
        mailer: Arc<dyn EmailSender>,
        clock: Arc<dyn Clock>,
        verification_expire_hours: i64,
        base_url: String,
    ) -> Self {
        Self {
            users,
            tokens,
            mailer,
            clock,
            verification_expire_hours,
            base_url,
        }
    }

    /// Register a new user as unverified and send the verification link.
    /// Never hands out a session token: email confirmation comes first.
    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Role,
        birthday: Option<NaiveDate>,
    ) -> Result<(), ApiError> {
        if self.users.exists_username_or_email(username, email).await? {
            return Err(ApiError::DuplicateIdentity);
        }

        let password_hash = hash_password(password)
            .map_err(|err| ApiError::Store(anyhow::anyhow!("password hashing failed: {err}")))?;
        let token = generate_opaque_token(OPAQUE_TOKEN_LENGTH);
        let expiry = self.clock.now() + chrono::Duration::hours(self.verification_expire_hours);

        self.users
            .insert(User {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                role,
                birthday,
                verified: false,
                verification_token: Some(token.clone()),
                verification_expiry: Some(expiry),
            })
            .await?;

        let (subject, body) = verification_email(&self.base_url, username, email, &token);
        if let Err(err) = self.mailer.send(&subject, &body, email) {
            // Delivery is fire-and-forget; the resend flow covers lost mail.
            warn!("failed to send verification email: {err:#}");
        }

        Ok(())
    }

    /// Consume an opaque verification token. Expired tokens are rejected,
    /// not auto-deleted: the user must request a resend.
    pub async fn verify_email(&self, token: &str) -> Result<(), ApiError> {
        let user = self
            .users
            .find_by_verification_token(token)
            .await?
            .ok_or(ApiError::InvalidToken)?;

        if let Some(expiry) = user.verification_expiry {
            if self.clock.now() > expiry {
                return Err(ApiError::VerificationExpired);
            }
        }

        self.users.mark_verified(&user.username).await?;
        Ok(())
    }

    /// Mint a fresh token + expiry, overwriting (and thereby invalidating)
    /// the previous pair, and resend the email.
    pub async fn resend_verification(&self, email: &str) -> Result<(), ApiError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(ApiError::UserNotFound)?;
        if user.verified {
            return Err(ApiError::AlreadyVerified);
        }

        let token = generate_opaque_token(OPAQUE_TOKEN_LENGTH);
        let expiry = self.clock.now() + chrono::Duration::hours(self.verification_expire_hours);
        self.users.set_verification(email, &token, expiry).await?;

        let (subject, body) = verification_email(&self.base_url, &user.username, email, &token);
        if let Err(err) = self.mailer.send(&subject, &body, email) {
            warn!("failed to resend verification email: {err:#}");
        }

        Ok(())
    }

    /// Authenticate and return an access token. Unknown user and wrong
    /// password produce the identical error so neither leaks existence.
    pub async fn signin(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(ApiError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            return Err(ApiError::InvalidCredentials);
        }
        if !user.verified {
            return Err(ApiError::EmailNotVerified);
        }

        self.tokens
            .issue_access_token(&user.username, user.role, &user.email)
            .map_err(ApiError::Store)
    }

    /// Issue a reset token and email it. The token itself carries validity;
    /// the user record is untouched.
    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(ApiError::UserNotFound)?;

        let token = self
            .tokens
            .issue_reset_token(&user.email)
            .map_err(ApiError::Store)?;
        let (subject, body) = reset_email(&self.base_url, &user.username, &token);
        if let Err(err) = self.mailer.send(&subject, &body, &user.email) {
            warn!("failed to send reset email: {err:#}");
        }

        Ok(())
    }

    /// Verify the reset token and overwrite the password hash. The token
    /// stays replayable until it expires; its TTL bounds the window.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ApiError> {
        let email = self
            .tokens
            .verify_reset_token(token)
            .ok_or(ApiError::InvalidOrExpiredToken)?;

        if self.users.find_by_email(&email).await?.is_none() {
            return Err(ApiError::UserNotFound);
        }

        let password_hash = hash_password(new_password)
            .map_err(|err| ApiError::Store(anyhow::anyhow!("password hashing failed: {err}")))?;
        self.users.update_password(&email, &password_hash).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::AccountService;
    use crate::auth::tokens::TokenService;
    use crate::clock::ManualClock;
    use crate::domain::Role;
    use crate::email::RecordingEmailSender;
    use crate::error::ApiError;
    use crate::store::{MemoryUserStore, UserStore};
    use chrono::{TimeZone, Utc};
    use secrecy::SecretString;
    use std::sync::Arc;

    struct Harness {
        service: AccountService,
        users: Arc<MemoryUserStore>,
        mailer: Arc<RecordingEmailSender>,
        clock: ManualClock,
    }

    fn harness() -> Harness {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap());
        let users = Arc::new(MemoryUserStore::new());
        let mailer = Arc::new(RecordingEmailSender::new());
        let tokens = Arc::new(TokenService::new(
            &SecretString::from("access".to_string()),
            &SecretString::from("reset".to_string()),
            3000,
            60,
            Arc::new(clock.clone()),
        ));
        let service = AccountService::new(
            users.clone(),
            tokens,
            mailer.clone(),
            Arc::new(clock.clone()),
            2,
            "https://maram.example".to_string(),
        );
        Harness {
            service,
            users,
            mailer,
            clock,
        }
    }

    async fn signup_amal(harness: &Harness) {
        harness
            .service
            .signup("amal", "amal@example.com", "s3cret", Role::Teacher, None)
            .await
            .unwrap();
    }

    fn stored_token(harness: &Harness) -> String {
        let email = harness.mailer.last().unwrap();
        // Pull the opaque token out of the verification link.
        let marker = "verify-email?token=";
        let start = email.body.find(marker).unwrap() + marker.len();
        email.body[start..start + 40].to_string()
    }

    #[tokio::test]
    async fn signup_persists_unverified_and_emails_a_token() {
        let harness = harness();
        signup_amal(&harness).await;

        let user = harness
            .users
            .find_by_username("amal")
            .await
            .unwrap()
            .unwrap();
        assert!(!user.verified);
        assert_eq!(user.verification_token.as_deref().map(str::len), Some(40));
        assert!(user.verification_expiry.is_some());

        let token = stored_token(&harness);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(user.verification_token.as_deref(), Some(token.as_str()));
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_rejected() {
        let harness = harness();
        signup_amal(&harness).await;

        let same_username = harness
            .service
            .signup("amal", "other@example.com", "x", Role::Teacher, None)
            .await;
        assert!(matches!(same_username, Err(ApiError::DuplicateIdentity)));

        let same_email = harness
            .service
            .signup("other", "amal@example.com", "x", Role::Teacher, None)
            .await;
        assert!(matches!(same_email, Err(ApiError::DuplicateIdentity)));
    }

    #[tokio::test]
    async fn signin_distinguishes_bad_password_from_unverified() {
        let harness = harness();
        signup_amal(&harness).await;

        assert!(matches!(
            harness.service.signin("amal", "wrong").await,
            Err(ApiError::InvalidCredentials)
        ));
        assert!(matches!(
            harness.service.signin("amal", "s3cret").await,
            Err(ApiError::EmailNotVerified)
        ));
        assert!(matches!(
            harness.service.signin("nobody", "s3cret").await,
            Err(ApiError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn verify_email_flips_the_flag_once() {
        let harness = harness();
        signup_amal(&harness).await;
        let token = stored_token(&harness);

        harness.service.verify_email(&token).await.unwrap();
        let user = harness
            .users
            .find_by_username("amal")
            .await
            .unwrap()
            .unwrap();
        assert!(user.verified);
        assert!(user.verification_token.is_none());
        assert!(user.verification_expiry.is_none());

        // The token is gone with the fields; a replay is invalid.
        assert!(matches!(
            harness.service.verify_email(&token).await,
            Err(ApiError::InvalidToken)
        ));

        // And signin now succeeds.
        assert!(harness.service.signin("amal", "s3cret").await.is_ok());
    }

    #[tokio::test]
    async fn expired_verification_token_is_rejected_not_consumed() {
        let harness = harness();
        signup_amal(&harness).await;
        let token = stored_token(&harness);

        harness.clock.advance(chrono::Duration::hours(3));
        assert!(matches!(
            harness.service.verify_email(&token).await,
            Err(ApiError::VerificationExpired)
        ));
        let user = harness
            .users
            .find_by_username("amal")
            .await
            .unwrap()
            .unwrap();
        assert!(!user.verified);
    }

    #[tokio::test]
    async fn resend_overwrites_the_old_token() {
        let harness = harness();
        signup_amal(&harness).await;
        let old_token = stored_token(&harness);

        harness
            .service
            .resend_verification("amal@example.com")
            .await
            .unwrap();
        let new_token = stored_token(&harness);
        assert_ne!(old_token, new_token);

        // The overwritten token no longer resolves.
        assert!(matches!(
            harness.service.verify_email(&old_token).await,
            Err(ApiError::InvalidToken)
        ));
        harness.service.verify_email(&new_token).await.unwrap();

        // Resending for a verified user is refused.
        assert!(matches!(
            harness.service.resend_verification("amal@example.com").await,
            Err(ApiError::AlreadyVerified)
        ));
    }

    #[tokio::test]
    async fn password_reset_round_trip() {
        let harness = harness();
        signup_amal(&harness).await;
        let verification = stored_token(&harness);
        harness.service.verify_email(&verification).await.unwrap();

        harness
            .service
            .forgot_password("amal@example.com")
            .await
            .unwrap();
        let email = harness.mailer.last().unwrap();
        let marker = "reset-password?token=";
        let start = email.body.find(marker).unwrap() + marker.len();
        let token: String = email.body[start..]
            .chars()
            .take_while(|c| !c.is_whitespace())
            .collect();

        harness
            .service
            .reset_password(&token, "n3w-pass")
            .await
            .unwrap();
        assert!(harness.service.signin("amal", "n3w-pass").await.is_ok());
        assert!(matches!(
            harness.service.signin("amal", "s3cret").await,
            Err(ApiError::InvalidCredentials)
        ));

        // Garbage tokens fail without touching anything.
        assert!(matches!(
            harness.service.reset_password("junk", "other").await,
            Err(ApiError::InvalidOrExpiredToken)
        ));
    }

    #[tokio::test]
    async fn forgot_password_for_unknown_email_is_not_found() {
        let harness = harness();
        assert!(matches!(
            harness.service.forgot_password("ghost@example.com").await,
            Err(ApiError::UserNotFound)
        ));
    }
}
