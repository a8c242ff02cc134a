//! Authentication service
//!
//! Signup, credential checks and the two-step password reset. Session
//! bookkeeping lives in `SessionService`; this service only answers "who is
//! this" and mutates user records.

use crate::db::repositories::UserRepository;
use crate::models::{CreateUserInput, User};
use crate::services::email::{reset_email, send_logged, signup_email, Mailer};
use crate::services::password::{hash_password, verify_password};
use crate::services::token::{generate_reset_token, reset_token_ttl};
use crate::services::validation::{
    normalize_email, validate_login, validate_new_password, validate_signup, ValidationErrors,
    MSG_EMAIL_TAKEN,
};
use chrono::Utc;
use std::sync::Arc;

pub const MSG_INVALID_CREDENTIALS: &str = "Invalid email or password.";
pub const MSG_UNKNOWN_EMAIL: &str = "No account with that email";
pub const MSG_INVALID_RESET_TOKEN: &str = "Password reset link is invalid or has expired.";

/// Error types for authentication operations
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Form input failed validation
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    /// Unknown email or wrong password; deliberately indistinguishable
    #[error("{}", MSG_INVALID_CREDENTIALS)]
    InvalidCredentials,

    /// Password reset requested for an unregistered address
    #[error("{}", MSG_UNKNOWN_EMAIL)]
    UnknownEmail,

    /// Reset token missing, expired, already used or for another user
    #[error("{}", MSG_INVALID_RESET_TOKEN)]
    InvalidResetToken,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    mailer: Arc<dyn Mailer>,
    base_url: String,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        mailer: Arc<dyn Mailer>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            user_repo,
            mailer,
            base_url: base_url.into(),
        }
    }

    /// Register a new user and send the welcome email.
    ///
    /// The email-taken check reports a distinct message, so signup does
    /// reveal whether an address is registered.
    pub async fn signup(&self, input: CreateUserInput) -> Result<User, AuthError> {
        let email = normalize_email(&input.email);

        let mut errors = validate_signup(&email, &input.password, &input.confirm_password);
        if errors.fields().iter().all(|f| f != "email")
            && self.user_repo.get_by_email(&email).await?.is_some()
        {
            errors.add("email", MSG_EMAIL_TAKEN);
        }
        errors.into_result().map_err(AuthError::Validation)?;

        let password_hash = hash_password(&input.password)?;
        let user = self
            .user_repo
            .create(&User::new(email, password_hash))
            .await
            .map_err(|e| {
                // A concurrent signup can win between the lookup and the insert
                if is_unique_violation(&e) {
                    AuthError::Validation(ValidationErrors::single("email", MSG_EMAIL_TAKEN))
                } else {
                    AuthError::InternalError(e)
                }
            })?;

        tracing::info!(user_id = user.id, "User signed up");
        send_logged(self.mailer.as_ref(), signup_email(&user.email)).await;

        Ok(user)
    }

    /// Check credentials, returning the matching user
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        validate_login(&email, password)
            .into_result()
            .map_err(AuthError::Validation)?;

        let user = self
            .user_repo
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        tracing::info!(user_id = user.id, "User logged in");
        Ok(user)
    }

    /// Issue a reset token for the account and mail the reset link
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let token = generate_reset_token();
        let email = normalize_email(email);

        let user = self
            .user_repo
            .get_by_email(&email)
            .await?
            .ok_or(AuthError::UnknownEmail)?;

        let expires_at = Utc::now() + reset_token_ttl();
        self.user_repo
            .set_reset_token(user.id, &token, expires_at)
            .await?;

        tracing::info!(user_id = user.id, "Password reset requested");
        send_logged(
            self.mailer.as_ref(),
            reset_email(&user.email, &self.base_url, &token),
        )
        .await;

        Ok(())
    }

    /// Resolve a live reset token to its user
    pub async fn find_reset_user(&self, token: &str) -> Result<User, AuthError> {
        let user = self
            .user_repo
            .get_by_reset_token(token)
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        if !user.reset_token_is_valid(token, Utc::now()) {
            return Err(AuthError::InvalidResetToken);
        }
        Ok(user)
    }

    /// Set a new password using a reset token. The token is consumed; of two
    /// concurrent resets with the same token only one succeeds.
    pub async fn reset_password(
        &self,
        user_id: i64,
        token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self.find_reset_user(token).await?;
        if user.id != user_id {
            return Err(AuthError::InvalidResetToken);
        }

        validate_new_password(new_password)
            .into_result()
            .map_err(AuthError::Validation)?;

        let password_hash = hash_password(new_password)?;
        let updated = self
            .user_repo
            .reset_password(user.id, token, &password_hash, Utc::now())
            .await?;
        if !updated {
            return Err(AuthError::InvalidResetToken);
        }

        tracing::info!(user_id = user.id, "Password reset completed");
        Ok(())
    }
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .map_or(false, |e| e.is_unique_violation())
}
