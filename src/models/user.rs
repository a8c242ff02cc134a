//! User model
//!
//! A registered customer. The password reset token lives on the user record
//! rather than in its own table; cart lines are loaded separately.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Pending password reset token (hex)
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    /// When the pending reset token stops being accepted
    #[serde(skip_serializing)]
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new User without a pending reset token.
    ///
    /// The password must already be hashed, see `services::password::hash_password()`.
    pub fn new(email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            email,
            password_hash,
            reset_token: None,
            reset_token_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `token` is this user's pending reset token and is still live at `now`.
    ///
    /// A token whose expiry equals `now` is already expired.
    pub fn reset_token_is_valid(&self, token: &str, now: DateTime<Utc>) -> bool {
        match (&self.reset_token, self.reset_token_expires_at) {
            (Some(stored), Some(expires_at)) => stored == token && expires_at > now,
            _ => false,
        }
    }
}

/// Input for creating a new user
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserInput {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user_with_token(token: &str, expires_at: DateTime<Utc>) -> User {
        let mut user = User::new("a@b.com".to_string(), "hash".to_string());
        user.reset_token = Some(token.to_string());
        user.reset_token_expires_at = Some(expires_at);
        user
    }

    #[test]
    fn test_new_user_has_no_token() {
        let user = User::new("a@b.com".to_string(), "hash".to_string());
        assert_eq!(user.id, 0);
        assert!(user.reset_token.is_none());
        assert!(user.reset_token_expires_at.is_none());
    }

    #[test]
    fn test_reset_token_valid_before_expiry() {
        let now = Utc::now();
        let user = user_with_token("abc", now + Duration::seconds(1));
        assert!(user.reset_token_is_valid("abc", now));
    }

    #[test]
    fn test_reset_token_rejected_at_exact_expiry() {
        let now = Utc::now();
        let user = user_with_token("abc", now);
        assert!(!user.reset_token_is_valid("abc", now));
    }

    #[test]
    fn test_reset_token_rejected_after_expiry() {
        let now = Utc::now();
        let user = user_with_token("abc", now - Duration::minutes(1));
        assert!(!user.reset_token_is_valid("abc", now));
    }

    #[test]
    fn test_reset_token_rejected_on_mismatch() {
        let now = Utc::now();
        let user = user_with_token("abc", now + Duration::hours(1));
        assert!(!user.reset_token_is_valid("abd", now));
    }

    #[test]
    fn test_serialization_skips_secrets() {
        let user = user_with_token("abc", Utc::now() + Duration::hours(1));
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("reset_token"));
        assert!(json.contains("a@b.com"));
    }
}
