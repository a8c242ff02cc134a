//! Session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flash messages keyed by kind, e.g. `"error"`
pub type Flash = BTreeMap<String, Vec<String>>;

/// Server-side session, keyed by the session cookie.
///
/// Anonymous visitors get a session too, so the CSRF secret and flash
/// messages survive until login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (cookie value)
    pub id: String,
    /// Logged-in user, if any
    pub user_id: Option<i64>,
    pub is_logged_in: bool,
    /// Per-session CSRF secret
    pub csrf_token: String,
    /// Pending flash messages
    pub flash: Flash,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_logged_in && self.user_id.is_some()
    }
}
