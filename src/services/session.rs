//! Session service
//!
//! Every visitor gets a server-side session on first contact. Logging in
//! re-keys the session so an id seen before authentication never becomes an
//! authenticated one.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Flash, Session, User};
use crate::services::token::{generate_csrf_token, generate_session_id};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;

pub struct SessionService {
    session_repo: Arc<dyn SessionRepository>,
    user_repo: Arc<dyn UserRepository>,
    ttl: Duration,
}

impl SessionService {
    pub fn new(
        session_repo: Arc<dyn SessionRepository>,
        user_repo: Arc<dyn UserRepository>,
        ttl_hours: i64,
    ) -> Self {
        Self {
            session_repo,
            user_repo,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Session lifetime, used for the cookie's `Max-Age`
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start an anonymous session
    pub async fn start(&self) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            id: generate_session_id(),
            user_id: None,
            is_logged_in: false,
            csrf_token: generate_csrf_token(),
            flash: Flash::new(),
            expires_at: now + self.ttl,
            created_at: now,
        };
        self.session_repo
            .create(&session)
            .await
            .context("Failed to start session")
    }

    /// Load a live session. Expired sessions are deleted and reported as absent.
    pub async fn load(&self, id: &str) -> Result<Option<Session>> {
        let Some(session) = self.session_repo.get_by_id(id).await? else {
            return Ok(None);
        };

        if session.is_expired() {
            self.session_repo.delete(id).await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Re-fetch the session's user from the database
    pub async fn current_user(&self, session: &Session) -> Result<Option<User>> {
        match session.user_id {
            Some(user_id) if session.is_logged_in => self.user_repo.get_by_id(user_id).await,
            _ => Ok(None),
        }
    }

    /// Replace `session` with a fresh authenticated one for `user_id`.
    ///
    /// Pending flash messages carry over; the id and CSRF secret do not.
    pub async fn login(&self, session: &Session, user_id: i64) -> Result<Session> {
        let now = Utc::now();
        let promoted = Session {
            id: generate_session_id(),
            user_id: Some(user_id),
            is_logged_in: true,
            csrf_token: generate_csrf_token(),
            flash: session.flash.clone(),
            expires_at: now + self.ttl,
            created_at: now,
        };
        self.session_repo.create(&promoted).await?;
        self.session_repo.delete(&session.id).await?;
        Ok(promoted)
    }

    pub async fn destroy(&self, id: &str) -> Result<()> {
        self.session_repo.delete(id).await
    }

    /// Queue a flash message for the next page render
    pub async fn flash(&self, session: &mut Session, kind: &str, message: &str) -> Result<()> {
        session
            .flash
            .entry(kind.to_string())
            .or_default()
            .push(message.to_string());
        self.session_repo.update(session).await
    }

    /// Remove and return all pending flash messages
    pub async fn take_flash(&self, session: &mut Session) -> Result<Flash> {
        if session.flash.is_empty() {
            return Ok(Flash::new());
        }
        let flash = std::mem::take(&mut session.flash);
        self.session_repo.update(session).await?;
        Ok(flash)
    }

    /// Delete all expired sessions
    pub async fn purge_expired(&self) -> Result<u64> {
        self.session_repo.delete_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (SessionService, Arc<dyn UserRepository>) {
        let db = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&db)
            .await
            .expect("Failed to run migrations");
        let users = SqlxUserRepository::boxed(db.clone());
        let service = SessionService::new(SqlxSessionRepository::boxed(db), users.clone(), 24);
        (service, users)
    }

    #[tokio::test]
    async fn test_start_creates_anonymous_session() {
        let (service, _) = setup().await;
        let session = service.start().await.unwrap();

        assert!(!session.is_authenticated());
        assert_eq!(session.csrf_token.len(), 64);
        let loaded = service.load(&session.id).await.unwrap().expect("session");
        assert_eq!(loaded.csrf_token, session.csrf_token);
        assert!(service.current_user(&loaded).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_unknown_session() {
        let (service, _) = setup().await;
        assert!(service.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_rotates_session() {
        let (service, users) = setup().await;
        let user = users
            .create(&User::new("a@example.com".to_string(), "hash".to_string()))
            .await
            .unwrap();

        let mut anonymous = service.start().await.unwrap();
        service.flash(&mut anonymous, "error", "carry me").await.unwrap();
        let promoted = service.login(&anonymous, user.id).await.unwrap();

        assert_ne!(promoted.id, anonymous.id);
        assert_ne!(promoted.csrf_token, anonymous.csrf_token);
        assert!(service.load(&anonymous.id).await.unwrap().is_none());

        let loaded = service.load(&promoted.id).await.unwrap().expect("session");
        assert!(loaded.is_authenticated());
        assert_eq!(loaded.flash.get("error"), Some(&vec!["carry me".to_string()]));
        let current = service.current_user(&loaded).await.unwrap().expect("user");
        assert_eq!(current.id, user.id);
    }

    #[tokio::test]
    async fn test_flash_is_read_once() {
        let (service, _) = setup().await;
        let mut session = service.start().await.unwrap();
        service.flash(&mut session, "error", "first").await.unwrap();
        service.flash(&mut session, "error", "second").await.unwrap();

        let mut reloaded = service.load(&session.id).await.unwrap().unwrap();
        let flash = service.take_flash(&mut reloaded).await.unwrap();
        assert_eq!(
            flash.get("error"),
            Some(&vec!["first".to_string(), "second".to_string()])
        );

        let mut again = service.load(&session.id).await.unwrap().unwrap();
        assert!(service.take_flash(&mut again).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_destroy() {
        let (service, _) = setup().await;
        let session = service.start().await.unwrap();
        service.destroy(&session.id).await.unwrap();
        assert!(service.load(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_not_loaded() {
        let db = create_test_pool().await.unwrap();
        migrations::run_migrations(&db).await.unwrap();
        let service = SessionService::new(
            SqlxSessionRepository::boxed(db.clone()),
            SqlxUserRepository::boxed(db),
            -1,
        );

        let session = service.start().await.unwrap();
        assert!(service.load(&session.id).await.unwrap().is_none());
        assert_eq!(service.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let db = create_test_pool().await.unwrap();
        migrations::run_migrations(&db).await.unwrap();
        let expired = SessionService::new(
            SqlxSessionRepository::boxed(db.clone()),
            SqlxUserRepository::boxed(db.clone()),
            -1,
        );
        let live = SessionService::new(
            SqlxSessionRepository::boxed(db.clone()),
            SqlxUserRepository::boxed(db),
            1,
        );

        expired.start().await.unwrap();
        expired.start().await.unwrap();
        let kept = live.start().await.unwrap();

        assert_eq!(live.purge_expired().await.unwrap(), 2);
        assert!(live.load(&kept.id).await.unwrap().is_some());
    }
}
