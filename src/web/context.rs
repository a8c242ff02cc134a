//! Page context shared by every rendered template

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde::Serialize;
use tera::Context as TeraContext;

use crate::models::{Session, User};
use crate::services::ValidationErrors;

use super::error::WebError;
use super::middleware::{AppState, CurrentSession, CurrentUser};

/// Flash kind shown in the page's message banner
pub const FLASH_ERROR: &str = "error";

/// Variables every page template can rely on
pub fn base_context(session: &Session, user: Option<&User>, path: &str, title: &str) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("page_title", title);
    context.insert("path", path);
    context.insert("is_authenticated", &user.is_some());
    context.insert("csrf_token", &session.csrf_token);
    context.insert("error_message", &Option::<String>::None);
    context.insert("validation_fields", &Vec::<String>::new());
    context.insert("old_input", &serde_json::Value::Object(Default::default()));
    context
}

/// Request-scoped view of the session, user and path, used to build page contexts
pub struct Page {
    pub session: Session,
    pub user: Option<User>,
    pub path: String,
}

impl<S> FromRequestParts<S> for Page
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentSession(session) = CurrentSession::from_request_parts(parts, state).await?;
        let user = parts
            .extensions
            .get::<CurrentUser>()
            .and_then(|u| u.0.clone());
        Ok(Self {
            session,
            user,
            path: parts.uri.path().to_string(),
        })
    }
}

impl Page {
    /// Base context with pending flash errors consumed into `error_message`
    pub async fn context(&mut self, state: &AppState, title: &str) -> Result<TeraContext, WebError> {
        let mut flash = state.session_service.take_flash(&mut self.session).await?;
        let mut context = base_context(&self.session, self.user.as_ref(), &self.path, title);
        if let Some(message) = flash.remove(FLASH_ERROR).and_then(|m| m.into_iter().next()) {
            context.insert("error_message", &message);
        }
        Ok(context)
    }

    /// Context for re-rendering a form that failed validation
    pub async fn invalid_form_context<T: Serialize>(
        &mut self,
        state: &AppState,
        title: &str,
        errors: &ValidationErrors,
        old_input: &T,
    ) -> Result<TeraContext, WebError> {
        let mut context = self.context(state, title).await?;
        context.insert("error_message", &errors.first_message());
        context.insert("validation_fields", &errors.fields());
        context.insert("old_input", old_input);
        Ok(context)
    }

    /// Queue an error message for the next rendered page
    pub async fn flash_error(&mut self, state: &AppState, message: &str) -> Result<(), WebError> {
        state
            .session_service
            .flash(&mut self.session, FLASH_ERROR, message)
            .await?;
        Ok(())
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }
}

/// Render a template with status 200
pub fn render(state: &AppState, template: &str, context: &TeraContext) -> Result<Response, WebError> {
    render_with_status(state, StatusCode::OK, template, context)
}

pub fn render_with_status(
    state: &AppState,
    status: StatusCode,
    template: &str,
    context: &TeraContext,
) -> Result<Response, WebError> {
    let html = state.views.render(template, context)?;
    Ok((status, Html(html)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session() -> Session {
        Session {
            id: "sid".to_string(),
            user_id: None,
            is_logged_in: false,
            csrf_token: "csrf-secret".to_string(),
            flash: Default::default(),
            expires_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_base_context_anonymous() {
        let context = base_context(&session(), None, "/login", "Login").into_json();
        assert_eq!(context["page_title"], "Login");
        assert_eq!(context["path"], "/login");
        assert_eq!(context["is_authenticated"], false);
        assert_eq!(context["csrf_token"], "csrf-secret");
        assert!(context["error_message"].is_null());
        assert_eq!(context["validation_fields"], serde_json::json!([]));
    }

    #[test]
    fn test_base_context_authenticated() {
        let user = User::new("a@b.c".to_string(), "hash".to_string());
        let context = base_context(&session(), Some(&user), "/", "Shop").into_json();
        assert_eq!(context["is_authenticated"], true);
    }
}
