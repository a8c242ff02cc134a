//! Web middleware
//!
//! - Sessions: every request carries a server-side session, created on demand
//! - CSRF: state-changing requests must echo the session's CSRF token
//! - Authentication: protected routes redirect anonymous visitors to `/login`
//! - Error pages: tagged not-found responses get the full 404 template

use axum::{
    body::{to_bytes, Body},
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use std::sync::Arc;

use crate::config::{Config, SessionConfig, UploadConfig};
use crate::db::repositories::{
    SqlxCartRepository, SqlxOrderRepository, SqlxProductRepository, SqlxSessionRepository,
    SqlxUserRepository,
};
use crate::db::Database;
use crate::models::{Session, User};
use crate::services::token::constant_time_eq;
use crate::services::{AuthService, Mailer, ProductService, SessionService, ShopService};
use crate::views::ViewEngine;

use super::context::base_context;
use super::error::{ErrorPage, WebError};

/// Header JavaScript clients use to send the CSRF token
pub const CSRF_HEADER: &str = "x-csrf-token";
/// Form field and query parameter carrying the CSRF token
pub const CSRF_FIELD: &str = "_csrf";

/// Largest urlencoded body buffered while looking for the CSRF token
const MAX_FORM_BODY: usize = 1024 * 1024;

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth_service: Arc<AuthService>,
    pub session_service: Arc<SessionService>,
    pub product_service: Arc<ProductService>,
    pub shop_service: Arc<ShopService>,
    pub views: Arc<ViewEngine>,
    pub upload_config: Arc<UploadConfig>,
    pub session_config: Arc<SessionConfig>,
}

impl AppState {
    /// Wire repositories and services over one database
    pub fn new(config: &Config, db: Database, mailer: Arc<dyn Mailer>, views: ViewEngine) -> Self {
        let user_repo = SqlxUserRepository::boxed(db.clone());
        let session_repo = SqlxSessionRepository::boxed(db.clone());
        let product_repo = SqlxProductRepository::boxed(db.clone());
        let cart_repo = SqlxCartRepository::boxed(db.clone());
        let order_repo = SqlxOrderRepository::boxed(db.clone());

        Self {
            auth_service: Arc::new(AuthService::new(
                user_repo.clone(),
                mailer,
                config.server.base_url.clone(),
            )),
            session_service: Arc::new(SessionService::new(
                session_repo,
                user_repo,
                config.session.ttl_hours,
            )),
            product_service: Arc::new(ProductService::new(
                product_repo.clone(),
                config.shop.items_per_page,
            )),
            shop_service: Arc::new(ShopService::new(product_repo, cart_repo, order_repo)),
            views: Arc::new(views),
            upload_config: Arc::new(config.upload.clone()),
            session_config: Arc::new(config.session.clone()),
            db,
        }
    }
}

/// The session attached to the current request
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

/// The logged-in user, if any
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<User>);

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or_else(|| WebError::Internal(anyhow::anyhow!("session middleware not installed")))
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| Redirect::to("/login"))
    }
}

/// Read the session id from the `Cookie` header
pub fn extract_session_id(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let prefix = format!("{}=", cookie_name);
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix(prefix.as_str()))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// `Set-Cookie` value carrying a session id
pub fn session_cookie(config: &SessionConfig, session_id: &str, max_age_secs: i64) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.cookie_name, session_id, max_age_secs
    );
    if config.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie(config: &SessionConfig) -> String {
    session_cookie(config, "", 0)
}

/// Attach a session and the current user to every request.
///
/// Visitors without a live session get a fresh one and its cookie, unless
/// the handler already set a session cookie itself.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let existing = match extract_session_id(request.headers(), &state.session_config.cookie_name) {
        Some(id) => match state.session_service.load(&id).await {
            Ok(session) => session,
            Err(e) => return WebError::Internal(e).into_response(),
        },
        None => None,
    };

    let (session, is_new) = match existing {
        Some(session) => (session, false),
        None => match state.session_service.start().await {
            Ok(session) => (session, true),
            Err(e) => return WebError::Internal(e).into_response(),
        },
    };

    let user = match state.session_service.current_user(&session).await {
        Ok(user) => user,
        Err(e) => return WebError::Internal(e).into_response(),
    };

    let session_id = session.id.clone();
    if let Some(user) = &user {
        request.extensions_mut().insert(AuthenticatedUser(user.clone()));
    }
    request.extensions_mut().insert(CurrentUser(user));
    request.extensions_mut().insert(CurrentSession(session));

    let mut response = next.run(request).await;

    if is_new && !response.headers().contains_key(header::SET_COOKIE) {
        let cookie = session_cookie(
            &state.session_config,
            &session_id,
            state.session_service.ttl().num_seconds(),
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

/// Reject state-changing requests whose CSRF token doesn't match the session.
///
/// The token is looked up in the `x-csrf-token` header, then the `_csrf`
/// query parameter, then the `_csrf` field of a urlencoded body.
pub async fn csrf_middleware(request: Request, next: Next) -> Result<Response, WebError> {
    if is_safe_method(request.method()) {
        return Ok(next.run(request).await);
    }

    let expected = request
        .extensions()
        .get::<CurrentSession>()
        .map(|s| s.0.csrf_token.clone())
        .ok_or_else(|| WebError::Internal(anyhow::anyhow!("session middleware not installed")))?;

    let mut supplied = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().query().and_then(find_csrf_field));

    let request = if supplied.is_none() && is_urlencoded_form(request.headers()) {
        let (parts, body) = request.into_parts();
        let bytes = to_bytes(body, MAX_FORM_BODY)
            .await
            .map_err(|_| WebError::BadRequest("Request body too large".to_string()))?;
        supplied = std::str::from_utf8(&bytes).ok().and_then(find_csrf_field);
        Request::from_parts(parts, Body::from(bytes))
    } else {
        request
    };

    match supplied {
        Some(token) if constant_time_eq(&token, &expected) => Ok(next.run(request).await),
        _ => Err(WebError::Forbidden("invalid csrf token".to_string())),
    }
}

fn is_safe_method(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD || method == Method::OPTIONS
}

fn find_csrf_field(encoded: &str) -> Option<String> {
    url::form_urlencoded::parse(encoded.as_bytes())
        .find(|(key, _)| key == CSRF_FIELD)
        .map(|(_, value)| value.into_owned())
}

fn is_urlencoded_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// Require an authenticated user, redirecting to the login page otherwise
pub async fn require_auth(request: Request, next: Next) -> Response {
    if request.extensions().get::<AuthenticatedUser>().is_none() {
        return Redirect::to("/login").into_response();
    }
    next.run(request).await
}

/// Replace tagged not-found responses with the rendered 404 page
pub async fn error_page_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let session = request.extensions().get::<CurrentSession>().cloned();
    let user = request.extensions().get::<CurrentUser>().cloned();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    if response.extensions().get::<ErrorPage>().is_none() {
        return response;
    }

    let (Some(CurrentSession(session)), Some(CurrentUser(user))) = (session, user) else {
        return response;
    };
    let context = base_context(&session, user.as_ref(), &path, "Page Not Found");
    let html = state.views.render_or_fallback("404.html", &context);
    (response.status(), Html(html)).into_response()
}
