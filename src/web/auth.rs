//! Authentication pages
//!
//! Login, signup, logout and the password reset flow.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::{Deserialize, Serialize};

use crate::models::CreateUserInput;
use crate::services::auth::MSG_INVALID_CREDENTIALS;
use crate::services::{AuthError, ValidationErrors};

use super::context::{render, render_with_status, Page};
use super::error::WebError;
use super::middleware::{clear_session_cookie, session_cookie, AppState, CurrentSession};

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    #[serde(rename(deserialize = "confirmPassword"))]
    pub confirm_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetForm {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewPasswordForm {
    pub password: String,
    pub user_id: String,
    pub password_token: String,
}

/// GET /login
pub async fn get_login(State(state): State<AppState>, mut page: Page) -> Result<Response, WebError> {
    let context = page.context(&state, "Login").await?;
    render(&state, "auth/login.html", &context)
}

/// POST /login
///
/// A successful login replaces the session and its cookie.
pub async fn post_login(
    State(state): State<AppState>,
    mut page: Page,
    Form(form): Form<LoginForm>,
) -> Result<Response, WebError> {
    let user = match state.auth_service.login(&form.email, &form.password).await {
        Ok(user) => user,
        Err(AuthError::Validation(errors)) => {
            let context = page.invalid_form_context(&state, "Login", &errors, &form).await?;
            return render_with_status(&state, StatusCode::UNPROCESSABLE_ENTITY, "auth/login.html", &context);
        }
        Err(AuthError::InvalidCredentials) => {
            let mut context = page.context(&state, "Login").await?;
            context.insert("error_message", MSG_INVALID_CREDENTIALS);
            context.insert("old_input", &form);
            return render_with_status(&state, StatusCode::UNPROCESSABLE_ENTITY, "auth/login.html", &context);
        }
        Err(e) => {
            tracing::error!("Login failed: {}", e);
            return Ok(Redirect::to("/login").into_response());
        }
    };

    let session = state.session_service.login(&page.session, user.id).await?;
    let cookie = session_cookie(
        &state.session_config,
        &session.id,
        state.session_service.ttl().num_seconds(),
    );
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response())
}

/// GET /signup
pub async fn get_signup(State(state): State<AppState>, mut page: Page) -> Result<Response, WebError> {
    let context = page.context(&state, "Signup").await?;
    render(&state, "auth/signup.html", &context)
}

/// POST /signup
pub async fn post_signup(
    State(state): State<AppState>,
    mut page: Page,
    Form(form): Form<SignupForm>,
) -> Result<Response, WebError> {
    let input = CreateUserInput {
        email: form.email.clone(),
        password: form.password.clone(),
        confirm_password: form.confirm_password.clone(),
    };
    match state.auth_service.signup(input).await {
        Ok(_) => Ok(Redirect::to("/login").into_response()),
        Err(AuthError::Validation(errors)) => {
            let context = page.invalid_form_context(&state, "Signup", &errors, &form).await?;
            render_with_status(&state, StatusCode::UNPROCESSABLE_ENTITY, "auth/signup.html", &context)
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /logout
pub async fn post_logout(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Result<Response, WebError> {
    state.session_service.destroy(&session.id).await?;
    let cookie = clear_session_cookie(&state.session_config);
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response())
}

/// GET /reset
pub async fn get_reset(State(state): State<AppState>, mut page: Page) -> Result<Response, WebError> {
    let context = page.context(&state, "Reset Password").await?;
    render(&state, "auth/reset.html", &context)
}

/// POST /reset
pub async fn post_reset(
    State(state): State<AppState>,
    mut page: Page,
    Form(form): Form<ResetForm>,
) -> Result<Response, WebError> {
    match state.auth_service.request_password_reset(&form.email).await {
        Ok(()) => Ok(Redirect::to("/").into_response()),
        Err(e @ AuthError::UnknownEmail) => {
            page.flash_error(&state, &e.to_string()).await?;
            Ok(Redirect::to("/reset").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /reset/{token}
pub async fn get_new_password(
    State(state): State<AppState>,
    mut page: Page,
    Path(token): Path<String>,
) -> Result<Response, WebError> {
    match state.auth_service.find_reset_user(&token).await {
        Ok(user) => {
            let mut context = page.context(&state, "New Password").await?;
            context.insert("user_id", &user.id);
            context.insert("password_token", &token);
            render(&state, "auth/new-password.html", &context)
        }
        Err(e @ AuthError::InvalidResetToken) => {
            page.flash_error(&state, &e.to_string()).await?;
            Ok(Redirect::to("/reset").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /new-password
pub async fn post_new_password(
    State(state): State<AppState>,
    mut page: Page,
    Form(form): Form<NewPasswordForm>,
) -> Result<Response, WebError> {
    let result = match form.user_id.trim().parse::<i64>() {
        Ok(user_id) => {
            state
                .auth_service
                .reset_password(user_id, &form.password_token, &form.password)
                .await
        }
        Err(_) => Err(AuthError::InvalidResetToken),
    };

    match result {
        Ok(()) => Ok(Redirect::to("/login").into_response()),
        Err(AuthError::Validation(errors)) => render_new_password_error(&state, &mut page, &form, &errors).await,
        Err(e @ AuthError::InvalidResetToken) => {
            page.flash_error(&state, &e.to_string()).await?;
            Ok(Redirect::to("/reset").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn render_new_password_error(
    state: &AppState,
    page: &mut Page,
    form: &NewPasswordForm,
    errors: &ValidationErrors,
) -> Result<Response, WebError> {
    let mut context = page
        .invalid_form_context(state, "New Password", errors, &serde_json::json!({}))
        .await?;
    context.insert("user_id", form.user_id.trim());
    context.insert("password_token", &form.password_token);
    render_with_status(state, StatusCode::UNPROCESSABLE_ENTITY, "auth/new-password.html", &context)
}
