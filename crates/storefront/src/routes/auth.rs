//! Authentication route handlers.
//!
//! Login and registration delegate to the backend auth API; on success
//! the session stores the user identity plus their access token, and
//! the user is registered with the expiry notifier.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::auth::{clear_current_user, set_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Query parameters for error display on the auth pages.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
}

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub logged_in: bool,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub error: Option<String>,
    pub logged_in: bool,
}

/// Display the login page.
pub async fn login_page(Query(query): Query<MessageQuery>) -> impl IntoResponse {
    LoginTemplate {
        error: query.error.map(error_message),
        logged_in: false,
    }
}

/// Handle login form submission.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let auth = AuthService::new(state.backend());
    match auth.login(&form.email, &form.password).await {
        Ok(user) => finish_login(&state, &session, user, "/account").await,
        Err(err) => {
            tracing::warn!(error = %err, "login failed");
            Redirect::to(&format!("/auth/login?error={}", error_code(&err))).into_response()
        }
    }
}

/// Display the registration page.
pub async fn register_page(Query(query): Query<MessageQuery>) -> impl IntoResponse {
    RegisterTemplate {
        error: query.error.map(error_message),
        logged_in: false,
    }
}

/// Handle registration form submission. A successful signup logs the
/// user straight in.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Response {
    let auth = AuthService::new(state.backend());
    match auth
        .register(&form.email, &form.password, &form.password_confirm)
        .await
    {
        Ok(user) => finish_login(&state, &session, user, "/").await,
        Err(err) => {
            tracing::warn!(error = %err, "registration failed");
            Redirect::to(&format!("/auth/register?error={}", error_code(&err))).into_response()
        }
    }
}

/// Handle logout: unregister from the notifier, clear the session.
pub async fn logout(State(state): State<AppState>, session: Session) -> Response {
    if let Ok(Some(user)) = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
    {
        state.notifier().unregister(user.id);
    }

    if let Err(e) = clear_current_user(&session).await {
        tracing::error!("Failed to clear session: {e}");
    }
    if let Err(e) = session.flush().await {
        tracing::error!("Failed to flush session: {e}");
    }
    clear_sentry_user();

    Redirect::to("/").into_response()
}

async fn finish_login(
    state: &AppState,
    session: &Session,
    user: CurrentUser,
    destination: &str,
) -> Response {
    if let Err(e) = set_current_user(session, &user).await {
        tracing::error!("Failed to set session: {e}");
        return Redirect::to("/auth/login?error=session").into_response();
    }
    set_sentry_user(&user.id, Some(user.email.as_str()));
    state
        .notifier()
        .register(user.id, user.access_token.clone());
    Redirect::to(destination).into_response()
}

/// Stable query-string codes for auth failures.
fn error_code(err: &AuthError) -> &'static str {
    match err {
        AuthError::InvalidCredentials => "credentials",
        AuthError::EmailTaken => "email_taken",
        AuthError::InvalidEmail(_) => "invalid_email",
        AuthError::WeakPassword(_) => "weak_password",
        AuthError::PasswordMismatch => "password_mismatch",
        AuthError::Backend(_) => "backend",
    }
}

/// Messages shown on the auth pages for each error code.
fn error_message(code: String) -> String {
    match code.as_str() {
        "credentials" => "Invalid email or password".to_string(),
        "email_taken" => "An account with this email already exists".to_string(),
        "invalid_email" => "Please enter a valid email address".to_string(),
        "weak_password" => "Password must be at least 8 characters".to_string(),
        "password_mismatch" => "Passwords do not match".to_string(),
        "session" => "Could not start a session, please try again".to_string(),
        _ => "Something went wrong, please try again".to_string(),
    }
}
