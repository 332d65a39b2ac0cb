//! Authentication route handlers.
//!
//! Login, sign-up and logout against the local credential store.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;

use plant_health_core::Username;

use super::dashboard::Page;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::auth::{AuthError, AuthService, MIN_PASSWORD_LENGTH, validate_new_password};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters for error/success display.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Text for an auth error code.
#[must_use]
pub fn error_message(code: &str) -> String {
    match code {
        "credentials" => "Invalid username or password".to_string(),
        "exists" => "Username already exists".to_string(),
        "mismatch" => "Passwords don't match".to_string(),
        "weak" => format!("Password must be at least {MIN_PASSWORD_LENGTH} characters"),
        "invalid_email" => "Invalid email address".to_string(),
        "invalid_username" => "Invalid username".to_string(),
        "session" => "Could not start a session, please try again".to_string(),
        _ => "Something went wrong".to_string(),
    }
}

/// Text for an auth success code.
#[must_use]
pub fn success_message(code: &str) -> Option<&'static str> {
    match code {
        "registered" => Some("Account created successfully! Please login."),
        "logged_out" => Some("You have been logged out."),
        _ => None,
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub error: Option<String>,
    pub min_password_length: usize,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<MessageQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to(&Page::Home.href()).into_response();
    }

    LoginTemplate {
        error: query.error.as_deref().map(error_message),
        success: query
            .success
            .as_deref()
            .and_then(success_message)
            .map(String::from),
    }
    .into_response()
}

/// Handle login form submission.
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let password = SecretString::from(form.password);
    let auth = AuthService::new(state.pool());

    if !auth.verify(&form.username, &password).await? {
        tracing::warn!(username = %form.username, "Login failed");
        return Ok(Redirect::to("/auth/login?error=credentials").into_response());
    }

    // Stored names that no longer parse (blank or overlong) cannot hold a session.
    let username = Username::parse(&form.username).map_err(AuthError::from)?;
    let user = CurrentUser { username };

    if let Err(e) = set_current_user(&session, &user).await {
        tracing::error!(error = %e, "Failed to set session");
        return Ok(Redirect::to("/auth/login?error=session").into_response());
    }
    set_sentry_user(&user.username);
    tracing::info!(username = %user.username, "User logged in");

    Ok(Redirect::to(&Page::Home.href()).into_response())
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<MessageQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to(&Page::Home.href()).into_response();
    }

    RegisterTemplate {
        error: query.error.as_deref().map(error_message),
        min_password_length: MIN_PASSWORD_LENGTH,
    }
    .into_response()
}

/// Handle registration form submission.
///
/// On success the user is sent to the login page; sign-up does not log in.
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let password = SecretString::from(form.password);
    let confirm = SecretString::from(form.password_confirm);
    let auth = AuthService::new(state.pool());

    let outcome = match validate_new_password(&password, &confirm) {
        Ok(()) => auth.register(&form.username, &password, &form.email).await,
        Err(e) => Err(e),
    };

    let code = match outcome {
        Ok(true) => {
            return Ok(Redirect::to("/auth/login?success=registered").into_response());
        }
        Ok(false) => "exists",
        Err(AuthError::PasswordMismatch) => "mismatch",
        Err(AuthError::WeakPassword(_)) => "weak",
        Err(AuthError::InvalidEmail(_)) => "invalid_email",
        Err(AuthError::InvalidUsername(_)) => "invalid_username",
        Err(e @ AuthError::Repository(_)) => return Err(AppError::from(e)),
    };

    Ok(Redirect::to(&format!("/auth/register?error={code}")).into_response())
}

// =============================================================================
// Logout
// =============================================================================

/// Log out and drop all session state.
pub async fn logout(session: Session) -> Result<Response> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(Redirect::to("/auth/login?success=logged_out").into_response())
}
