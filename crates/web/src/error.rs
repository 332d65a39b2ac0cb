//! Handler errors and their HTTP mapping.
//!
//! Handlers return [`Result`]. Server-side failures are reported to Sentry
//! before the response is written; clients only ever see a short message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::diagnosis::DiagnosisError;
use crate::services::inference::InferenceError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Diagnosis pipeline failed.
    #[error("Diagnosis error: {0}")]
    Diagnosis(#[from] DiagnosisError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Unknown page or record.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unreadable form or upload.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_)
                | AuthError::InvalidUsername(_)
                | AuthError::PasswordMismatch
                | AuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Diagnosis(err) => match err {
                DiagnosisError::Model(_)
                | DiagnosisError::Inference(
                    InferenceError::Model(_) | InferenceError::LabelMismatch(_),
                ) => StatusCode::SERVICE_UNAVAILABLE,
                DiagnosisError::Inference(InferenceError::Decode(_)) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Session(_) => "Internal server error".to_string(),
            Self::Auth(err) => match err {
                AuthError::Repository(_) => "Internal server error".to_string(),
                other => other.to_string(),
            },
            Self::Diagnosis(err) => match err {
                DiagnosisError::Model(_) => {
                    "The diagnosis model is unavailable. Please try again later.".to_string()
                }
                DiagnosisError::Inference(
                    InferenceError::Model(_) | InferenceError::LabelMismatch(_),
                ) => "The diagnosis model could not be run. Please try again later.".to_string(),
                DiagnosisError::Inference(InferenceError::Decode(_)) => {
                    "Could not read the uploaded image".to_string()
                }
                _ => "Diagnosis failed".to_string(),
            },
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, self.user_message()).into_response()
    }
}

/// Handler result.
pub type Result<T> = std::result::Result<T, AppError>;

/// Attach the logged-in user to subsequent Sentry events.
pub fn set_sentry_user(username: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            username: Some(username.to_string()),
            ..Default::default()
        }));
    });
}

/// Detach the user from Sentry events (on logout).
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Record a user action as a Sentry breadcrumb, with optional string data.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
