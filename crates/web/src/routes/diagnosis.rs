//! Disease detection and feedback route handlers.

use std::path::Path;

use axum::{
    Form,
    extract::{Multipart, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use plant_health_core::FeedbackCategory;

use super::dashboard::{DashboardContext, Page, ResultTemplate, detection_error};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{RequireAuth, last_prediction, offline_mode, set_last_prediction};
use crate::models::LastPrediction;
use crate::services::connectivity::SessionConnectivity;
use crate::services::diagnosis::DiagnosisError;
use crate::services::inference::InferenceError;
use crate::state::AppState;

/// Accepted upload extensions (case-insensitive).
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Multipart field carrying the photo.
const IMAGE_FIELD: &str = "image";

/// Whether `file_name` has an accepted image extension.
#[must_use]
pub fn is_supported_image(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
}

fn detection_redirect(error: &str) -> Response {
    Redirect::to(&format!("{}?error={error}", Page::DiseaseDetection.href())).into_response()
}

// =============================================================================
// Detection
// =============================================================================

/// Handle an uploaded leaf photo.
///
/// Runs the full diagnosis and renders the result with its feedback form.
#[tracing::instrument(skip_all)]
pub async fn detect(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        upload = Some((file_name, bytes));
        break;
    }

    let Some((file_name, bytes)) =
        upload.filter(|(name, bytes)| !name.is_empty() && !bytes.is_empty())
    else {
        return Ok(detection_redirect("no_file"));
    };
    if !is_supported_image(&file_name) {
        tracing::debug!(file_name = %file_name, "Rejected upload type");
        return Ok(detection_redirect("unsupported_type"));
    }

    add_breadcrumb("diagnosis", "Image uploaded", Some(&[("image", file_name.as_str())]));

    let offline = offline_mode(&session).await;
    let connectivity = SessionConnectivity::new(state.probe(), offline);
    let diagnosis = match state
        .diagnosis()
        .diagnose(&file_name, bytes.to_vec(), &connectivity)
        .await
    {
        Ok(diagnosis) => diagnosis,
        Err(DiagnosisError::Inference(InferenceError::Decode(e))) => {
            tracing::debug!(error = %e, "Upload is not a readable image");
            return Ok(detection_redirect("decode"));
        }
        Err(err @ (DiagnosisError::Model(_) | DiagnosisError::Inference(_))) => {
            tracing::error!(error = %err, "Diagnosis model failed");
            let app_err = AppError::from(err);
            let ctx = DashboardContext::load(&state, &session, &user, Page::DiseaseDetection).await;
            return Ok(detection_error(ctx, app_err.status(), app_err.user_message()));
        }
        Err(err) => return Err(err.into()),
    };

    set_last_prediction(
        &session,
        &LastPrediction {
            prediction: diagnosis.record.prediction.clone(),
        },
    )
    .await?;

    let ctx = DashboardContext::load(&state, &session, &user, Page::DiseaseDetection).await;
    let page = ResultTemplate {
        ctx,
        disease_name: diagnosis.label.as_str().to_string(),
        image_name: diagnosis.record.image_name.clone(),
        synced: diagnosis.synced(),
        treatment: diagnosis.record.treatment_info,
        categories: FeedbackCategory::ALL,
    };

    Ok(page.into_response())
}

// =============================================================================
// Feedback
// =============================================================================

/// Feedback form data.
#[derive(Debug, Deserialize)]
pub struct FeedbackForm {
    /// One of the `FeedbackCategory` labels; absent if nothing was picked.
    pub feedback: Option<String>,
    #[serde(default)]
    pub notes: String,
}

/// Record feedback on the session's last diagnosis.
#[tracing::instrument(skip_all)]
pub async fn feedback(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
    Form(form): Form<FeedbackForm>,
) -> Result<Response> {
    let Some(category) = form
        .feedback
        .as_deref()
        .and_then(|value| value.parse::<FeedbackCategory>().ok())
    else {
        return Ok(detection_redirect("feedback"));
    };

    let Some(last) = last_prediction(&session).await else {
        return Ok(detection_redirect("no_prediction"));
    };

    let offline = offline_mode(&session).await;
    let connectivity = SessionConnectivity::new(state.probe(), offline);
    state
        .diagnosis()
        .submit_feedback(&last.prediction, category, form.notes.trim(), &connectivity)
        .await?;

    tracing::info!(feedback = %category, prediction = %last.prediction, "Feedback recorded");

    Ok(Redirect::to(&format!(
        "{}?notice=feedback_thanks",
        Page::DiseaseDetection.href()
    ))
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_image("leaf.jpg"));
        assert!(is_supported_image("leaf.JPEG"));
        assert!(is_supported_image("scan.Png"));
        assert!(is_supported_image("animated.gif"));
    }

    #[test]
    fn test_rejected_extensions() {
        assert!(!is_supported_image("leaf.bmp"));
        assert!(!is_supported_image("notes.txt"));
        assert!(!is_supported_image("jpg"));
        assert!(!is_supported_image(""));
    }
}
