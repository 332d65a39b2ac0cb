//! Session settings and quick actions.

use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use super::dashboard::Page;
use crate::error::Result;
use crate::middleware::{RequireAuth, offline_mode, set_offline_mode};
use crate::services::connectivity::SessionConnectivity;
use crate::services::diagnosis::UpdateStatus;
use crate::state::AppState;

/// Offline toggle form data.
#[derive(Debug, Deserialize)]
pub struct OfflineForm {
    /// Present (any value) when the checkbox is ticked.
    pub offline: Option<String>,
    /// Dashboard page to go back to.
    pub return_to: Option<String>,
}

/// Only dashboard pages are valid return targets.
fn return_target(return_to: Option<&str>) -> String {
    return_to
        .and_then(|path| path.strip_prefix("/app/"))
        .and_then(Page::from_slug)
        .unwrap_or(Page::Home)
        .href()
}

/// Switch "Offline Mode" on or off for this session.
#[tracing::instrument(skip_all)]
pub async fn toggle_offline(
    session: Session,
    RequireAuth(_user): RequireAuth,
    Form(form): Form<OfflineForm>,
) -> Result<Response> {
    let enabled = form.offline.is_some();
    set_offline_mode(&session, enabled).await?;
    tracing::info!(offline_mode = enabled, "Offline mode changed");

    Ok(Redirect::to(&return_target(form.return_to.as_deref())).into_response())
}

/// "Check for Updates" quick action on the home page.
#[tracing::instrument(skip_all)]
pub async fn check_updates(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(_user): RequireAuth,
) -> Result<Response> {
    let offline = offline_mode(&session).await;
    let connectivity = SessionConnectivity::new(state.probe(), offline);

    let query = match state.diagnosis().check_for_updates(&connectivity).await? {
        UpdateStatus::Offline => "notice=updates_offline".to_string(),
        UpdateStatus::UpToDate => "notice=up_to_date".to_string(),
        UpdateStatus::Pulled(count) => format!("notice=pulled&count={count}"),
    };

    Ok(Redirect::to(&format!("{}?{query}", Page::Home.href())).into_response())
}
