//! Dashboard pages.
//!
//! Every page shares the same frame: the tile grid of pages, the online
//! status, the logged-in user and the offline toggle. [`Page`] names the
//! pages; [`show`] dispatches to one renderer per page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use plant_health_core::{FeedbackCategory, PredictionRecord, TreatmentInfo};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{RequireAuth, offline_mode};
use crate::models::CurrentUser;
use crate::services::connectivity::{Connectivity, SessionConnectivity};
use crate::services::treatment;
use crate::state::AppState;

/// General tips shown on the Prevention Tips page.
pub const PREVENTION_TIPS: [&str; 8] = [
    "🌱 Use disease-resistant plant varieties when available",
    "💧 Water plants at the base to avoid wetting foliage",
    "🌞 Ensure plants get adequate sunlight and air circulation",
    "🧤 Practice good sanitation - clean tools and remove diseased plants",
    "🔄 Rotate crops each season to prevent soil-borne diseases",
    "🔍 Regularly inspect plants for early signs of disease",
    "⚖️ Avoid over-fertilizing which can make plants more susceptible",
    "🐝 Encourage beneficial insects that prey on pests",
];

/// Support contact shown by the "Get Help" quick action.
pub const SUPPORT_EMAIL: &str = "support.planthealth@gmail.com";

// =============================================================================
// Pages
// =============================================================================

/// A dashboard page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Home,
    DiseaseDetection,
    PestIdentification,
    TreatmentGuide,
    PreventionTips,
    History,
}

impl Page {
    /// Every page, in tile order.
    pub const ALL: [Self; 6] = [
        Self::Home,
        Self::DiseaseDetection,
        Self::PestIdentification,
        Self::TreatmentGuide,
        Self::PreventionTips,
        Self::History,
    ];

    /// URL segment under `/app/`.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::DiseaseDetection => "disease-detection",
            Self::PestIdentification => "pest-identification",
            Self::TreatmentGuide => "treatment-guide",
            Self::PreventionTips => "prevention-tips",
            Self::History => "history",
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Home => "Home",
            Self::DiseaseDetection => "Disease Detection",
            Self::PestIdentification => "Pest Identification",
            Self::TreatmentGuide => "Treatment Guide",
            Self::PreventionTips => "Prevention Tips",
            Self::History => "History",
        }
    }

    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Home => "🏠",
            Self::DiseaseDetection => "🔍",
            Self::PestIdentification => "🐛",
            Self::TreatmentGuide => "💊",
            Self::PreventionTips => "🛡️",
            Self::History => "🕒",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Home => "Main overview",
            Self::DiseaseDetection => "Identify plant diseases",
            Self::PestIdentification => "Recognize common pests",
            Self::TreatmentGuide => "Recommended treatments",
            Self::PreventionTips => "Disease prevention methods",
            Self::History => "Past predictions",
        }
    }

    /// Absolute path of the page.
    #[must_use]
    pub fn href(self) -> String {
        format!("/app/{}", self.slug())
    }

    #[must_use]
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|page| page.slug() == slug)
    }
}

// =============================================================================
// Shared Frame
// =============================================================================

/// Data every dashboard page renders around its content.
pub struct DashboardContext {
    pub username: String,
    pub online: bool,
    pub offline_mode: bool,
    pub current: Page,
    pub pages: [Page; 6],
}

impl DashboardContext {
    /// Build the frame for `current`. Probes connectivity (unless the session
    /// forced offline mode).
    pub async fn load(
        state: &AppState,
        session: &Session,
        user: &CurrentUser,
        current: Page,
    ) -> Self {
        let offline_mode = offline_mode(session).await;
        let online = SessionConnectivity::new(state.probe(), offline_mode)
            .is_online()
            .await;

        Self {
            username: user.username.to_string(),
            online,
            offline_mode,
            current,
            pages: Page::ALL,
        }
    }

    /// Whether `page` is the one being shown.
    #[must_use]
    pub fn is_current(&self, page: &Page) -> bool {
        self.current == *page
    }
}

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters accepted by dashboard pages.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// Treatment Guide selection.
    pub disease: Option<String>,
    /// Short error code from a failed form.
    pub error: Option<String>,
    /// Short notice code from a completed action.
    pub notice: Option<String>,
    /// Count attached to some notices.
    pub count: Option<usize>,
}

/// Text for an error code passed back by a form handler.
#[must_use]
pub fn error_message(code: &str) -> &'static str {
    match code {
        "no_file" => "Please choose an image to upload",
        "unsupported_type" => "Unsupported file type. Upload a JPG, JPEG, PNG or GIF image",
        "decode" => "Could not read the uploaded image",
        "feedback" => "Please select how accurate the diagnosis was",
        "no_prediction" => "There is no diagnosis to give feedback on",
        _ => "Something went wrong",
    }
}

/// Text for a notice code passed back by an action handler.
#[must_use]
pub fn notice_message(code: &str, count: Option<usize>) -> String {
    match code {
        "up_to_date" => "System is up to date!".to_string(),
        "updates_offline" => "Cannot check for updates - you're offline".to_string(),
        "pulled" => format!("Pulled {} new records from the cloud", count.unwrap_or(0)),
        "statistics" => "Feature coming soon!".to_string(),
        "help" => format!("Contact {SUPPORT_EMAIL}"),
        "feedback_thanks" => "Thank you for your feedback!".to_string(),
        _ => String::new(),
    }
}

// =============================================================================
// Templates
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/home.html")]
pub struct HomeTemplate {
    pub ctx: DashboardContext,
    pub notice: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/detection.html")]
pub struct DetectionTemplate {
    pub ctx: DashboardContext,
    pub error: Option<String>,
    pub notice: Option<String>,
}

/// Result of a diagnosis, with the feedback form.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard/result.html")]
pub struct ResultTemplate {
    pub ctx: DashboardContext,
    pub disease_name: String,
    pub image_name: String,
    pub treatment: TreatmentInfo,
    pub synced: bool,
    pub categories: [FeedbackCategory; 3],
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/pests.html")]
pub struct PestsTemplate {
    pub ctx: DashboardContext,
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/treatments.html")]
pub struct TreatmentsTemplate {
    pub ctx: DashboardContext,
    pub diseases: Vec<&'static str>,
    pub selected: String,
    pub treatment: TreatmentInfo,
}

impl TreatmentsTemplate {
    fn is_selected(&self, name: &str) -> bool {
        self.selected == name
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/prevention.html")]
pub struct PreventionTemplate {
    pub ctx: DashboardContext,
    pub tips: [&'static str; 8],
}

#[derive(Template, WebTemplate)]
#[template(path = "dashboard/history.html")]
pub struct HistoryTemplate {
    pub ctx: DashboardContext,
    pub predictions: Vec<PredictionRecord>,
}

// =============================================================================
// Routes
// =============================================================================

/// Show a dashboard page.
#[tracing::instrument(skip_all, fields(page = %slug))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response> {
    let page = Page::from_slug(&slug).ok_or_else(|| AppError::NotFound(slug.clone()))?;
    let ctx = DashboardContext::load(&state, &session, &user, page).await;

    let response = match page {
        Page::Home => home(ctx, &query),
        Page::DiseaseDetection => disease_detection(ctx, &query),
        Page::PestIdentification => PestsTemplate { ctx }.into_response(),
        Page::TreatmentGuide => treatment_guide(ctx, &query),
        Page::PreventionTips => PreventionTemplate {
            ctx,
            tips: PREVENTION_TIPS,
        }
        .into_response(),
        Page::History => history(&state, ctx).await,
    };

    Ok(response)
}

fn home(ctx: DashboardContext, query: &PageQuery) -> Response {
    let notice = query
        .notice
        .as_deref()
        .map(|code| notice_message(code, query.count))
        .filter(|message| !message.is_empty());

    HomeTemplate { ctx, notice }.into_response()
}

fn disease_detection(ctx: DashboardContext, query: &PageQuery) -> Response {
    DetectionTemplate {
        ctx,
        error: query.error.as_deref().map(|code| error_message(code).to_string()),
        notice: query
            .notice
            .as_deref()
            .map(|code| notice_message(code, query.count))
            .filter(|message| !message.is_empty()),
    }
    .into_response()
}

fn treatment_guide(ctx: DashboardContext, query: &PageQuery) -> Response {
    let diseases = treatment::local_labels();
    let selected = query
        .disease
        .as_deref()
        .and_then(|wanted| diseases.iter().find(|name| **name == wanted))
        .or_else(|| diseases.first())
        .map_or_else(String::new, |name| (*name).to_string());
    let treatment = treatment::local(&selected);

    TreatmentsTemplate {
        ctx,
        diseases,
        selected,
        treatment,
    }
    .into_response()
}

async fn history(state: &AppState, ctx: DashboardContext) -> Response {
    let predictions = state.diagnosis().history().await;
    HistoryTemplate { ctx, predictions }.into_response()
}

/// Detection page with an error banner and a non-200 status.
pub fn detection_error(ctx: DashboardContext, status: StatusCode, message: String) -> Response {
    (
        status,
        DetectionTemplate {
            ctx,
            error: Some(message),
            notice: None,
        },
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_round_trip() {
        for page in Page::ALL {
            assert_eq!(Page::from_slug(page.slug()), Some(page));
        }
        assert_eq!(Page::from_slug("settings"), None);
    }

    #[test]
    fn test_page_metadata() {
        assert_eq!(Page::TreatmentGuide.title(), "Treatment Guide");
        assert_eq!(Page::History.href(), "/app/history");
        assert_eq!(Page::PestIdentification.description(), "Recognize common pests");
    }

    #[test]
    fn test_notice_messages() {
        assert_eq!(notice_message("up_to_date", None), "System is up to date!");
        assert_eq!(notice_message("pulled", Some(3)), "Pulled 3 new records from the cloud");
        assert!(notice_message("help", None).contains(SUPPORT_EMAIL));
        assert!(notice_message("<script>", None).is_empty());
    }

    #[test]
    fn test_unknown_error_code_is_generic() {
        assert_eq!(error_message("whatever"), "Something went wrong");
    }
}
