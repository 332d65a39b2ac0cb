//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Redirect to /app/home
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (database)
//!
//! # Dashboard (requires auth)
//! GET  /app/{page}             - Dashboard page (home, disease-detection, ...)
//! POST /detect                 - Upload a photo, show the diagnosis
//! POST /feedback               - Rate the last diagnosis
//! POST /settings/offline       - Toggle offline mode
//! POST /updates/check          - Pull cloud updates
//!
//! # Auth
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action
//! GET  /auth/register          - Register page
//! POST /auth/register          - Register action
//! POST /auth/logout            - Logout action
//!
//! # PWA
//! GET  /manifest.json          - Web app manifest
//! GET  /service-worker.js      - Offline cache worker
//! ```

pub mod auth;
pub mod dashboard;
pub mod diagnosis;
pub mod health;
pub mod pwa;
pub mod settings;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    response::Redirect,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
}

/// Create the dashboard routes router.
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .route("/app/{page}", get(dashboard::show))
        .route(
            "/detect",
            post(diagnosis::detect).layer(DefaultBodyLimit::max(diagnosis::MAX_UPLOAD_BYTES)),
        )
        .route("/feedback", post(diagnosis::feedback))
        .route("/settings/offline", post(settings::toggle_offline))
        .route("/updates/check", post(settings::check_updates))
}

/// Create all routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/app/home") }))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/manifest.json", get(pwa::manifest))
        .route("/service-worker.js", get(pwa::service_worker))
        .merge(app_routes())
        .nest("/auth", auth_routes())
}
