//! Session middleware configuration.
//!
//! Sessions live in the same `SQLite` database as the credential store. Besides
//! the logged-in user they carry the offline-mode toggle and the last
//! diagnosis, read and written through the helpers below.

use sqlx::SqlitePool;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;

use crate::config::AppConfig;
use crate::models::{LastPrediction, session_keys};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "ph_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session store, creating its table if needed.
///
/// # Errors
///
/// Returns `sqlx::Error` if the sessions table cannot be created.
pub async fn create_session_store(pool: &SqlitePool) -> Result<SqliteStore, sqlx::Error> {
    let store = SqliteStore::new(pool.clone());
    store.migrate().await?;
    Ok(store)
}

/// Create the session layer over `store`.
#[must_use]
pub fn create_session_layer(
    store: SqliteStore,
    config: &AppConfig,
) -> SessionManagerLayer<SqliteStore> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Whether the user switched on "Offline Mode". Defaults to off.
pub async fn offline_mode(session: &Session) -> bool {
    session
        .get::<bool>(session_keys::OFFLINE_MODE)
        .await
        .ok()
        .flatten()
        .unwrap_or(false)
}

/// Store the offline-mode toggle.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_offline_mode(
    session: &Session,
    enabled: bool,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::OFFLINE_MODE, enabled).await
}

/// The diagnosis most recently shown to this session, if any.
pub async fn last_prediction(session: &Session) -> Option<LastPrediction> {
    session
        .get::<LastPrediction>(session_keys::LAST_PREDICTION)
        .await
        .ok()
        .flatten()
}

/// Remember the diagnosis just shown, so feedback can refer to it.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_last_prediction(
    session: &Session,
    prediction: &LastPrediction,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(session_keys::LAST_PREDICTION, prediction)
        .await
}
