//! Schema setup for the credential store.
//!
//! # Usage
//!
//! ```bash
//! ph-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `PLANT_HEALTH_DATABASE_URL` - `SQLite` connection string (default: `sqlite://users.db`)
//!
//! The web server runs the same steps at startup, so this is only needed to
//! prepare a database ahead of time.

use plant_health_web::config::AppConfig;
use plant_health_web::{db, middleware};

/// Create the `users` and session tables if they do not exist.
///
/// # Errors
///
/// Returns `sqlx::Error` if the database cannot be opened or written.
pub async fn run(config: &AppConfig) -> Result<(), sqlx::Error> {
    tracing::info!(database = %config.database_url, "Opening credential store...");
    let pool = db::create_pool(&config.database_url).await?;

    tracing::info!("Creating users table...");
    db::init_schema(&pool).await?;

    tracing::info!("Creating sessions table...");
    middleware::create_session_store(&pool).await?;

    tracing::info!("Schema ready");
    Ok(())
}
