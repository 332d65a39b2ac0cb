//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! ph-cli user create -u grower -e grower@example.com -p secret1
//! ```

use plant_health_web::config::AppConfig;
use plant_health_web::db;
use plant_health_web::services::auth::{AuthError, AuthService, validate_new_password};
use secrecy::SecretString;
use thiserror::Error;

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Validation or storage failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// User already exists.
    #[error("User already exists: {0}")]
    UserExists(String),
}

/// Register a new user.
///
/// The password is validated the same way as on the sign-up page (there is
/// no separate confirmation on the command line).
///
/// # Errors
///
/// Returns `UserError::UserExists` if the username is taken, and
/// `UserError::Auth` if a field fails validation.
pub async fn create(
    config: &AppConfig,
    username: &str,
    email: &str,
    password: String,
) -> Result<(), UserError> {
    let password = SecretString::from(password);
    validate_new_password(&password, &password)?;

    let pool = db::create_pool(&config.database_url).await?;
    db::init_schema(&pool).await?;

    tracing::info!("Creating user: {username} <{email}>");
    if !AuthService::new(&pool).register(username, &password, email).await? {
        return Err(UserError::UserExists(username.to_owned()));
    }

    tracing::info!("User created successfully");
    Ok(())
}
