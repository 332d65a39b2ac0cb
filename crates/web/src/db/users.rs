//! User repository for the credential store.
//!
//! Queries are built at runtime (`sqlx::query`) so the crate builds without a
//! database present.

use sqlx::SqlitePool;

use plant_health_core::{Email, Username};

use super::RepositoryError;

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        username: &Username,
        password_hash: &str,
        email: &Email,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO users (username, password, email) VALUES (?1, ?2, ?3)",
        )
        .bind(username.as_str())
        .bind(password_hash)
        .bind(email.as_str())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "username '{username}' already exists"
            )));
        }
        Ok(())
    }

    /// Stored password digest for `username`, matched exactly as given.
    ///
    /// Only the digest column is read, so rows written without a valid email
    /// (or with none) still authenticate. A NULL digest reads as `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn password_hash(&self, username: &str) -> Result<Option<String>, RepositoryError> {
        let digest: Option<Option<String>> =
            sqlx::query_scalar("SELECT password FROM users WHERE username = ?1")
                .bind(username)
                .fetch_optional(self.pool)
                .await?;
        Ok(digest.flatten())
    }

    /// Number of registered users.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
