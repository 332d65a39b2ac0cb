//! Authentication service.
//!
//! Username/password accounts backed by the `SQLite` credential store.
//! Passwords are stored as an unsalted hex SHA-256 digest: deterministic and
//! one-way, but weak against precomputed tables. Real account security is out
//! of scope for this application.

mod error;

pub use error::AuthError;

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use plant_health_core::{Email, Username};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new user.
    ///
    /// Returns `Ok(false)` when the username is already taken; nothing is
    /// written in that case.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername` / `AuthError::InvalidEmail` for
    /// malformed input and `AuthError::Repository` if the store is unavailable.
    pub async fn register(
        &self,
        username: &str,
        password: &SecretString,
        email: &str,
    ) -> Result<bool, AuthError> {
        let username = Username::parse(username)?;
        let email = Email::parse(email)?;
        let password_hash = hash_password(password);

        match self.users.create(&username, &password_hash, &email).await {
            Ok(()) => {
                tracing::info!(username = %username, "User registered");
                Ok(true)
            }
            Err(RepositoryError::Conflict(_)) => Ok(false),
            Err(other) => Err(AuthError::Repository(other)),
        }
    }

    /// Check a username/password pair.
    ///
    /// True iff a row exists for `username` (as typed) and its digest matches.
    /// Unknown users simply fail verification.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the store is unavailable.
    pub async fn verify(&self, username: &str, password: &SecretString) -> Result<bool, AuthError> {
        let Some(stored) = self.users.password_hash(username).await? else {
            return Ok(false);
        };

        Ok(stored == hash_password(password))
    }

    /// Number of registered users.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the store is unavailable.
    pub async fn user_count(&self) -> Result<i64, AuthError> {
        Ok(self.users.count().await?)
    }
}

/// Validate the sign-up password fields.
///
/// # Errors
///
/// Returns `AuthError::PasswordMismatch` if the confirmation differs, or
/// `AuthError::WeakPassword` if the password is shorter than
/// [`MIN_PASSWORD_LENGTH`].
pub fn validate_new_password(
    password: &SecretString,
    confirmation: &SecretString,
) -> Result<(), AuthError> {
    if password.expose_secret() != confirmation.expose_secret() {
        return Err(AuthError::PasswordMismatch);
    }

    if password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hex-encoded SHA-256 digest of a password.
#[must_use]
pub fn hash_password(password: &SecretString) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.expose_secret().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::{create_pool, init_schema};

    async fn pool() -> SqlitePool {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        init_schema(&pool).await.unwrap();
        pool
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn test_hash_password_is_sha256_hex() {
        assert_eq!(
            hash_password(&secret("password")),
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
        );
    }

    #[test]
    fn test_validate_new_password() {
        assert!(validate_new_password(&secret("secret1"), &secret("secret1")).is_ok());
        assert!(matches!(
            validate_new_password(&secret("secret1"), &secret("secret2")),
            Err(AuthError::PasswordMismatch)
        ));
        assert!(matches!(
            validate_new_password(&secret("abc"), &secret("abc")),
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[tokio::test]
    async fn test_register_twice_fails_and_keeps_count() {
        let pool = pool().await;
        let auth = AuthService::new(&pool);

        let first = auth
            .register("grower", &secret("tomato1"), "grower@example.com")
            .await
            .unwrap();
        assert!(first);
        assert_eq!(auth.user_count().await.unwrap(), 1);

        let second = auth
            .register("grower", &secret("other-pass"), "other@example.com")
            .await
            .unwrap();
        assert!(!second);
        assert_eq!(auth.user_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_verify() {
        let pool = pool().await;
        let auth = AuthService::new(&pool);
        auth.register("grower", &secret("tomato1"), "grower@example.com")
            .await
            .unwrap();

        assert!(auth.verify("grower", &secret("tomato1")).await.unwrap());
        assert!(!auth.verify("grower", &secret("tomato2")).await.unwrap());
        assert!(!auth.verify("stranger", &secret("tomato1")).await.unwrap());
        assert!(!auth.verify("", &secret("tomato1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_rows_without_valid_email() {
        let pool = pool().await;
        let digest = hash_password(&secret("tomato1"));
        for (name, email) in [("farmer", ""), ("planter", "call me")] {
            sqlx::query("INSERT INTO users (username, password, email) VALUES (?1, ?2, ?3)")
                .bind(name)
                .bind(&digest)
                .bind(email)
                .execute(&pool)
                .await
                .unwrap();
        }

        let auth = AuthService::new(&pool);
        assert!(auth.verify("farmer", &secret("tomato1")).await.unwrap());
        assert!(auth.verify("planter", &secret("tomato1")).await.unwrap());
        assert!(!auth.verify("farmer", &secret("tomato2")).await.unwrap());
    }

    #[tokio::test]
    async fn test_register_rejects_bad_email() {
        let pool = pool().await;
        let auth = AuthService::new(&pool);
        let result = auth.register("grower", &secret("tomato1"), "not-an-email").await;
        assert!(matches!(result, Err(AuthError::InvalidEmail(_))));
        assert_eq!(auth.user_count().await.unwrap(), 0);
    }
}
