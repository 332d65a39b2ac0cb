//! Application configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional; defaults reproduce a single-user local install
//! where every file lives in the working directory.
//!
//! - `PLANT_HEALTH_HOST` - Bind address (default: 127.0.0.1)
//! - `PLANT_HEALTH_PORT` - Listen port (default: 8501)
//! - `PLANT_HEALTH_BASE_URL` - Public URL (default: <http://localhost:8501>)
//! - `PLANT_HEALTH_DATABASE_URL` - `SQLite` credential store (default: `sqlite://users.db`)
//! - `PLANT_HEALTH_LEDGER_PATH` - Prediction ledger file (default: `local_predictions.json`)
//! - `PLANT_HEALTH_MODEL_PATH` - Bundled model artifact (default: `trained_model2.onnx`)
//! - `PLANT_HEALTH_MODEL_CACHE_PATH` - Cached model copy (default: `local_cache/model.onnx`)
//! - `PLANT_HEALTH_PROBE_URL` - Connectivity check target (default: <https://www.google.com>)
//! - `PLANT_HEALTH_PROBE_TIMEOUT_MS` - Connectivity check timeout (default: 2000)
//! - `PLANT_HEALTH_TREATMENT_URL` - Prefix the disease name is appended to
//! - `PLANT_HEALTH_TREATMENT_TIMEOUT_MS` - Treatment fetch timeout (default: 3000)
//! - `PLANT_HEALTH_SYNC_DELAY_MS` - Simulated cloud sync latency (default: 1000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default treatment-info source. The disease name is appended verbatim.
pub const DEFAULT_TREATMENT_URL: &str = "https://www.researchgate.net/publication/366308502_An_Automatic_Recommendation_System_for_Plant_Disease_Treatment";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Plant Health application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// `SQLite` connection URL for credentials and sessions
    pub database_url: String,
    /// Prediction ledger JSON file
    pub ledger_path: PathBuf,
    /// Model artifact locations
    pub model: ModelConfig,
    /// Remote endpoints used while online
    pub network: NetworkConfig,
    /// Artificial latency of the simulated cloud sync
    pub sync_delay: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Where the trained model lives.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Canonical (bundled) artifact.
    pub canonical_path: PathBuf,
    /// Local copy refreshed while online.
    pub cache_path: PathBuf,
}

/// Remote endpoints and their timeouts.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// URL probed to decide whether the app is online.
    pub probe_url: Url,
    pub probe_timeout: Duration,
    /// Prefix of the treatment-info URL; the disease name is appended.
    pub treatment_url: String,
    pub treatment_timeout: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("PLANT_HEALTH_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("PLANT_HEALTH_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("PLANT_HEALTH_PORT", "8501")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("PLANT_HEALTH_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_env_or_default("PLANT_HEALTH_BASE_URL", "http://localhost:8501");
        parse_url("PLANT_HEALTH_BASE_URL", &base_url)?;

        Ok(Self {
            host,
            port,
            base_url,
            database_url: get_env_or_default("PLANT_HEALTH_DATABASE_URL", "sqlite://users.db"),
            ledger_path: get_env_or_default("PLANT_HEALTH_LEDGER_PATH", "local_predictions.json")
                .into(),
            model: ModelConfig::from_env(),
            network: NetworkConfig::from_env()?,
            sync_delay: get_millis("PLANT_HEALTH_SYNC_DELAY_MS", 1000)?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl ModelConfig {
    fn from_env() -> Self {
        Self {
            canonical_path: get_env_or_default("PLANT_HEALTH_MODEL_PATH", "trained_model2.onnx")
                .into(),
            cache_path: get_env_or_default("PLANT_HEALTH_MODEL_CACHE_PATH", "local_cache/model.onnx")
                .into(),
        }
    }
}

impl NetworkConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let probe_url = get_env_or_default("PLANT_HEALTH_PROBE_URL", "https://www.google.com");
        let treatment_url = get_env_or_default("PLANT_HEALTH_TREATMENT_URL", DEFAULT_TREATMENT_URL);
        parse_url("PLANT_HEALTH_TREATMENT_URL", &treatment_url)?;

        Ok(Self {
            probe_url: parse_url("PLANT_HEALTH_PROBE_URL", &probe_url)?,
            probe_timeout: get_millis("PLANT_HEALTH_PROBE_TIMEOUT_MS", 2000)?,
            treatment_url,
            treatment_timeout: get_millis("PLANT_HEALTH_TREATMENT_TIMEOUT_MS", 3000)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a millisecond duration, falling back to `default_ms` when unset.
fn get_millis(key: &str, default_ms: u64) -> Result<Duration, ConfigError> {
    match get_optional_env(key) {
        Some(raw) => parse_millis(key, &raw),
        None => Ok(Duration::from_millis(default_ms)),
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Require an absolute http(s) URL.
fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url =
        Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme '{other}'"),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// Configuration rooted in `dir`, with every remote endpoint unreachable.
    pub(crate) fn test_config(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 8501,
            base_url: "http://localhost:8501".to_string(),
            database_url: "sqlite::memory:".to_string(),
            ledger_path: dir.join("local_predictions.json"),
            model: ModelConfig {
                canonical_path: dir.join("trained_model2.onnx"),
                cache_path: dir.join("local_cache/model.onnx"),
            },
            network: NetworkConfig {
                probe_url: Url::parse("http://127.0.0.1:9/").unwrap(),
                probe_timeout: Duration::from_millis(200),
                treatment_url: "http://127.0.0.1:9/treatment/".to_string(),
                treatment_timeout: Duration::from_millis(200),
            },
            sync_delay: Duration::ZERO,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_socket_addr() {
        let config = test_config(std::path::Path::new("."));
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8501);
    }

    #[test]
    fn test_is_secure() {
        let mut config = test_config(std::path::Path::new("."));
        assert!(!config.is_secure());
        config.base_url = "https://plants.example.org".to_string();
        assert!(config.is_secure());
    }

    #[test]
    fn test_parse_millis() {
        assert_eq!(
            parse_millis("X", "2500").unwrap(),
            Duration::from_millis(2500)
        );
        assert!(matches!(
            parse_millis("X", "soon"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_parse_url_requires_http() {
        assert!(parse_url("X", "https://www.google.com").is_ok());
        assert!(parse_url("X", "ftp://example.com").is_err());
        assert!(parse_url("X", "not a url").is_err());
    }

    #[test]
    fn test_default_treatment_url_is_valid() {
        assert!(parse_url("X", DEFAULT_TREATMENT_URL).is_ok());
    }
}
