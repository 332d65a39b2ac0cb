//! Integration tests for the Plant Health Assistant.
//!
//! Each test starts the full application on an ephemeral port, backed by an
//! in-memory `SQLite` database and a temporary working directory, and talks
//! to it over HTTP with a cookie-keeping client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p plant-health-integration-tests
//! ```
//!
//! No network access is needed: the model is replaced by a fixed-score
//! classifier and every remote endpoint points at a closed local port.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use plant_health_core::{DiseaseLabel, LedgerFile};
use plant_health_web::config::{AppConfig, ModelConfig, NetworkConfig};
use plant_health_web::services::FixedConnectivity;
use plant_health_web::services::inference::{
    Classifier, InferenceError, InferencePipeline, InputTensor, ModelLoader,
};
use plant_health_web::state::AppState;
use plant_health_web::{app, db, middleware};
use tempfile::TempDir;
use url::Url;

/// Password used for accounts created by [`TestApp::register_and_login`].
pub const TEST_PASSWORD: &str = "tomato-secret";

// =============================================================================
// Stub Model
// =============================================================================

/// Classifier that ignores its input and returns fixed scores.
struct FixedScores(Vec<f32>);

impl Classifier for FixedScores {
    fn scores(&self, _input: &InputTensor) -> Result<Vec<f32>, InferenceError> {
        Ok(self.0.clone())
    }
}

/// Loader that hands out a [`FixedScores`] classifier for any model file.
struct FixedScoresLoader(Vec<f32>);

impl ModelLoader for FixedScoresLoader {
    fn load(&self, _path: &Path) -> Result<Box<dyn Classifier>, InferenceError> {
        Ok(Box::new(FixedScores(self.0.clone())))
    }
}

/// Scores that make `label` the top class.
#[must_use]
pub fn scores_for(label: DiseaseLabel) -> Vec<f32> {
    DiseaseLabel::ALL
        .iter()
        .map(|candidate| if *candidate == label { 0.9 } else { 0.01 })
        .collect()
}

// =============================================================================
// Test Application
// =============================================================================

/// How to start a [`TestApp`].
pub struct TestAppOptions {
    /// What the connectivity probe reports.
    pub online: bool,
    /// Label the stub classifier predicts.
    pub label: DiseaseLabel,
    /// Raw classifier output; overrides `label` when set.
    pub scores: Option<Vec<f32>>,
    /// Whether a model file exists at the canonical path.
    pub with_model: bool,
}

impl Default for TestAppOptions {
    fn default() -> Self {
        Self {
            online: false,
            label: DiseaseLabel::EarlyBlight,
            scores: None,
            with_model: true,
        }
    }
}

/// A running application plus a client holding its session cookie.
pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub config: AppConfig,
    _dir: TempDir,
}

impl TestApp {
    /// Start with default options: offline, predicting early blight.
    pub async fn spawn() -> Self {
        Self::spawn_with(TestAppOptions::default()).await
    }

    pub async fn spawn_with(options: TestAppOptions) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = test_config(dir.path());

        if options.with_model {
            std::fs::write(&config.model.canonical_path, b"stub model").expect("write model");
        }

        let pool = db::create_pool(&config.database_url)
            .await
            .expect("open database");
        db::init_schema(&pool).await.expect("create users table");
        let store = middleware::create_session_store(&pool)
            .await
            .expect("create sessions table");
        let session_layer = middleware::create_session_layer(store, &config);

        let scores = options
            .scores
            .unwrap_or_else(|| scores_for(options.label));
        let state = AppState::builder(config.clone(), pool)
            .with_probe(Arc::new(FixedConnectivity(options.online)))
            .with_pipeline(InferencePipeline::new(Arc::new(FixedScoresLoader(scores))))
            .build();
        let router = app(state, session_layer);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("server error");
        });

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("build client");

        Self {
            base_url: format!("http://{addr}"),
            client,
            config,
            _dir: dir,
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request")
    }

    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST request")
    }

    /// Register `username` and log in, leaving the session cookie in the client.
    pub async fn register_and_login(&self, username: &str) {
        let email = format!("{username}@example.com");
        let resp = self
            .post_form(
                "/auth/register",
                &[
                    ("username", username),
                    ("email", &email),
                    ("password", TEST_PASSWORD),
                    ("password_confirm", TEST_PASSWORD),
                ],
            )
            .await;
        assert_eq!(location(&resp), "/auth/login?success=registered");

        let resp = self
            .post_form(
                "/auth/login",
                &[("username", username), ("password", TEST_PASSWORD)],
            )
            .await;
        assert_eq!(location(&resp), "/app/home");
    }

    /// Upload `bytes` as the detection form's image field.
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("image", part);
        self.client
            .post(self.url("/detect"))
            .multipart(form)
            .send()
            .await
            .expect("upload request")
    }

    /// Current contents of the prediction ledger.
    #[must_use]
    pub fn ledger(&self) -> LedgerFile {
        std::fs::read_to_string(&self.config.ledger_path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.config.ledger_path.clone()
    }
}

/// The `Location` header of a redirect.
#[must_use]
pub fn location(resp: &reqwest::Response) -> String {
    resp.headers()
        .get(reqwest::header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// A small solid-green PNG.
#[must_use]
pub fn leaf_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(32, 24, image::Rgb([40, 160, 60]));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encode png");
    bytes.into_inner()
}

/// Configuration rooted in `dir`, with every remote endpoint unreachable.
#[must_use]
pub fn test_config(dir: &Path) -> AppConfig {
    AppConfig {
        host: "127.0.0.1".parse().expect("ip"),
        port: 0,
        base_url: "http://localhost:8501".to_string(),
        database_url: "sqlite::memory:".to_string(),
        ledger_path: dir.join("local_predictions.json"),
        model: ModelConfig {
            canonical_path: dir.join("trained_model2.onnx"),
            cache_path: dir.join("local_cache/model.onnx"),
        },
        network: NetworkConfig {
            probe_url: Url::parse("http://127.0.0.1:9/").expect("url"),
            probe_timeout: Duration::from_millis(200),
            treatment_url: "http://127.0.0.1:9/treatment/".to_string(),
            treatment_timeout: Duration::from_millis(200),
        },
        sync_delay: Duration::ZERO,
        sentry_dsn: None,
        sentry_environment: None,
    }
}
