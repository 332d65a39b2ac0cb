//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::services::{
    CloudSync, Connectivity, DiagnosisService, HttpProbe, InferencePipeline, ModelCache,
    PredictionLedger, SimulatedCloudSync, TreatmentLookup,
};

/// Application state shared across all handlers.
///
/// Cloning is cheap. The diagnosis components live behind
/// [`diagnosis`](Self::diagnosis); the credential store behind [`pool`](Self::pool).
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pool: SqlitePool,
    ledger: PredictionLedger,
    models: ModelCache,
    pipeline: InferencePipeline,
    treatments: TreatmentLookup,
    probe: Arc<dyn Connectivity>,
    sync: Arc<dyn CloudSync>,
}

impl AppState {
    /// Create the production state: HTTP probe, ONNX pipeline, simulated sync.
    #[must_use]
    pub fn new(config: AppConfig, pool: SqlitePool) -> Self {
        Self::builder(config, pool).build()
    }

    /// Start building state with swappable probe, pipeline and sync.
    #[must_use]
    pub fn builder(config: AppConfig, pool: SqlitePool) -> AppStateBuilder {
        AppStateBuilder {
            probe: None,
            pipeline: None,
            sync: None,
            config,
            pool,
        }
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    /// The shared connectivity probe (ignores the session's offline toggle).
    #[must_use]
    pub fn probe(&self) -> &dyn Connectivity {
        self.inner.probe.as_ref()
    }

    /// Diagnosis service over the shared components.
    #[must_use]
    pub fn diagnosis(&self) -> DiagnosisService<'_> {
        DiagnosisService::new(
            &self.inner.ledger,
            &self.inner.models,
            &self.inner.pipeline,
            &self.inner.treatments,
            self.inner.sync.as_ref(),
        )
    }
}

/// Builder for [`AppState`].
pub struct AppStateBuilder {
    config: AppConfig,
    pool: SqlitePool,
    probe: Option<Arc<dyn Connectivity>>,
    pipeline: Option<InferencePipeline>,
    sync: Option<Arc<dyn CloudSync>>,
}

impl AppStateBuilder {
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn Connectivity>) -> Self {
        self.probe = Some(probe);
        self
    }

    #[must_use]
    pub fn with_pipeline(mut self, pipeline: InferencePipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    #[must_use]
    pub fn with_sync(mut self, sync: Arc<dyn CloudSync>) -> Self {
        self.sync = Some(sync);
        self
    }

    /// Defaults: HTTP probe from config, ONNX pipeline, simulated sync.
    #[must_use]
    pub fn build(self) -> AppState {
        let Self {
            config,
            pool,
            probe,
            pipeline,
            sync,
        } = self;

        // Shared by the probe and the treatment lookup.
        let client = reqwest::Client::new();

        let probe: Arc<dyn Connectivity> = match probe {
            Some(probe) => probe,
            None => Arc::new(HttpProbe::new(
                client.clone(),
                config.network.probe_url.clone(),
                config.network.probe_timeout,
            )),
        };
        let sync: Arc<dyn CloudSync> = match sync {
            Some(sync) => sync,
            None => Arc::new(SimulatedCloudSync::new(config.sync_delay)),
        };

        AppState {
            inner: Arc::new(AppStateInner {
                ledger: PredictionLedger::new(&config.ledger_path),
                models: ModelCache::from_config(&config.model),
                pipeline: pipeline.unwrap_or_else(InferencePipeline::onnx),
                treatments: TreatmentLookup::from_config(client, &config.network),
                probe,
                sync,
                pool,
            }),
        }
    }
}
