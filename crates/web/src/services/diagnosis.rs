//! Diagnosis orchestration.
//!
//! Ties the pieces together for one upload: pick a model file, classify the
//! image, look up treatment advice, record the result locally, then try to
//! sync it. Local persistence always happens first; sync is opportunistic.

use thiserror::Error;

use plant_health_core::{
    DiseaseLabel, FeedbackCategory, FeedbackRecord, PredictionRecord, TreatmentInfo,
};

use super::connectivity::Connectivity;
use super::inference::{InferenceError, InferencePipeline};
use super::ledger::{LedgerError, PredictionLedger};
use super::model_cache::{ModelCache, ModelError};
use super::sync::{CloudSync, SyncError};
use super::treatment::TreatmentLookup;

/// Ledger timestamp format (local time).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum DiagnosisError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Outcome of a successful diagnosis.
#[derive(Debug, Clone)]
pub struct Diagnosis {
    pub label: DiseaseLabel,
    /// Position of the record in the ledger.
    pub ledger_index: usize,
    /// The record as last written.
    pub record: PredictionRecord,
}

impl Diagnosis {
    #[must_use]
    pub const fn treatment(&self) -> &TreatmentInfo {
        &self.record.treatment_info
    }

    #[must_use]
    pub const fn synced(&self) -> bool {
        self.record.synced
    }
}

/// Result of a "check for updates" request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// No connection; nothing was checked.
    Offline,
    /// Connected and nothing new.
    UpToDate,
    /// Connected and this many records were pulled into the ledger.
    Pulled(usize),
}

/// Current local time in ledger format.
#[must_use]
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Runs diagnoses and records feedback.
pub struct DiagnosisService<'a> {
    ledger: &'a PredictionLedger,
    models: &'a ModelCache,
    pipeline: &'a InferencePipeline,
    treatments: &'a TreatmentLookup,
    sync: &'a dyn CloudSync,
}

impl<'a> DiagnosisService<'a> {
    #[must_use]
    pub const fn new(
        ledger: &'a PredictionLedger,
        models: &'a ModelCache,
        pipeline: &'a InferencePipeline,
        treatments: &'a TreatmentLookup,
        sync: &'a dyn CloudSync,
    ) -> Self {
        Self {
            ledger,
            models,
            pipeline,
            treatments,
            sync,
        }
    }

    /// Diagnose one photo.
    ///
    /// The prediction is appended to the ledger unsynced. If online and the
    /// cloud accepts it, the ledger entry is then flipped to synced.
    ///
    /// # Errors
    ///
    /// - `DiagnosisError::Model` if no model file exists
    /// - `DiagnosisError::Inference` if the image or model is unusable
    /// - `DiagnosisError::Ledger` if the result cannot be recorded
    #[tracing::instrument(skip(self, image, connectivity), fields(bytes = image.len()))]
    pub async fn diagnose(
        &self,
        image_name: &str,
        image: Vec<u8>,
        connectivity: &dyn Connectivity,
    ) -> Result<Diagnosis, DiagnosisError> {
        let model_path = self.models.resolve_model_path(connectivity).await?;
        let label = self.pipeline.predict_label(&model_path, image).await?;
        let treatment = self.treatments.lookup(label.as_str(), connectivity).await;

        let mut record = PredictionRecord::new(timestamp_now(), image_name, label, treatment);
        let ledger_index = self.ledger.append_prediction(record.clone()).await?;
        tracing::info!(label = %label, ledger_index, "Prediction recorded");

        if connectivity.is_online().await {
            match self.sync.push_prediction(&record).await {
                Ok(()) => {
                    self.ledger.mark_prediction_synced(ledger_index, true).await?;
                    record.synced = true;
                }
                Err(e) => tracing::warn!(error = %e, "Prediction sync failed, kept locally"),
            }
        }

        Ok(Diagnosis {
            label,
            ledger_index,
            record,
        })
    }

    /// Record grower feedback on a prediction.
    ///
    /// # Errors
    ///
    /// Returns `DiagnosisError::Ledger` if the feedback cannot be recorded.
    #[tracing::instrument(skip(self, notes, connectivity))]
    pub async fn submit_feedback(
        &self,
        prediction: &str,
        feedback: FeedbackCategory,
        notes: &str,
        connectivity: &dyn Connectivity,
    ) -> Result<FeedbackRecord, DiagnosisError> {
        let mut record = FeedbackRecord {
            timestamp: timestamp_now(),
            prediction: prediction.to_string(),
            feedback,
            notes: notes.to_string(),
            synced: false,
        };
        let index = self.ledger.append_feedback(record.clone()).await?;

        if connectivity.is_online().await {
            match self.sync.push_feedback(&record).await {
                Ok(()) => {
                    self.ledger.mark_feedback_synced(index, true).await?;
                    record.synced = true;
                }
                Err(e) => tracing::warn!(error = %e, "Feedback sync failed, kept locally"),
            }
        }

        Ok(record)
    }

    /// All predictions, newest first.
    pub async fn history(&self) -> Vec<PredictionRecord> {
        let mut predictions = self.ledger.load().await.predictions;
        predictions.reverse();
        predictions
    }

    /// Pull remote records into the ledger.
    ///
    /// # Errors
    ///
    /// Returns `DiagnosisError::Sync` if the pull fails and
    /// `DiagnosisError::Ledger` if pulled records cannot be stored.
    pub async fn check_for_updates(
        &self,
        connectivity: &dyn Connectivity,
    ) -> Result<UpdateStatus, DiagnosisError> {
        if !connectivity.is_online().await {
            return Ok(UpdateStatus::Offline);
        }

        let updates = self.sync.pull_updates().await?;
        match self.ledger.merge(updates).await? {
            0 => Ok(UpdateStatus::UpToDate),
            n => Ok(UpdateStatus::Pulled(n)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use plant_health_core::LedgerFile;

    use super::*;
    use crate::services::connectivity::FixedConnectivity;
    use crate::services::inference::tests::{StubLoader, test_png};

    /// Sync backend that counts pushes and can be told to fail.
    struct RecordingSync {
        pushes: AtomicUsize,
        fail: bool,
    }

    impl RecordingSync {
        fn new(fail: bool) -> Self {
            Self {
                pushes: AtomicUsize::new(0),
                fail,
            }
        }

        fn result(&self) -> Result<(), SyncError> {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SyncError::Remote("unreachable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CloudSync for RecordingSync {
        async fn push_prediction(&self, _: &PredictionRecord) -> Result<(), SyncError> {
            self.result()
        }

        async fn push_feedback(&self, _: &FeedbackRecord) -> Result<(), SyncError> {
            self.result()
        }

        async fn pull_updates(&self) -> Result<LedgerFile, SyncError> {
            Ok(LedgerFile::default())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        ledger: PredictionLedger,
        models: ModelCache,
        pipeline: InferencePipeline,
        treatments: TreatmentLookup,
    }

    impl Fixture {
        fn new(top: DiseaseLabel) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let canonical = dir.path().join("trained_model2.onnx");
            std::fs::write(&canonical, b"stub").unwrap();

            let mut scores = vec![0.0; DiseaseLabel::COUNT];
            scores[top.index()] = 1.0;

            Self {
                ledger: PredictionLedger::new(dir.path().join("ledger.json")),
                models: ModelCache::new(canonical, dir.path().join("local_cache/model.onnx")),
                pipeline: InferencePipeline::new(Arc::new(StubLoader(scores))),
                treatments: TreatmentLookup::new(
                    reqwest::Client::new(),
                    "http://127.0.0.1:9/treatment/",
                    Duration::from_millis(200),
                ),
                _dir: dir,
            }
        }

        fn service<'a>(&'a self, sync: &'a dyn CloudSync) -> DiagnosisService<'a> {
            DiagnosisService::new(
                &self.ledger,
                &self.models,
                &self.pipeline,
                &self.treatments,
                sync,
            )
        }
    }

    #[tokio::test]
    async fn test_offline_diagnosis_is_kept_locally() {
        let f = Fixture::new(DiseaseLabel::EarlyBlight);
        let sync = RecordingSync::new(false);
        let service = f.service(&sync);

        let diagnosis = service
            .diagnose("leaf.jpg", test_png(32, 32), &FixedConnectivity(false))
            .await
            .unwrap();

        assert_eq!(diagnosis.label, DiseaseLabel::EarlyBlight);
        assert_eq!(diagnosis.ledger_index, 0);
        assert!(!diagnosis.synced());
        assert_eq!(
            diagnosis.treatment().description,
            "Fungal disease causing concentric rings on leaves"
        );
        assert_eq!(sync.pushes.load(Ordering::SeqCst), 0);

        let stored = f.ledger.load().await.predictions;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].prediction, "Tomato___Early_blight");
        assert_eq!(stored[0].image_name, "leaf.jpg");
        assert!(!stored[0].synced);
    }

    #[tokio::test]
    async fn test_online_diagnosis_is_synced() {
        let f = Fixture::new(DiseaseLabel::Healthy);
        let sync = RecordingSync::new(false);
        let service = f.service(&sync);

        let diagnosis = service
            .diagnose("leaf.png", test_png(32, 32), &FixedConnectivity(true))
            .await
            .unwrap();

        assert!(diagnosis.synced());
        assert_eq!(sync.pushes.load(Ordering::SeqCst), 1);
        assert!(f.ledger.load().await.predictions[0].synced);
    }

    #[tokio::test]
    async fn test_failed_sync_keeps_record_unsynced() {
        let f = Fixture::new(DiseaseLabel::LateBlight);
        let sync = RecordingSync::new(true);
        let service = f.service(&sync);

        let diagnosis = service
            .diagnose("leaf.png", test_png(32, 32), &FixedConnectivity(true))
            .await
            .unwrap();

        assert!(!diagnosis.synced());
        assert!(!f.ledger.load().await.predictions[0].synced);
        // No local entry for late blight, so the generic advice applies.
        assert_eq!(diagnosis.treatment(), &TreatmentInfo::fallback());
    }

    #[tokio::test]
    async fn test_missing_model_is_an_error() {
        let f = Fixture::new(DiseaseLabel::Healthy);
        std::fs::remove_file(f.models.canonical_path()).unwrap();
        let sync = RecordingSync::new(false);

        let result = f
            .service(&sync)
            .diagnose("leaf.png", test_png(8, 8), &FixedConnectivity(false))
            .await;

        assert!(matches!(result, Err(DiagnosisError::Model(_))));
        assert!(f.ledger.load().await.predictions.is_empty());
    }

    #[tokio::test]
    async fn test_feedback_and_history() {
        let f = Fixture::new(DiseaseLabel::BacterialSpot);
        let sync = RecordingSync::new(false);
        let service = f.service(&sync);

        service
            .diagnose("first.jpg", test_png(8, 8), &FixedConnectivity(false))
            .await
            .unwrap();
        service
            .diagnose("second.jpg", test_png(8, 8), &FixedConnectivity(false))
            .await
            .unwrap();

        let feedback = service
            .submit_feedback(
                "Tomato___Bacterial_spot",
                FeedbackCategory::Incorrect,
                "looks like mold",
                &FixedConnectivity(true),
            )
            .await
            .unwrap();
        assert!(feedback.synced);
        assert_eq!(feedback.feedback, FeedbackCategory::Incorrect);

        let history = service.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].image_name, "second.jpg");
        assert_eq!(history[1].image_name, "first.jpg");

        let stored = f.ledger.load().await;
        assert_eq!(stored.feedback.len(), 1);
        assert!(stored.feedback[0].synced);
    }

    #[tokio::test]
    async fn test_check_for_updates() {
        let f = Fixture::new(DiseaseLabel::Healthy);
        let sync = RecordingSync::new(false);
        let service = f.service(&sync);

        assert_eq!(
            service
                .check_for_updates(&FixedConnectivity(false))
                .await
                .unwrap(),
            UpdateStatus::Offline
        );
        assert_eq!(
            service
                .check_for_updates(&FixedConnectivity(true))
                .await
                .unwrap(),
            UpdateStatus::UpToDate
        );
    }

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp_now();
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT).is_ok());
    }
}
