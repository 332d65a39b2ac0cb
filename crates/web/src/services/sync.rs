//! Cloud sync.
//!
//! There is no cloud backend yet. [`CloudSync`] is the seam a real one plugs
//! into; [`SimulatedCloudSync`] waits a moment and reports success.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use plant_health_core::{FeedbackRecord, LedgerFile, PredictionRecord};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("cloud sync failed: {0}")]
    Remote(String),
}

/// Pushes local records to a remote store and pulls remote changes.
#[async_trait]
pub trait CloudSync: Send + Sync {
    /// Upload one prediction.
    async fn push_prediction(&self, record: &PredictionRecord) -> Result<(), SyncError>;

    /// Upload one feedback entry.
    async fn push_feedback(&self, record: &FeedbackRecord) -> Result<(), SyncError>;

    /// Records created elsewhere since the last pull.
    async fn pull_updates(&self) -> Result<LedgerFile, SyncError>;
}

/// Stand-in backend: sleeps for `delay`, then succeeds.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedCloudSync {
    delay: Duration,
}

impl SimulatedCloudSync {
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedCloudSync {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl CloudSync for SimulatedCloudSync {
    async fn push_prediction(&self, record: &PredictionRecord) -> Result<(), SyncError> {
        tokio::time::sleep(self.delay).await;
        tracing::debug!(image = %record.image_name, "Simulated prediction upload");
        Ok(())
    }

    async fn push_feedback(&self, record: &FeedbackRecord) -> Result<(), SyncError> {
        tokio::time::sleep(self.delay).await;
        tracing::debug!(feedback = %record.feedback, "Simulated feedback upload");
        Ok(())
    }

    async fn pull_updates(&self) -> Result<LedgerFile, SyncError> {
        Ok(LedgerFile::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use plant_health_core::{DiseaseLabel, TreatmentInfo};

    use super::*;

    #[tokio::test]
    async fn test_simulated_push_waits_then_succeeds() {
        let sync = SimulatedCloudSync::new(Duration::from_millis(50));
        let record = PredictionRecord::new(
            "2024-05-01 10:00:00",
            "leaf.jpg",
            DiseaseLabel::MosaicVirus,
            TreatmentInfo::fallback(),
        );

        let started = tokio::time::Instant::now();
        sync.push_prediction(&record).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_pull_updates_is_empty() {
        let updates = SimulatedCloudSync::new(Duration::ZERO)
            .pull_updates()
            .await
            .unwrap();
        assert_eq!(updates, LedgerFile::default());
    }
}
