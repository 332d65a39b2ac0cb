//! Records kept in the local prediction ledger.
//!
//! The ledger is a single JSON document:
//!
//! ```json
//! {
//!   "predictions": [{"timestamp": "...", "image_name": "...", "prediction": "...",
//!                    "synced": false, "treatment_info": {...}}],
//!   "feedback": [{"timestamp": "...", "prediction": "...", "feedback": "Correct",
//!                 "notes": "", "synced": false}]
//! }
//! ```
//!
//! `feedback` is optional on disk; files written before any feedback exists
//! only carry `predictions`.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::label::DiseaseLabel;
use super::treatment::TreatmentInfo;

/// One diagnosis, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Local wall-clock time, `%Y-%m-%d %H:%M:%S`.
    pub timestamp: String,
    /// File name of the uploaded photo.
    pub image_name: String,
    /// Class name of the predicted label.
    pub prediction: String,
    /// Whether the cloud sync accepted this record.
    #[serde(default)]
    pub synced: bool,
    pub treatment_info: TreatmentInfo,
}

impl PredictionRecord {
    /// Create an unsynced record for a fresh diagnosis.
    #[must_use]
    pub fn new(
        timestamp: impl Into<String>,
        image_name: impl Into<String>,
        label: DiseaseLabel,
        treatment_info: TreatmentInfo,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            image_name: image_name.into(),
            prediction: label.as_str().to_owned(),
            synced: false,
            treatment_info,
        }
    }
}

/// How accurate the grower judged a diagnosis to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedbackCategory {
    Correct,
    #[serde(rename = "Partially correct")]
    PartiallyCorrect,
    Incorrect,
}

impl FeedbackCategory {
    /// Every category, in the order the feedback form offers them.
    pub const ALL: [Self; 3] = [Self::Correct, Self::PartiallyCorrect, Self::Incorrect];

    /// Label shown to the user and written to the ledger.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Correct => "Correct",
            Self::PartiallyCorrect => "Partially correct",
            Self::Incorrect => "Incorrect",
        }
    }
}

impl fmt::Display for FeedbackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FeedbackCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| format!("unknown feedback category: {s}"))
    }
}

/// Grower feedback on a diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub timestamp: String,
    /// Class name of the prediction being rated.
    pub prediction: String,
    pub feedback: FeedbackCategory,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub synced: bool,
}

/// The whole persisted ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFile {
    #[serde(default)]
    pub predictions: Vec<PredictionRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feedback: Vec<FeedbackRecord>,
}
