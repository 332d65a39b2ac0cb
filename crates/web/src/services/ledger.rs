//! Local prediction ledger.
//!
//! A single JSON file holding every prediction and feedback entry. Each
//! mutation reads the whole file, changes it, and writes the whole file back.
//! The in-process mutex serializes those cycles; nothing guards against a
//! second process writing the same file.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;

use plant_health_core::{FeedbackRecord, LedgerFile, PredictionRecord};

/// Errors writing the ledger. Reads never fail: a missing or unreadable file
/// is an empty ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to write ledger {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize ledger: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no {kind} entry at index {index}")]
    MissingEntry { kind: &'static str, index: usize },
}

/// File-backed, append-ordered record of predictions and feedback.
pub struct PredictionLedger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PredictionLedger {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the ledger file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the ledger, or an empty one if the file is absent or unreadable.
    pub async fn load(&self) -> LedgerFile {
        read_ledger(&self.path).await
    }

    /// Replace the file contents with `ledger`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Io` if the file cannot be written.
    pub async fn save(&self, ledger: &LedgerFile) -> Result<(), LedgerError> {
        let _guard = self.lock.lock().await;
        write_ledger(&self.path, ledger).await
    }

    /// Append a prediction and return its index.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Io` if the file cannot be written.
    pub async fn append_prediction(&self, record: PredictionRecord) -> Result<usize, LedgerError> {
        self.modify(|ledger| {
            ledger.predictions.push(record);
            Ok(ledger.predictions.len() - 1)
        })
        .await
    }

    /// Append a feedback entry and return its index.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Io` if the file cannot be written.
    pub async fn append_feedback(&self, record: FeedbackRecord) -> Result<usize, LedgerError> {
        self.modify(|ledger| {
            ledger.feedback.push(record);
            Ok(ledger.feedback.len() - 1)
        })
        .await
    }

    /// Set the `synced` flag of the prediction at `index`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::MissingEntry` if there is no such prediction.
    pub async fn mark_prediction_synced(&self, index: usize, synced: bool) -> Result<(), LedgerError> {
        self.modify(|ledger| {
            let entry = ledger
                .predictions
                .get_mut(index)
                .ok_or(LedgerError::MissingEntry {
                    kind: "prediction",
                    index,
                })?;
            entry.synced = synced;
            Ok(())
        })
        .await
    }

    /// Set the `synced` flag of the feedback entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::MissingEntry` if there is no such entry.
    pub async fn mark_feedback_synced(&self, index: usize, synced: bool) -> Result<(), LedgerError> {
        self.modify(|ledger| {
            let entry = ledger
                .feedback
                .get_mut(index)
                .ok_or(LedgerError::MissingEntry {
                    kind: "feedback",
                    index,
                })?;
            entry.synced = synced;
            Ok(())
        })
        .await
    }

    /// Append records pulled from the cloud, marked as synced.
    ///
    /// Returns how many records were added.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Io` if the file cannot be written.
    pub async fn merge(&self, updates: LedgerFile) -> Result<usize, LedgerError> {
        let added = updates.predictions.len() + updates.feedback.len();
        if added == 0 {
            return Ok(0);
        }

        self.modify(|ledger| {
            ledger
                .predictions
                .extend(updates.predictions.into_iter().map(|mut p| {
                    p.synced = true;
                    p
                }));
            ledger
                .feedback
                .extend(updates.feedback.into_iter().map(|mut f| {
                    f.synced = true;
                    f
                }));
            Ok(added)
        })
        .await
    }

    /// Load, apply `change`, save. The file is only rewritten if `change` succeeds.
    async fn modify<T>(
        &self,
        change: impl FnOnce(&mut LedgerFile) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let _guard = self.lock.lock().await;
        let mut ledger = read_ledger(&self.path).await;
        let result = change(&mut ledger)?;
        write_ledger(&self.path, &ledger).await?;
        Ok(result)
    }
}

async fn read_ledger(path: &Path) -> LedgerFile {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LedgerFile::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ledger unreadable, starting empty");
            return LedgerFile::default();
        }
    };

    serde_json::from_str(&contents).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Ledger unparseable, starting empty");
        LedgerFile::default()
    })
}

async fn write_ledger(path: &Path, ledger: &LedgerFile) -> Result<(), LedgerError> {
    let io_err = |source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    // Write beside the ledger and rename so readers never see a torn file.
    let staging = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(ledger)?;
    tokio::fs::write(&staging, json).await.map_err(io_err)?;
    tokio::fs::rename(&staging, path).await.map_err(io_err)
}
