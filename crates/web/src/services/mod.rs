//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Username/password accounts
//! - `connectivity` - Online/offline probe
//! - `ledger` - Local JSON record of predictions and feedback
//! - `model_cache` - Local copy of the trained model
//! - `inference` - Image preprocessing and classification
//! - `treatment` - Treatment advice, remote or built-in
//! - `sync` - Cloud sync seam
//! - `diagnosis` - Orchestrates a full diagnosis

pub mod auth;
pub mod connectivity;
pub mod diagnosis;
pub mod inference;
pub mod ledger;
pub mod model_cache;
pub mod sync;
pub mod treatment;

pub use auth::{AuthError, AuthService};
pub use connectivity::{Connectivity, FixedConnectivity, HttpProbe, SessionConnectivity};
pub use diagnosis::{Diagnosis, DiagnosisError, DiagnosisService, UpdateStatus};
pub use inference::{InferenceError, InferencePipeline, ModelLoader, OnnxModelLoader};
pub use ledger::{LedgerError, PredictionLedger};
pub use model_cache::{ModelCache, ModelError};
pub use sync::{CloudSync, SimulatedCloudSync, SyncError};
pub use treatment::TreatmentLookup;
