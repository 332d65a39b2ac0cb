//! Core types for the Plant Health Assistant.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod label;
pub mod ledger;
pub mod treatment;
pub mod username;

pub use email::{Email, EmailError};
pub use label::{DiseaseLabel, UnknownLabel, humanize};
pub use ledger::{FeedbackCategory, FeedbackRecord, LedgerFile, PredictionRecord};
pub use treatment::{TreatmentInfo, TreatmentPlan};
pub use username::{Username, UsernameError};
