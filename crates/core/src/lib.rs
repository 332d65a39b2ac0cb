//! Plant Health Core - Shared domain types.
//!
//! This crate provides the types shared by every Plant Health component:
//! - `web` - The diagnosis web application
//! - `cli` - Command-line tools for schema setup, users and one-shot predictions
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. The web crate owns every side effect.
//!
//! # Modules
//!
//! - [`types`] - Disease labels, treatment advice, ledger records and
//!   validated account fields

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
