//! CLI subcommands.

pub mod migrate;
pub mod predict;
pub mod user;
