//! Domain models for the web application.

pub mod session;
pub mod user;

pub use session::{LastPrediction, keys as session_keys};
pub use user::CurrentUser;
