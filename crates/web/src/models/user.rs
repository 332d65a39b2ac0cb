//! User domain types.

use serde::{Deserialize, Serialize};

use plant_health_core::Username;

/// Session-stored identity of the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    pub username: Username,
}
