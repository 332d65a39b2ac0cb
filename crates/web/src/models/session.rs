//! Session-stored state.
//!
//! Per browser session: who is logged in, whether the user forced offline
//! mode, and the last diagnosis (so feedback can refer to it).

use serde::{Deserialize, Serialize};

/// Most recent diagnosis shown to this session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastPrediction {
    /// Class name of the predicted label.
    pub prediction: String,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the user's offline-mode toggle.
    pub const OFFLINE_MODE: &str = "offline_mode";

    /// Key for the most recent diagnosis.
    pub const LAST_PREDICTION: &str = "last_prediction";
}
