//! Change gate configuration types.

use serde::{Deserialize, Serialize};

fn default_message() -> String {
    "changes to agent binaries are currently blocked".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeGateConfig {
    /// Start with uploads blocked (default: false)
    #[serde(default)]
    pub blocked: bool,
    /// Message reported to clients while blocked
    #[serde(default = "default_message")]
    pub message: String,
}

impl Default for ChangeGateConfig {
    fn default() -> Self {
        Self {
            blocked: false,
            message: default_message(),
        }
    }
}
