//! Channel configuration.

use serde::{Deserialize, Serialize};

/// Connection settings for a channel, supplied by process configuration.
///
/// The transport must authenticate with `auth_token` before any publish,
/// subscribe, or request succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Broker endpoint to connect to.
    pub endpoint: String,
    /// Credential presented at connect time.
    pub auth_token: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://local".to_string(),
            auth_token: String::new(),
        }
    }
}
