use copresence_core::IceServerConfig;
use copresence_core::utils::{DEFAULT_DATA_CHANNEL_LABEL, default_ice_servers};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-session negotiation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Used when `ice_config_url` is not set.
    pub ice_servers: Vec<IceServerConfig>,
    /// Endpoint returning `{"d": {"iceServers": [...]}}` or `{"iceServers": [...]}`.
    pub ice_config_url: Option<String>,
    pub negotiation_timeout_ms: u64,
    pub data_channel_label: String,
    /// Mirror "has no connections" into the local record's `isAvailable`.
    pub auto_availability: bool,
    pub event_capacity: usize,
}

impl SessionConfig {
    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_millis(self.negotiation_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
            ice_config_url: None,
            negotiation_timeout_ms: 30_000,
            data_channel_label: DEFAULT_DATA_CHANNEL_LABEL.to_owned(),
            auto_availability: true,
            event_capacity: 256,
        }
    }
}
