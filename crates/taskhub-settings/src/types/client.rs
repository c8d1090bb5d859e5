//! Subscription client settings.

use serde::{Deserialize, Serialize};

/// Reconnecting client settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// WebSocket endpoint.
    pub url: String,
    /// Reconnection attempts after an unexpected close before giving up.
    pub max_retries: u32,
    /// Base reconnection delay; attempt `n` waits `n * base`.
    pub base_delay_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3000/ws".to_string(),
            max_retries: 5,
            base_delay_ms: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ClientSettings::default();
        assert_eq!(c.max_retries, 5);
        assert_eq!(c.base_delay_ms, 1000);
        assert!(c.url.ends_with("/ws"));
    }
}
