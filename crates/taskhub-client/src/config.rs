//! Reconnection parameters.

use std::time::Duration;

use taskhub_settings::ClientSettings;

/// Default reconnection attempts before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Default delay unit in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Configuration for [`crate::LiveSubscription`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Consecutive failures tolerated before entering `Failed`.
    pub max_retries: u32,
    /// Delay unit. The nth consecutive failure waits `base_delay * n`.
    pub base_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl ReconnectConfig {
    /// Build from the `client` settings section.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
        }
    }

    /// Delay before reconnection attempt `attempt` (1-based): linear in the
    /// attempt number.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}
