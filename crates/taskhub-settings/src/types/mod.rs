//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may specify any subset of fields and the rest keep their defaults.

mod client;
mod server;
mod storage;

pub use client::*;
pub use server::*;
pub use storage::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 4000, "allowedOrigins": ["http://localhost:5173"] },
///   "auth": { "requireToken": true }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskhubSettings {
    /// HTTP and WebSocket server.
    pub server: ServerSettings,
    /// `SQLite` persistence.
    pub database: DatabaseSettings,
    /// Password hashing and bearer tokens.
    pub auth: AuthSettings,
    /// Reconnecting subscription client.
    pub client: ClientSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl TaskhubSettings {
    /// Reject combinations that would make the server misbehave.
    pub fn validate(&self) -> Result<()> {
        let server = &self.server;
        if server.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalSecs must be at least 1".into(),
            ));
        }
        if server.heartbeat_timeout_secs < server.heartbeat_interval_secs {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatTimeoutSecs must not be below the interval".into(),
            ));
        }
        if server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be at least 1".into(),
            ));
        }
        if self.database.pool_size == 0 {
            return Err(SettingsError::InvalidValue(
                "database.poolSize must be at least 1".into(),
            ));
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "auth.tokenTtlSecs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        TaskhubSettings::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: TaskhubSettings =
            serde_json::from_value(serde_json::json!({"server": {"port": 4000}})).unwrap();
        assert_eq!(settings.server.port, 4000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.client.max_retries, 5);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(TaskhubSettings::default()).unwrap();
        assert!(json["server"].get("allowedOrigins").is_some());
        assert!(json["auth"].get("tokenTtlSecs").is_some());
    }

    #[test]
    fn timeout_below_interval_rejected() {
        let mut settings = TaskhubSettings::default();
        settings.server.heartbeat_interval_secs = 30;
        settings.server.heartbeat_timeout_secs = 10;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_queue_rejected() {
        let mut settings = TaskhubSettings::default();
        settings.server.send_queue_capacity = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidValue(_))
        ));
    }
}
