//! Server network, real-time channel, and logging settings.

use serde::{Deserialize, Serialize};

/// HTTP and WebSocket server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` picks a free port.
    pub port: u16,
    /// Origins allowed for CORS and WebSocket upgrades. Empty or `"*"` allows all.
    pub allowed_origins: Vec<String>,
    /// Seconds between server pings on each connection.
    pub heartbeat_interval_secs: u64,
    /// Seconds without a pong before a connection is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Per-connection outbound queue length.
    pub send_queue_capacity: usize,
    /// Dropped broadcasts tolerated before a slow client is detached.
    pub max_dropped_messages: u64,
    /// Largest inbound WebSocket frame accepted, in bytes.
    pub max_message_bytes: usize,
    /// Whether a relayed client notice is also delivered back to its sender.
    pub echo_notices_to_sender: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            allowed_origins: Vec::new(),
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            send_queue_capacity: 256,
            max_dropped_messages: 100,
            max_message_bytes: 64 * 1024,
            echo_notices_to_sender: true,
        }
    }
}

impl ServerSettings {
    /// Whether every origin is allowed.
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == "*")
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable compact lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging settings. `RUST_LOG` overrides `level` when set.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive, e.g. `info` or `taskhub_server=debug`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}
