//! Server runtime configuration.

use std::time::Duration;

use taskhub_settings::TaskhubSettings;

use crate::websocket::broadcast::BroadcastConfig;

/// Configuration for [`crate::TaskhubServer`].
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Origins allowed on the WebSocket upgrade and CORS. Empty allows any.
    pub allowed_origins: Vec<String>,
    /// Ping cadence and liveness check interval.
    pub heartbeat_interval: Duration,
    /// Silence tolerated before a connection is detached.
    pub heartbeat_timeout: Duration,
    /// Per-connection outbound queue depth.
    pub send_queue_capacity: usize,
    /// Dropped frames tolerated before a slow client is detached.
    pub max_dropped_messages: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Relay client notices back to their sender.
    pub echo_notices_to_sender: bool,
    /// Reject REST calls without a valid bearer token.
    pub require_token: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            allowed_origins: Vec::new(),
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(90),
            send_queue_capacity: 256,
            max_dropped_messages: 100,
            max_message_size: 64 * 1024,
            echo_notices_to_sender: true,
            require_token: false,
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &TaskhubSettings) -> Self {
        let server = &settings.server;
        Self {
            host: server.host.clone(),
            port: server.port,
            allowed_origins: server.allowed_origins.clone(),
            heartbeat_interval: Duration::from_secs(server.heartbeat_interval_secs),
            heartbeat_timeout: Duration::from_secs(server.heartbeat_timeout_secs),
            send_queue_capacity: server.send_queue_capacity,
            max_dropped_messages: server.max_dropped_messages,
            max_message_size: server.max_message_bytes,
            echo_notices_to_sender: server.echo_notices_to_sender,
            require_token: settings.auth.require_token,
        }
    }

    /// Whether every origin is accepted.
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == "*")
    }

    /// Whether `origin` may open a WebSocket. A missing origin is accepted.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(_) if self.allows_any_origin() => true,
            Some(o) => {
                let o = o.trim_end_matches('/');
                self.allowed_origins.iter().any(|a| a == o)
            }
        }
    }

    /// Broadcaster tuning derived from this config.
    pub fn broadcast_config(&self) -> BroadcastConfig {
        BroadcastConfig {
            max_dropped_messages: self.max_dropped_messages,
            echo_notices_to_sender: self.echo_notices_to_sender,
        }
    }
}
