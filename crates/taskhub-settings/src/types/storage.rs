//! Database and authentication settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// `SQLite` database settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Database file. Defaults to `~/.taskhub/taskhub.db`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: 8,
            busy_timeout_ms: 5_000,
        }
    }
}

impl DatabaseSettings {
    /// The configured path, or the default under the TaskHub home directory.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .as_ref()
            .map_or_else(|| crate::loader::taskhub_home().join("taskhub.db"), PathBuf::from)
    }
}

/// Login token settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HS256 signing secret. When empty, a random per-process secret is used.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub token_ttl_secs: u64,
    /// Require a bearer token on the REST API (login and registration excepted).
    pub require_token: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: 24 * 60 * 60,
            require_token: false,
        }
    }
}
