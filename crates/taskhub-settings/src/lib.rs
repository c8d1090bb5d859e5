//! # taskhub-settings
//!
//! Configuration for the TaskHub server, client, and CLI.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`TaskhubSettings::default()`]
//! 2. **Settings file**: `~/.taskhub/settings.json`, deep-merged over defaults
//! 3. **Environment variables**: `PORT`, `JWT_SECRET`, `TASKHUB_*` (highest priority)
//!
//! ```no_run
//! let settings = taskhub_settings::load_settings().unwrap_or_default();
//! println!("listening on {}:{}", settings.server.host, settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
