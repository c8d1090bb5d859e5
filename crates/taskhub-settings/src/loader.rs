//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TaskhubSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{LogFormat, TaskhubSettings};

/// Root directory for TaskHub state (`~/.taskhub`).
pub fn taskhub_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".taskhub")
}

/// Resolve the settings file path.
///
/// `TASKHUB_SETTINGS` wins; otherwise `~/.taskhub/settings.json`.
pub fn settings_path() -> PathBuf {
    read_env_string("TASKHUB_SETTINGS")
        .map_or_else(|| taskhub_home().join("settings.json"), PathBuf::from)
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TaskhubSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<TaskhubSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults merged with the settings file, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<TaskhubSettings> {
    let defaults = serde_json::to_value(TaskhubSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning and the file/default value stays.
/// Where both a bare name (`PORT`) and a prefixed name (`TASKHUB_PORT`) exist,
/// the prefixed one wins.
pub fn apply_env_overrides(settings: &mut TaskhubSettings) {
    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("TASKHUB_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_u16("TASKHUB_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_string("FRONTEND_URL") {
        settings.server.allowed_origins = parse_origins(&v);
    }
    if let Some(v) = read_env_string("TASKHUB_ALLOWED_ORIGINS") {
        settings.server.allowed_origins = parse_origins(&v);
    }
    if let Some(v) = read_env_u64("TASKHUB_HEARTBEAT_INTERVAL", 1, 3600) {
        settings.server.heartbeat_interval_secs = v;
        settings.server.heartbeat_timeout_secs = settings.server.heartbeat_timeout_secs.max(v);
    }
    if let Some(v) = read_env_bool("TASKHUB_ECHO_NOTICES") {
        settings.server.echo_notices_to_sender = v;
    }

    // ── Database ────────────────────────────────────────────────────
    if let Some(v) = read_env_string("TASKHUB_DB_PATH") {
        settings.database.path = Some(v);
    }

    // ── Auth ────────────────────────────────────────────────────────
    if let Some(v) = read_env_string("JWT_SECRET") {
        settings.auth.jwt_secret = v;
    }
    if let Some(v) = read_env_bool("TASKHUB_REQUIRE_TOKEN") {
        settings.auth.require_token = v;
    }

    // ── Client ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("TASKHUB_WS_URL") {
        settings.client.url = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("TASKHUB_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_string("TASKHUB_LOG_FORMAT") {
        match parse_log_format(&v) {
            Some(format) => settings.logging.format = format,
            None => tracing::warn!(key = "TASKHUB_LOG_FORMAT", value = %v, "invalid log format, ignoring"),
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Split a comma-separated origin list, dropping blanks and trailing slashes.
pub fn parse_origins(val: &str) -> Vec<String> {
    val.split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `text` or `json`.
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.trim().to_lowercase().as_str() {
        "text" | "pretty" | "compact" => Some(LogFormat::Text),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use serde_json::json;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = json!({"server": {"port": 3000, "host": "0.0.0.0"}});
        let source = json!({"server": {"port": 4000}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 4000);
        assert_eq!(merged["server"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_array_replace() {
        let target = json!({"allowedOrigins": ["a", "b"]});
        let source = json!({"allowedOrigins": ["c"]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["allowedOrigins"], json!(["c"]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(json!({"a": 1}), json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_new_keys_added() {
        let merged = deep_merge(json!({"a": 1}), json!({"b": 2}));
        assert_eq!(merged, json!({"a": 1, "b": 2}));
    }

    // ── file layer ──────────────────────────────────────────────────

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_file_layer(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings.server.port, 3000);
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 8088, "echoNoticesToSender": false}, "client": {"maxRetries": 2}}"#,
        )
        .unwrap();
        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.server.port, 8088);
        assert!(!settings.server.echo_notices_to_sender);
        assert_eq!(settings.server.send_queue_capacity, 256);
        assert_eq!(settings.client.max_retries, 2);
        assert_eq!(settings.client.base_delay_ms, 1000);
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_file_layer(&path), Err(SettingsError::Json(_))));
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_u16_range_bounds() {
        assert_eq!(parse_u16_range("3000", 0, 65535), Some(3000));
        assert_eq!(parse_u16_range("70000", 0, 65535), None);
        assert_eq!(parse_u16_range("abc", 0, 65535), None);
    }

    #[test]
    fn parse_u64_range_bounds() {
        assert_eq!(parse_u64_range("30", 1, 3600), Some(30));
        assert_eq!(parse_u64_range("0", 1, 3600), None);
    }

    #[test]
    fn parse_origins_splits_and_trims() {
        assert_eq!(
            parse_origins(" http://localhost:5173/ , https://app.example.com ,,"),
            vec!["http://localhost:5173", "https://app.example.com"]
        );
        assert!(parse_origins(" , ").is_empty());
    }

    #[test]
    fn parse_log_format_values() {
        assert_eq!(parse_log_format("JSON"), Some(LogFormat::Json));
        assert_eq!(parse_log_format("text"), Some(LogFormat::Text));
        assert_eq!(parse_log_format("xml"), None);
    }
}
