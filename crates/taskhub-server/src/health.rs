//! `/health` endpoint.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"OK"` while the server runs.
    pub status: &'static str,
    /// Time of the check.
    pub timestamp: DateTime<Utc>,
    /// Seconds since startup.
    pub uptime_secs: u64,
    /// Attached WebSocket connections.
    pub connections: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize) -> HealthResponse {
    HealthResponse {
        status: "OK",
        timestamp: Utc::now(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_ok_and_counts() {
        let resp = health_check(Instant::now(), 3);
        assert_eq!(resp.status, "OK");
        assert_eq!(resp.connections, 3);
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(health_check(Instant::now(), 0)).unwrap();
        assert_eq!(json["status"], "OK");
        assert!(json["uptimeSecs"].is_number());
        assert!(json["timestamp"].is_string());
    }
}
