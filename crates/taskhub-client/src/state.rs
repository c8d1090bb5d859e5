//! Subscription lifecycle states.

use std::fmt;
use std::time::Duration;

/// Lifecycle of a [`crate::LiveSubscription`].
///
/// `Idle -> Connecting -> Open`, then either `Closing -> Idle` on request or
/// `Error -> Reconnecting -> Connecting` on failure. Exhausting the retry
/// budget ends in `Failed`, which only an explicit `connect` leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected, nothing scheduled.
    Idle,
    /// A connection attempt is in flight.
    Connecting,
    /// Connected; events flow and `send` works.
    Open,
    /// Caller-requested shutdown in progress.
    Closing,
    /// The link failed or could not be opened.
    Error {
        /// Human-readable cause.
        reason: String,
    },
    /// Waiting before the next attempt.
    Reconnecting {
        /// Consecutive failure count, starting at 1.
        attempt: u32,
        /// Wait before the attempt.
        delay: Duration,
    },
    /// Retry budget exhausted.
    Failed,
}

impl ConnectionState {
    /// Whether `send` is accepted.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Whether a new `connect` call is allowed.
    pub fn can_connect(&self) -> bool {
        matches!(self, Self::Idle | Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting => f.write_str("connecting"),
            Self::Open => f.write_str("open"),
            Self::Closing => f.write_str("closing"),
            Self::Error { reason } => write!(f, "error: {reason}"),
            Self::Reconnecting { attempt, delay } => {
                write!(f, "reconnecting (attempt {attempt}, in {delay:?})")
            }
            Self::Failed => f.write_str("failed"),
        }
    }
}
