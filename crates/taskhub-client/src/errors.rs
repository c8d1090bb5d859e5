//! Client error types.

use thiserror::Error;

use crate::state::ConnectionState;

/// Failure to establish or use a transport link.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be opened.
    #[error("connect failed: {0}")]
    Connect(String),
    /// The link closed underneath us.
    #[error("link closed")]
    Closed,
}

/// Misuse of the subscription API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// `connect` was called while a session is already running.
    #[error("subscription already active ({0})")]
    AlreadyActive(ConnectionState),
}
