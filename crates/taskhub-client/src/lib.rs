//! # taskhub-client
//!
//! Live-update subscriber for the TaskHub real-time channel.
//!
//! - [`LiveSubscription`]: reconnecting wrapper with bounded linear backoff
//! - [`Connector`]: transport seam, with [`WsConnector`] over `tokio-tungstenite`
//! - [`EventDispatcher`]: routes decoded events to handlers by kind
//! - [`TaskBoard`]: local task view kept current from `task_update` events

#![deny(unsafe_code)]

pub mod board;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod state;
pub mod subscriber;
pub mod transport;

pub use board::TaskBoard;
pub use config::ReconnectConfig;
pub use dispatch::EventDispatcher;
pub use errors::{ClientError, TransportError};
pub use state::ConnectionState;
pub use subscriber::LiveSubscription;
pub use transport::{Connector, Link, LinkEvent, WsConnector};
