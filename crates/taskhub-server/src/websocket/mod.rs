//! Real-time channel: connection registry, fan-out, heartbeat, and sessions.

pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod notice;
pub mod session;

pub use broadcast::{AttachError, BroadcastConfig, Broadcaster, DeliveryReport, NoticeOutcome};
pub use connection::{AttachState, ClientConnection};
pub use notice::{AllowAll, NoticeGate};
