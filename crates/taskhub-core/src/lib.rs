//! # taskhub-core
//!
//! Domain types shared by every TaskHub crate.
//!
//! - [`ids`]: branded, prefixed UUID v7 identifiers
//! - [`models`]: users, projects, tasks and their create/patch inputs
//! - [`events`]: the `{ kind, data }` envelope and typed mutation events
//!   carried over the real-time channel

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod ids;
pub mod models;

pub use errors::{ParseEnumError, ValidationError};
pub use events::{EntityChange, Envelope, MutationEvent, Notification, Tombstone};
pub use ids::{ConnectionId, ProjectId, TaskId, UserId};
