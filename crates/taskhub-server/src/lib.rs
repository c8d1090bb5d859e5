//! # taskhub-server
//!
//! Axum HTTP + WebSocket server for TaskHub.
//!
//! - REST CRUD for users, projects and tasks over `taskhub-store`
//! - Password hashing and bearer tokens
//! - Mutation broadcasting: every committed task or project write is fanned
//!   out to all attached WebSocket connections
//! - Connection registry with heartbeat liveness and slow-client eviction
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod seed;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use auth::{AuthError, AuthManager, Claims};
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use seed::{SeedError, SeedReport, seed_demo_data};
pub use server::{AppState, TaskhubServer};
pub use shutdown::ShutdownCoordinator;
pub use websocket::{Broadcaster, DeliveryReport, NoticeGate, NoticeOutcome};
