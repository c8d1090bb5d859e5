//! # taskhub-store
//!
//! `SQLite` persistence gateway for users, projects, and tasks.
//!
//! - [`connection`]: r2d2 pool with per-connection pragmas
//! - [`migrations`]: versioned schema embedded at compile time
//! - [`repositories`]: stateless repos, every method takes `&Connection`
//! - [`Store`]: pooled handle that runs repository closures off the async runtime
//!
//! Each single-entity write runs in its own transaction. Deleting a user or
//! project clears references to it (`ON DELETE SET NULL`) instead of
//! cascading.

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod repositories;
mod row_helpers;
mod store;

pub use connection::{ConnectionConfig, ConnectionPool, PooledConnection, new_file, new_in_memory};
pub use errors::{Result, StoreError};
pub use migrations::run_migrations;
pub use repositories::{ProjectRepo, TaskRepo, UserCredentials, UserRepo};
pub use store::Store;
