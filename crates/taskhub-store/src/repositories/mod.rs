//! Stateless repositories over the schema tables.

mod project;
mod task;
mod user;

pub use project::ProjectRepo;
pub use task::TaskRepo;
pub use user::{UserCredentials, UserRepo};
