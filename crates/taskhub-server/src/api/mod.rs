//! REST handlers.
//!
//! Every write goes through the store first; the mutation event is broadcast
//! only after the write has committed.

pub mod projects;
pub mod tasks;
pub mod users;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, post, put};
use serde::Serialize;

use crate::auth::require_jwt;
use crate::server::AppState;

/// Body of delete responses.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Human-readable outcome.
    pub message: &'static str,
}

/// `/api` routes. Login and registration stay public.
pub fn routes(state: &AppState) -> Router<AppState> {
    let guard = from_fn_with_state(state.clone(), require_jwt);

    let protected = Router::new()
        .route("/api/users/{id}", put(users::update_user).delete(users::delete_user))
        .route("/api/projects", get(projects::list_projects).post(projects::create_project))
        .route(
            "/api/projects/{id}",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/api/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/api/tasks/{id}",
            get(tasks::get_task).put(tasks::update_task).delete(tasks::delete_task),
        )
        .route("/api/tasks/{id}/status", patch(tasks::update_task_status))
        .route_layer(guard.clone());

    Router::new()
        .route(
            "/api/users",
            get(users::list_users).route_layer(guard).post(users::create_user),
        )
        .route("/api/users/login", post(users::login))
        .route("/api/auth/login", post(users::login))
        .merge(protected)
}
