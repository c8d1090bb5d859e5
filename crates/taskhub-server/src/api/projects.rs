//! `/api/projects` handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use taskhub_core::MutationEvent;
use taskhub_core::ids::ProjectId;
use taskhub_core::models::{NewProject, Project, ProjectPatch, ProjectWithTasks};
use taskhub_store::ProjectRepo;

use super::MessageResponse;
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

const NOT_FOUND: &str = "Project not found";

/// GET /api/projects
pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Json<Vec<ProjectWithTasks>>> {
    Ok(Json(state.store.call(ProjectRepo::list_with_tasks).await?))
}

/// GET /api/projects/{id}
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> ApiResult<Json<ProjectWithTasks>> {
    state
        .store
        .call(move |conn| ProjectRepo::get_with_tasks(conn, &id))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    Json(input): Json<NewProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let project = state
        .store
        .call(move |conn| ProjectRepo::insert(conn, &input))
        .await?;
    let _ = state
        .broadcaster
        .broadcast_event(&MutationEvent::project_saved(project.clone()));
    Ok((StatusCode::CREATED, Json(project)))
}

/// PUT /api/projects/{id}
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
    Json(patch): Json<ProjectPatch>,
) -> ApiResult<Json<Project>> {
    let project = state
        .store
        .call(move |conn| ProjectRepo::update(conn, &id, &patch))
        .await?
        .ok_or(ApiError::NotFound(NOT_FOUND))?;
    let _ = state
        .broadcaster
        .broadcast_event(&MutationEvent::project_saved(project.clone()));
    Ok(Json(project))
}

/// DELETE /api/projects/{id}
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
) -> ApiResult<Json<MessageResponse>> {
    let key = id.clone();
    if !state.store.call(move |conn| ProjectRepo::delete(conn, &key)).await? {
        return Err(ApiError::NotFound(NOT_FOUND));
    }
    let _ = state
        .broadcaster
        .broadcast_event(&MutationEvent::project_deleted(id.into_inner()));
    Ok(Json(MessageResponse {
        message: "Project deleted successfully",
    }))
}
