//! `/api/tasks` handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use taskhub_core::MutationEvent;
use taskhub_core::ids::TaskId;
use taskhub_core::models::{NewTask, Task, TaskDetail, TaskFilter, TaskPatch, TaskStatus};
use taskhub_store::TaskRepo;

use super::MessageResponse;
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

const NOT_FOUND: &str = "Task not found";

/// Body of `PATCH /api/tasks/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    /// New status.
    pub status: TaskStatus,
}

fn announce(state: &AppState, task: &Task) {
    let _ = state
        .broadcaster
        .broadcast_event(&MutationEvent::task_saved(task.clone()));
}

/// GET /api/tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Json<Vec<TaskDetail>>> {
    let tasks = state
        .store
        .call(move |conn| TaskRepo::list_details(conn, &filter))
        .await?;
    Ok(Json(tasks))
}

/// GET /api/tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> ApiResult<Json<TaskDetail>> {
    state
        .store
        .call(move |conn| TaskRepo::get_detail(conn, &id))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

/// POST /api/tasks
pub async fn create_task(
    State(state): State<AppState>,
    Json(input): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = state
        .store
        .call(move |conn| TaskRepo::insert(conn, &input))
        .await?;
    announce(&state, &task);
    Ok((StatusCode::CREATED, Json(task)))
}

/// PUT /api/tasks/{id}
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Json(patch): Json<TaskPatch>,
) -> ApiResult<Json<Task>> {
    let task = state
        .store
        .call(move |conn| TaskRepo::update(conn, &id, &patch))
        .await?
        .ok_or(ApiError::NotFound(NOT_FOUND))?;
    announce(&state, &task);
    Ok(Json(task))
}

/// PATCH /api/tasks/{id}/status
pub async fn update_task_status(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Json(body): Json<StatusUpdate>,
) -> ApiResult<Json<Task>> {
    let patch = TaskPatch::status(body.status);
    let task = state
        .store
        .call(move |conn| TaskRepo::update(conn, &id, &patch))
        .await?
        .ok_or(ApiError::NotFound(NOT_FOUND))?;
    announce(&state, &task);
    Ok(Json(task))
}

/// DELETE /api/tasks/{id}
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> ApiResult<Json<MessageResponse>> {
    let key = id.clone();
    if !state.store.call(move |conn| TaskRepo::delete(conn, &key)).await? {
        return Err(ApiError::NotFound(NOT_FOUND));
    }
    let _ = state
        .broadcaster
        .broadcast_event(&MutationEvent::task_deleted(id.into_inner()));
    Ok(Json(MessageResponse {
        message: "Task deleted successfully",
    }))
}
