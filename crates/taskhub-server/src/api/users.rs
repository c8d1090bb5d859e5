//! `/api/users` handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use taskhub_core::ids::UserId;
use taskhub_core::models::{NewUser, User, UserPatch};
use taskhub_store::UserRepo;
use tracing::info;

use super::MessageResponse;
use crate::auth::{AuthError, hash_password, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

const NOT_FOUND: &str = "User not found";

/// Login body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Account email.
    pub email: String,
    /// Plain-text password.
    pub password: String,
}

/// Login result.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// The authenticated user.
    pub user: User,
    /// Bearer token.
    pub token: String,
}

async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
        .map_err(ApiError::from)
}

/// GET /api/users
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    let users = state.store.call(UserRepo::list).await?;
    Ok(Json(users))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    input
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let password = input.password.clone();
    let hash = blocking(move || hash_password(&password)).await?;
    let user = state
        .store
        .call(move |conn| UserRepo::insert(conn, &input, &hash))
        .await?;
    info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/users/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let email = req.email.trim().to_owned();
    let creds = state
        .store
        .call(move |conn| UserRepo::get_credentials(conn, &email))
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let stored = creds.password_hash;
    let password = req.password;
    blocking(move || verify_password(&password, &stored)).await?;

    if !creds.user.is_active {
        return Err(ApiError::Forbidden("Account is disabled".into()));
    }
    let token = state.auth.issue_token(&creds.user)?;
    info!(user_id = %creds.user.id, "user logged in");
    Ok(Json(LoginResponse {
        user: creds.user,
        token,
    }))
}

/// PUT /api/users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(patch): Json<UserPatch>,
) -> ApiResult<Json<User>> {
    patch
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let hash = match patch.password.clone() {
        Some(password) => Some(blocking(move || hash_password(&password)).await?),
        None => None,
    };
    state
        .store
        .call(move |conn| UserRepo::update(conn, &id, &patch, hash.as_deref()))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(NOT_FOUND))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> ApiResult<Json<MessageResponse>> {
    if state.store.call(move |conn| UserRepo::delete(conn, &id)).await? {
        Ok(Json(MessageResponse {
            message: "User deleted successfully",
        }))
    } else {
        Err(ApiError::NotFound(NOT_FOUND))
    }
}
