//! User administration and role assignment endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::parse_id;
use crate::api::{ApiResponse, AppState, JsonBody};
use crate::db::User;
use crate::error::{Result, TaskgateError};
use crate::middleware::auth::Principal;

/// A user together with their current roles.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct RoleChange {
    pub user_id: Uuid,
    pub role: String,
    pub changed: bool,
}

async fn load_profile(state: &AppState, user_id: Uuid) -> Result<UserProfile> {
    let user = state
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| TaskgateError::not_found("user", user_id.to_string()))?;
    let grants = state.policy.resolve(user_id).await?;
    Ok(UserProfile {
        user,
        roles: grants.roles,
        permissions: grants.permissions,
    })
}

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let users = state.store.list_users().await?;
    Ok(Json(ApiResponse::success(users)))
}

/// The caller's own profile, with roles as currently stored (which may be
/// newer than the token's snapshot).
pub async fn get_profile(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse> {
    let profile = load_profile(&state, principal.user_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

pub async fn get_profile_by_id(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse> {
    let user_id = parse_id(&user_id, "user")?;
    let profile = load_profile(&state, user_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// Soft-delete a user and drop their refresh tokens so they cannot refresh.
pub async fn delete_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse> {
    let user_id = parse_id(&user_id, "user")?;
    if user_id == principal.user_id {
        return Err(TaskgateError::bad_request("cannot delete your own account"));
    }

    if state.store.soft_delete_user(user_id).await? == 0 {
        return Err(TaskgateError::not_found("user", user_id.to_string()));
    }
    let revoked = state.store.delete_refresh_tokens_for_user(user_id).await?;

    info!(user_id = %user_id, revoked_refresh_tokens = revoked, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_user_tasks(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse> {
    let user_id = parse_id(&user_id, "user")?;
    let tasks = state.store.list_tasks_for_user(user_id).await?;
    Ok(Json(ApiResponse::success(tasks)))
}

pub async fn assign_role(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    JsonBody(req): JsonBody<AssignRoleRequest>,
) -> Result<impl IntoResponse> {
    let user_id = parse_id(&user_id, "user")?;
    let changed = state.policy.assign_role(user_id, &req.role).await?;
    Ok(Json(ApiResponse::success(RoleChange {
        user_id,
        role: req.role,
        changed,
    })))
}

pub async fn revoke_role(
    State(state): State<AppState>,
    Path((user_id, role)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let user_id = parse_id(&user_id, "user")?;
    let changed = state.policy.revoke_role(user_id, &role).await?;
    Ok(Json(ApiResponse::success(RoleChange {
        user_id,
        role,
        changed,
    })))
}

pub async fn admin_dashboard(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse> {
    let users = state.store.list_users().await?.len();
    let tasks = state.store.list_tasks().await?.len();
    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": format!("welcome to the admin dashboard, {}", principal.username),
        "users": users,
        "tasks": tasks,
    }))))
}
