//! Task endpoints.
//!
//! The routes carry permission gates; ownership of an individual task is only
//! known once it is loaded, so these handlers enforce it themselves.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::parse_id;
use crate::api::{ApiResponse, AppState, JsonBody};
use crate::db::{NewTask, TaskChanges, TaskPriority, TaskStatus};
use crate::error::{Result, TaskgateError};
use crate::middleware::auth::Principal;
use crate::rbac::{authorize_resource, owner_for_create};

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    /// Honoured for admins only.
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub user_id: Option<Uuid>,
}

pub async fn create_task(
    State(state): State<AppState>,
    principal: Principal,
    JsonBody(req): JsonBody<CreateTaskRequest>,
) -> Result<impl IntoResponse> {
    if req.title.trim().is_empty() {
        return Err(TaskgateError::validation("task title cannot be empty"));
    }

    let owner = owner_for_create(&principal, req.user_id);
    if owner != principal.user_id {
        ensure_user_exists(&state, owner).await?;
    }

    let task = state
        .store
        .insert_task(NewTask {
            title: req.title,
            description: req.description,
            status: req.status,
            priority: req.priority,
            due_date: req.due_date,
            user_id: owner,
        })
        .await?;

    info!(task_id = %task.id, owner = %task.user_id, "Task created");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(task))))
}

pub async fn list_tasks(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let tasks = state.store.list_tasks().await?;
    Ok(Json(ApiResponse::success(tasks)))
}

pub async fn get_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = parse_id(&id, "task")?;
    let task = authorize_resource(&principal, state.store.find_task(id).await?, "task", id)?;
    Ok(Json(ApiResponse::success(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateTaskRequest>,
) -> Result<impl IntoResponse> {
    let id = parse_id(&id, "task")?;
    let existing = authorize_resource(&principal, state.store.find_task(id).await?, "task", id)?;

    if let Some(new_owner) = req.user_id {
        if new_owner != existing.user_id {
            if !principal.is_admin() {
                return Err(TaskgateError::forbidden("only administrators may reassign tasks"));
            }
            ensure_user_exists(&state, new_owner).await?;
        }
    }
    if matches!(&req.title, Some(title) if title.trim().is_empty()) {
        return Err(TaskgateError::validation("task title cannot be empty"));
    }

    let changes = TaskChanges {
        title: req.title,
        description: req.description,
        status: req.status,
        priority: req.priority,
        due_date: req.due_date,
        user_id: req.user_id,
    };
    let task = state
        .store
        .update_task(id, changes)
        .await?
        .ok_or_else(|| TaskgateError::not_found("task", id.to_string()))?;

    Ok(Json(ApiResponse::success(task)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = parse_id(&id, "task")?;
    authorize_resource(&principal, state.store.find_task(id).await?, "task", id)?;

    if state.store.delete_task(id).await? == 0 {
        return Err(TaskgateError::not_found("task", id.to_string()));
    }
    info!(task_id = %id, "Task deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// A task owner must be a live account.
async fn ensure_user_exists(state: &AppState, user_id: Uuid) -> Result<()> {
    match state.store.find_user_by_id(user_id).await? {
        Some(_) => Ok(()),
        None => Err(TaskgateError::not_found("user", user_id.to_string())),
    }
}
