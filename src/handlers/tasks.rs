use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody, Result};
use crate::extract::{AppJson, AppQuery};
use crate::models::{NewTask, TaskChanges, TaskFilter, TaskResponse};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub message: String,
}

/// A path segment that is not a task id names no task.
fn parse_task_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

#[utoipa::path(
    get,
    path = "/api/tasks",
    tag = "Tasks",
    params(("complete" = Option<bool>, Query, description = "Only tasks with this completion state")),
    responses(
        (status = 200, description = "Tasks, newest first", body = [TaskResponse]),
        (status = 400, description = "Malformed query string", body = ErrorBody)
    )
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<TaskFilter>,
) -> Result<Json<Vec<TaskResponse>>> {
    let tasks = state.tasks.list(filter).await?;
    Ok(Json(tasks))
}

#[utoipa::path(
    get,
    path = "/api/tasks/{task_id}",
    tag = "Tasks",
    params(("task_id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "The task", body = TaskResponse),
        (status = 404, description = "No such task", body = ErrorBody)
    )
)]
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskResponse>> {
    let task_id = parse_task_id(&task_id).ok_or(AppError::NotFound)?;
    let task = state.tasks.get(task_id).await?;
    Ok(Json(task))
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    tag = "Tasks",
    request_body = NewTask,
    responses(
        (status = 201, description = "Task created", body = TaskResponse),
        (status = 422, description = "Invalid task", body = ErrorBody)
    )
)]
pub async fn create_task(
    State(state): State<AppState>,
    AppJson(input): AppJson<NewTask>,
) -> Result<(StatusCode, Json<TaskResponse>)> {
    input.validate()?;

    let task = state.tasks.create(input).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    put,
    path = "/api/tasks/{task_id}",
    tag = "Tasks",
    params(("task_id" = String, Path, description = "Task id")),
    request_body = TaskChanges,
    responses(
        (status = 200, description = "Task updated", body = TaskResponse),
        (status = 404, description = "No such task", body = ErrorBody),
        (status = 422, description = "Invalid changes", body = ErrorBody)
    )
)]
pub async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    AppJson(input): AppJson<TaskChanges>,
) -> Result<Json<TaskResponse>> {
    let task_id = parse_task_id(&task_id).ok_or(AppError::NotFound)?;
    input.validate()?;

    let task = state.tasks.update(task_id, input).await?;
    Ok(Json(task))
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{task_id}",
    tag = "Tasks",
    params(("task_id" = String, Path, description = "Task id")),
    responses((status = 200, description = "Task is gone, whether or not it existed", body = DeleteResponse))
)]
pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    if let Some(task_id) = parse_task_id(&task_id) {
        state.tasks.delete(task_id).await?;
    }
    Ok(Json(DeleteResponse {
        message: "Task deleted successfully".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/tasks/{task_id}/toggle",
    tag = "Tasks",
    params(("task_id" = String, Path, description = "Task id")),
    responses(
        (status = 200, description = "Completion flipped", body = TaskResponse),
        (status = 404, description = "No such task", body = ErrorBody)
    )
)]
pub async fn toggle_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskResponse>> {
    let task_id = parse_task_id(&task_id).ok_or(AppError::NotFound)?;
    let task = state.tasks.toggle(task_id).await?;
    Ok(Json(task))
}
