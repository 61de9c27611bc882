//! Scheduler control surface for admin tooling.

use axum::extract::{Extension, Path};
use axum::Json;
use serde::Deserialize;

use crate::kernel::scheduler::{TaskLogEntry, TaskStateView};
use crate::server::app::AppState;

use super::{ApiError, ApiResult};

pub async fn list_tasks_handler(
    Extension(state): Extension<AppState>,
) -> ApiResult<Vec<TaskStateView>> {
    Ok(Json(state.scheduler.task_states()))
}

/// Run a task now, regardless of schedule. 404 when the task is unknown or
/// disabled; a trigger while the task is running is accepted and skipped.
pub async fn trigger_task_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    if !state.scheduler.trigger_task(&id) {
        return Err(ApiError::not_found(format!(
            "task {id} is unknown or disabled"
        )));
    }
    Ok(Json(serde_json::json!({ "triggered": true })))
}

#[derive(Deserialize)]
pub struct SetEnabledRequest {
    pub enabled: bool,
}

pub async fn set_task_enabled_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SetEnabledRequest>,
) -> ApiResult<serde_json::Value> {
    if !state.scheduler.set_task_enabled(&id, body.enabled) {
        return Err(ApiError::not_found(format!("task {id} not found")));
    }
    Ok(Json(serde_json::json!({ "id": id, "enabled": body.enabled })))
}

pub async fn task_logs_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<TaskLogEntry>> {
    let logs = state
        .scheduler
        .get_task_logs(&id)
        .ok_or_else(|| ApiError::not_found(format!("task {id} not found")))?;
    Ok(Json(logs))
}
