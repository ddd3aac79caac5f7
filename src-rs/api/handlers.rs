use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::server::AppState;
use crate::result::AgentReply;
use crate::task::{StatusApply, StatusUpdate, Task, TaskStatus};

type ApiError = (StatusCode, Json<Value>);

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub user_id: String,
    pub message: String,
    pub project_id: Option<String>,
    pub context: Option<Value>,
}

impl ProcessRequest {
    /// The caller's context with `project_id` folded in.
    fn project_context(&self) -> Option<Value> {
        let mut fields = match &self.context {
            Some(Value::Object(map)) => map.clone(),
            Some(_) | None => Map::new(),
        };
        if let Some(project_id) = &self.project_id {
            fields.insert("project_id".to_string(), Value::String(project_id.clone()));
        }
        if fields.is_empty() {
            None
        } else {
            Some(Value::Object(fields))
        }
    }
}

const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Deserialize, Default)]
pub struct TasksQuery {
    pub status: Option<TaskStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

fn detail(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "detail": message.into() })))
}

fn not_found() -> ApiError {
    detail(StatusCode::NOT_FOUND, "Task not found")
}

pub async fn handle_health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn handle_process(
    State(state): State<AppState>,
    Json(req): Json<ProcessRequest>,
) -> Result<Json<AgentReply>, ApiError> {
    if req.message.trim().is_empty() {
        return Err(detail(StatusCode::BAD_REQUEST, "message required"));
    }
    tracing::info!(user_id = %req.user_id, "message received");
    let context = req.project_context();
    match state.agent.process_message(&req.user_id, &req.message, context).await {
        Ok(reply) => Ok(Json(reply)),
        Err(err) => {
            tracing::error!(user_id = %req.user_id, error = %err, "message processing failed");
            Err(detail(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
        }
    }
}

pub async fn handle_get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    state.store.get(&task_id).await.map(Json).ok_or_else(not_found)
}

pub async fn handle_list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TasksQuery>,
) -> Json<Vec<Task>> {
    let page = state
        .store
        .list(query.status)
        .await
        .into_iter()
        .skip(query.offset.unwrap_or(0))
        .take(query.limit.unwrap_or(DEFAULT_PAGE_SIZE))
        .collect();
    Json(page)
}

pub async fn handle_update_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Value>, ApiError> {
    match state.store.apply_status(&task_id, &update).await {
        StatusApply::Updated(_) => Ok(Json(json!({"status": "updated"}))),
        StatusApply::NotFound => Err(not_found()),
        StatusApply::Rejected(current) => Err(detail(
            StatusCode::CONFLICT,
            format!("Task is already {current}"),
        )),
        StatusApply::Failed => Err(detail(StatusCode::INTERNAL_SERVER_ERROR, "Task store unavailable")),
    }
}

pub async fn handle_delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete(&task_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(project_id: Option<&str>, context: Option<Value>) -> ProcessRequest {
        ProcessRequest {
            user_id: "u1".to_string(),
            message: "hi".to_string(),
            project_id: project_id.map(str::to_string),
            context,
        }
    }

    #[test]
    fn project_id_is_folded_into_context() {
        let ctx = request(Some("p1"), Some(json!({"files": []}))).project_context();
        assert_eq!(ctx, Some(json!({"files": [], "project_id": "p1"})));
    }

    #[test]
    fn empty_context_stays_absent() {
        assert_eq!(request(None, None).project_context(), None);
        assert_eq!(
            request(None, Some(json!({"error": "boom"}))).project_context(),
            Some(json!({"error": "boom"}))
        );
    }
}
