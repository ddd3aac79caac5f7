use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::TaskError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task record as stored in the key-value store and served over HTTP.
///
/// `task_type` and `params` stay loosely typed here so that records written
/// by other producers (or with types this build does not know) still load;
/// [`Task::kind`] turns them into a [`TaskKind`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(kind: &TaskKind, description: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_type: kind.type_name().to_string(),
            status: TaskStatus::Pending,
            progress: 0,
            params: kind.params(),
            result: None,
            error: None,
            description: description.to_string(),
            created_at: Some(Utc::now()),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn kind(&self) -> Result<TaskKind, TaskError> {
        TaskKind::decode(&self.task_type, self.params.clone())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptParams {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub context: Value,
}

/// What the LLM proposed for a git request; `operation_type` and
/// `parameters` are decoded into a `GitOperation` by the handler.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationPlan {
    #[serde(default)]
    pub operation_type: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub steps: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GitParams {
    pub operation_plan: OperationPlan,
    #[serde(default)]
    pub context: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TaskKind {
    CodeGeneration(PromptParams),
    GitOperation(GitParams),
    CodeAnalysis(PromptParams),
}

impl TaskKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::CodeGeneration(_) => "code_generation",
            Self::GitOperation(_) => "git_operation",
            Self::CodeAnalysis(_) => "code_analysis",
        }
    }

    pub fn params(&self) -> Value {
        let encoded = match self {
            Self::CodeGeneration(params) | Self::CodeAnalysis(params) => serde_json::to_value(params),
            Self::GitOperation(params) => serde_json::to_value(params),
        };
        encoded.unwrap_or(Value::Null)
    }

    pub fn decode(task_type: &str, params: Value) -> Result<Self, TaskError> {
        let invalid = |err: serde_json::Error| TaskError::InvalidParams(err.to_string());
        match task_type {
            "code_generation" => serde_json::from_value(params).map(Self::CodeGeneration).map_err(invalid),
            "git_operation" => serde_json::from_value(params).map(Self::GitOperation).map_err(invalid),
            "code_analysis" => serde_json::from_value(params).map(Self::CodeAnalysis).map_err(invalid),
            other => Err(TaskError::UnknownType(other.to_string())),
        }
    }
}

/// One status transition, as pushed to `/tasks/{id}/status`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusUpdate {
    pub fn pending() -> Self {
        Self::progress(TaskStatus::Pending, 0)
    }

    pub fn in_progress(progress: u8) -> Self {
        Self::progress(TaskStatus::InProgress, progress)
    }

    pub fn completed(result: Value) -> Self {
        Self {
            status: TaskStatus::Completed,
            progress: 100,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            progress: 0,
            result: None,
            error: Some(error.into()),
        }
    }

    fn progress(status: TaskStatus, progress: u8) -> Self {
        Self {
            status,
            progress: progress.min(100),
            result: None,
            error: None,
        }
    }

    /// The update as a partial record, ready for a shallow merge. Progress
    /// is capped at 100 whatever the sender put in.
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("status".to_string(), Value::from(self.status.as_str()));
        fields.insert("progress".to_string(), Value::from(self.progress.min(100)));
        if let Some(result) = &self.result {
            fields.insert("result".to_string(), result.clone());
        }
        if let Some(error) = &self.error {
            fields.insert("error".to_string(), Value::from(error.as_str()));
        }
        fields
    }
}
