use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::task::{Task, TaskStatus};

/// What `/process` hands back to the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    pub message: String,
    pub meta: ReplyMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskHandle>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplyMeta {
    #[serde(rename = "type")]
    pub request_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzed_files: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReplyMeta {
    pub fn of(request_type: &str) -> Self {
        Self {
            request_type: request_type.to_string(),
            analyzed_files: None,
            operation_type: None,
            error: None,
        }
    }
}

/// The slice of a freshly submitted task the caller needs to poll it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub description: String,
}

impl From<&Task> for TaskHandle {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            task_type: task.task_type.clone(),
            status: task.status,
            progress: task.progress,
            description: task.description.clone(),
        }
    }
}
