use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct CLIConfig {
    pub base_url: String,
    pub user_id: String,
    pub project_id: Option<String>,
    pub debug: bool,
    pub token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// A local file attached to the next messages' context.
#[derive(Clone, Debug, Serialize)]
pub struct AttachedFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ProcessRequest {
    pub user_id: String,
    pub message: String,
    pub project_id: Option<String>,
    pub context: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessReply {
    pub message: String,
    pub meta: Value,
    pub task: Option<TaskInfo>,
}

#[derive(Debug, Deserialize)]
pub struct TaskInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub status: String,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub description: String,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl TaskInfo {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "completed" | "failed")
    }
}
