use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};

use super::backend::KvBackend;
use super::types::{StatusUpdate, Task, TaskStatus};
use crate::error::StoreError;

pub const DEFAULT_NAMESPACE: &str = "agent:tasks:data";

/// Outcome of applying a status update to a stored record.
#[derive(Debug, PartialEq)]
pub enum StatusApply {
    Updated(Task),
    NotFound,
    /// The transition is not allowed from the stored state (a finished
    /// record changing state, or a step back to `pending`); nothing written.
    Rejected(TaskStatus),
    /// The backend could not be read or written.
    Failed,
}

/// JSON task records under `<namespace>:<id>`.
///
/// Every operation swallows backend faults: reads come back as absent,
/// writes as `false`, and the fault is logged. Read-modify-write updates
/// are not atomic; there is a single consumer writing any given id.
#[derive(Clone)]
pub struct TaskStore {
    backend: Arc<dyn KvBackend>,
    namespace: String,
    reserved: Vec<String>,
}

impl TaskStore {
    pub fn new(backend: Arc<dyn KvBackend>, namespace: &str) -> Self {
        Self {
            backend,
            namespace: namespace.trim_end_matches(':').to_string(),
            reserved: Vec::new(),
        }
    }

    /// Marks a key under the namespace that is not a task record (the queue
    /// list, when it shares the prefix) so `list` never reads it.
    pub fn reserving(mut self, key: &str) -> Self {
        if !self.reserved.iter().any(|existing| existing == key) {
            self.reserved.push(key.to_string());
        }
        self
    }

    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    fn key(&self, id: &str) -> String {
        format!("{}:{}", self.namespace, id)
    }

    /// Wholesale upsert.
    pub async fn put(&self, task: &Task) -> bool {
        let result = async {
            let encoded = serde_json::to_string(task)?;
            self.backend.set(&self.key(&task.id), &encoded).await
        }
        .await;
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(task_id = %task.id, error = %err, "failed to store task");
                false
            }
        }
    }

    pub async fn get(&self, id: &str) -> Option<Task> {
        match self.load(id).await {
            Ok(Some(fields)) => match serde_json::from_value(Value::Object(fields)) {
                Ok(task) => Some(task),
                Err(err) => {
                    tracing::error!(task_id = %id, error = %err, "stored task is malformed");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::error!(task_id = %id, error = %err, "failed to load task");
                None
            }
        }
    }

    /// Shallow-merges `fields` over the stored record. `false` when the
    /// record is absent or the write failed.
    pub async fn merge_update(&self, id: &str, fields: Map<String, Value>) -> bool {
        let result = async {
            let Some(mut current) = self.load(id).await? else {
                return Ok(false);
            };
            current.extend(fields);
            self.save(id, current).await?;
            Ok::<_, StoreError>(true)
        }
        .await;
        match result {
            Ok(true) => {
                tracing::debug!(task_id = %id, "task updated");
                true
            }
            Ok(false) => {
                tracing::warn!(task_id = %id, "no stored task to update");
                false
            }
            Err(err) => {
                tracing::error!(task_id = %id, error = %err, "failed to update task");
                false
            }
        }
    }

    /// Merges a status transition and stamps `started_at` / `completed_at`.
    /// A terminal record never moves to a different state, and a record
    /// that has left `pending` never goes back to it.
    pub async fn apply_status(&self, id: &str, update: &StatusUpdate) -> StatusApply {
        let result = async {
            let Some(mut current) = self.load(id).await? else {
                return Ok(StatusApply::NotFound);
            };
            let previous = current
                .get("status")
                .cloned()
                .and_then(|status| serde_json::from_value::<TaskStatus>(status).ok());
            if let Some(previous) = previous {
                let finished = previous.is_terminal() && previous != update.status;
                let rewound = update.status == TaskStatus::Pending && previous != TaskStatus::Pending;
                if finished || rewound {
                    return Ok(StatusApply::Rejected(previous));
                }
            }

            current.extend(update.to_fields());
            let now = Value::from(Utc::now().to_rfc3339());
            if update.status == TaskStatus::InProgress
                && current.get("started_at").map_or(true, Value::is_null)
            {
                current.insert("started_at".to_string(), now.clone());
            }
            if update.status.is_terminal() {
                current.insert("completed_at".to_string(), now);
            }

            let task: Task = serde_json::from_value(Value::Object(current.clone()))?;
            self.save(id, current).await?;
            Ok::<_, StoreError>(StatusApply::Updated(task))
        }
        .await;
        match result {
            Ok(StatusApply::Rejected(previous)) => {
                tracing::warn!(
                    task_id = %id,
                    from = %previous,
                    to = %update.status,
                    "ignoring disallowed status change"
                );
                StatusApply::Rejected(previous)
            }
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(task_id = %id, error = %err, "failed to apply task status");
                StatusApply::Failed
            }
        }
    }

    pub async fn delete(&self, id: &str) -> bool {
        match self.backend.delete(&self.key(id)).await {
            Ok(existed) => {
                tracing::info!(task_id = %id, existed, "task deleted");
                existed
            }
            Err(err) => {
                tracing::error!(task_id = %id, error = %err, "failed to delete task");
                false
            }
        }
    }

    /// Full scan of the namespace, newest first. Meant for listing and
    /// debugging, not for anything on the hot path.
    pub async fn list(&self, status: Option<TaskStatus>) -> Vec<Task> {
        let prefix = format!("{}:", self.namespace);
        let keys = match self.backend.keys(&prefix).await {
            Ok(keys) => keys,
            Err(err) => {
                tracing::error!(error = %err, "failed to list tasks");
                return Vec::new();
            }
        };

        let mut items = Vec::with_capacity(keys.len());
        for key in keys {
            if self.reserved.contains(&key) {
                continue;
            }
            let Some(id) = key.strip_prefix(&prefix) else {
                continue;
            };
            if let Some(task) = self.get(id).await {
                if status.map_or(true, |wanted| task.status == wanted) {
                    items.push(task);
                }
            }
        }
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items
    }

    async fn load(&self, id: &str) -> Result<Option<Map<String, Value>>, StoreError> {
        let Some(raw) = self.backend.get(&self.key(id)).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(fields) => Ok(Some(fields)),
            _ => Err(StoreError::Backend(format!("task {id} is not a JSON object"))),
        }
    }

    async fn save(&self, id: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(&Value::Object(fields))?;
        self.backend.set(&self.key(id), &encoded).await
    }
}
