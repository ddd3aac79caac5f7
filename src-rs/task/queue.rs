use std::time::Duration;

use super::backend::KvBackend;
use super::store::TaskStore;
use super::types::Task;

pub const DEFAULT_QUEUE_KEY: &str = "agent:tasks:queue";

/// FIFO hand-off of task ids from producers to the consumer loop.
///
/// Ids are pushed at the head of a list and popped from the tail. The
/// record write and the push are two separate operations: a crash in
/// between leaves a stored record that nothing will ever dequeue.
#[derive(Clone)]
pub struct TaskQueue {
    store: TaskStore,
    queue_key: String,
}

impl TaskQueue {
    /// The queue key is reserved in `store` so listings never read it
    /// as a task record.
    pub fn new(store: TaskStore, queue_key: &str) -> Self {
        Self {
            store: store.reserving(queue_key),
            queue_key: queue_key.to_string(),
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub async fn enqueue(&self, task: &Task) -> bool {
        if task.id.is_empty() {
            tracing::error!("refusing to enqueue a task without an id");
            return false;
        }
        if !self.store.put(task).await {
            return false;
        }
        self.push(&task.id).await
    }

    /// Makes an already stored record visible to the consumer.
    pub async fn push(&self, task_id: &str) -> bool {
        if task_id.is_empty() {
            tracing::error!("refusing to push an empty task id");
            return false;
        }
        match self.store.backend().push_head(&self.queue_key, task_id).await {
            Ok(()) => {
                tracing::info!(task_id = %task_id, "task enqueued");
                true
            }
            Err(err) => {
                tracing::error!(task_id = %task_id, error = %err, "failed to push task id");
                false
            }
        }
    }

    /// Waits up to `timeout` for the next task. `None` on timeout, on a
    /// store fault, or when the popped id has no record (the id is dropped).
    pub async fn dequeue(&self, timeout: Duration) -> Option<Task> {
        let id = match self.store.backend().pop_tail_blocking(&self.queue_key, timeout).await {
            Ok(Some(id)) => id,
            Ok(None) => return None,
            Err(err) => {
                tracing::error!(error = %err, "failed to pop from task queue");
                // Keep a consumer polling a dead store from spinning.
                tokio::time::sleep(timeout).await;
                return None;
            }
        };

        match self.store.get(&id).await {
            Some(task) => {
                tracing::info!(task_id = %id, "task dequeued");
                Some(task)
            }
            None => {
                tracing::warn!(task_id = %id, "dequeued id has no stored record, dropping it");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::error::StoreError;
    use crate::task::backend::MemoryBackend;
    use crate::task::store::DEFAULT_NAMESPACE;
    use crate::task::types::{PromptParams, TaskKind, TaskStatus};

    const WAIT: Duration = Duration::from_millis(20);

    fn queue() -> TaskQueue {
        TaskQueue::new(
            TaskStore::new(Arc::new(MemoryBackend::new()), DEFAULT_NAMESPACE),
            DEFAULT_QUEUE_KEY,
        )
    }

    fn task(prompt: &str) -> Task {
        Task::new(
            &TaskKind::CodeGeneration(PromptParams {
                prompt: prompt.to_string(),
                context: json!({}),
            }),
            prompt,
        )
    }

    #[tokio::test]
    async fn dequeues_in_enqueue_order() {
        let queue = queue();
        let tasks: Vec<Task> = (0..5).map(|n| task(&format!("task {n}"))).collect();
        for task in &tasks {
            assert!(queue.enqueue(task).await);
        }
        for expected in &tasks {
            let got = queue.dequeue(WAIT).await.unwrap();
            assert_eq!(got.id, expected.id);
            assert_eq!(got.status, TaskStatus::Pending);
        }
        assert!(queue.dequeue(WAIT).await.is_none());
    }

    #[tokio::test]
    async fn evicted_record_is_dropped() {
        let queue = queue();
        let gone = task("gone");
        let kept = task("kept");
        queue.enqueue(&gone).await;
        queue.enqueue(&kept).await;
        assert!(queue.store().delete(&gone.id).await);

        assert!(queue.dequeue(WAIT).await.is_none());
        assert_eq!(queue.dequeue(WAIT).await.unwrap().id, kept.id);
    }

    #[tokio::test]
    async fn rejects_tasks_without_id() {
        let queue = queue();
        let mut task = task("anonymous");
        task.id.clear();
        assert!(!queue.enqueue(&task).await);
    }

    #[tokio::test]
    async fn queue_key_inside_namespace_is_not_listed() {
        let queue = TaskQueue::new(TaskStore::new(Arc::new(MemoryBackend::new()), "agent:tasks"), DEFAULT_QUEUE_KEY);
        let queued = task("queued");
        assert!(queue.enqueue(&queued).await);

        let listed = queue.store().list(None).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, queued.id);
    }

    #[tokio::test]
    async fn push_exposes_a_stored_record() {
        let queue = queue();
        let stored = task("stored first");
        assert!(queue.store().put(&stored).await);
        assert!(queue.dequeue(WAIT).await.is_none());

        assert!(queue.push(&stored.id).await);
        assert_eq!(queue.dequeue(WAIT).await.unwrap().id, stored.id);
        assert!(!queue.push("").await);
    }

    struct Unreachable;

    #[async_trait]
    impl KvBackend for Unreachable {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn delete(&self, _key: &str) -> Result<bool, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn keys(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn push_head(&self, _list: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
        async fn pop_tail_blocking(&self, _list: &str, _timeout: Duration) -> Result<Option<String>, StoreError> {
            Err(StoreError::Backend("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn store_faults_degrade_to_failure() {
        let queue = TaskQueue::new(TaskStore::new(Arc::new(Unreachable), DEFAULT_NAMESPACE), DEFAULT_QUEUE_KEY);
        assert!(!queue.enqueue(&task("lost")).await);
        assert!(queue.dequeue(WAIT).await.is_none());
        assert!(queue.store().list(None).await.is_empty());
    }
}
