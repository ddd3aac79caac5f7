//! Key-value backends behind the task store and queue.
//!
//! A backend only knows about string values and string lists; record
//! encoding and the queue discipline live in `TaskStore` and `TaskQueue`.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::StoreError;

#[async_trait]
pub trait KvBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// All keys starting with `prefix`.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Pushes onto the head of a list (`LPUSH`).
    async fn push_head(&self, list: &str, value: &str) -> Result<(), StoreError>;

    /// Pops from the tail of a list, waiting up to `timeout` for an element
    /// (`BRPOP`). `None` means the wait timed out.
    async fn pop_tail_blocking(&self, list: &str, timeout: Duration) -> Result<Option<String>, StoreError>;
}

#[derive(Default)]
struct MemoryState {
    values: HashMap<String, String>,
    lists: HashMap<String, VecDeque<String>>,
}

/// In-process backend with the same semantics as the Redis one.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    pushed: Notify,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> Result<T, StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::Backend("memory backend lock poisoned".to_string()))?;
        Ok(f(&mut state))
    }

    /// Number of ids waiting in `list`.
    pub fn list_len(&self, list: &str) -> usize {
        self.with_state(|state| state.lists.get(list).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_state(|state| {
            if state.lists.get(key).is_some_and(|list| !list.is_empty()) {
                return Err(StoreError::Backend(format!("WRONGTYPE {key} holds a list")));
            }
            Ok(state.values.get(key).cloned())
        })?
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.with_state(|state| {
            state.values.insert(key.to_string(), value.to_string());
        })
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.with_state(|state| state.values.remove(key).is_some())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.with_state(|state| {
            let lists = state
                .lists
                .iter()
                .filter(|(_, list)| !list.is_empty())
                .map(|(key, _)| key);
            state
                .values
                .keys()
                .chain(lists)
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect()
        })
    }

    async fn push_head(&self, list: &str, value: &str) -> Result<(), StoreError> {
        self.with_state(|state| {
            state
                .lists
                .entry(list.to_string())
                .or_default()
                .push_front(value.to_string());
        })?;
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn pop_tail_blocking(&self, list: &str, timeout: Duration) -> Result<Option<String>, StoreError> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before checking so a push between the check
            // and the wait is not missed.
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let popped = self.with_state(|state| state.lists.get_mut(list).and_then(VecDeque::pop_back))?;
            if popped.is_some() {
                return Ok(popped);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }
}
