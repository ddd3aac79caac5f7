//! Fakes shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use dev_agent_rs::git::GitOperations;
use dev_agent_rs::llm::{Completion, ProviderError};
use dev_agent_rs::task::{MemoryBackend, StatusReporter, StatusUpdate, TaskQueue, TaskStore, DEFAULT_QUEUE_KEY};
use dev_agent_rs::GitError;

pub const POLL: Duration = Duration::from_millis(50);

/// Answers every prompt with `reply`, except prompts containing `fail_on`.
pub struct FakeCompletion {
    reply: String,
    fail_on: Option<String>,
    calls: AtomicUsize,
}

impl FakeCompletion {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            fail_on: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing_on(reply: &str, marker: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            fail_on: Some(marker.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Completion for FakeCompletion {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_on {
            Some(marker) if prompt.contains(marker.as_str()) => {
                Err(ProviderError::new("api_error", "upstream exploded", false))
            }
            _ => Ok(self.reply.clone()),
        }
    }
}

/// Parks every call until `release` is notified. `entered` fires once a
/// call is parked.
pub struct GatedCompletion {
    reply: String,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedCompletion {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            entered: Notify::new(),
            release: Notify::new(),
        })
    }
}

#[async_trait]
impl Completion for GatedCompletion {
    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, ProviderError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.reply.clone())
    }
}

/// Records every git call and answers with `{"ok": true}`.
#[derive(Default)]
pub struct FakeGit {
    pub calls: Mutex<Vec<String>>,
}

impl FakeGit {
    fn record(&self, call: String) -> Result<Value, GitError> {
        self.calls.lock().unwrap().push(call);
        Ok(json!({"ok": true}))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GitOperations for FakeGit {
    async fn clone_repository(&self, repo_url: &str, _branch: Option<&str>) -> Result<Value, GitError> {
        self.record(format!("clone {repo_url}"))
    }

    async fn commit_changes(&self, repo: &str, message: &str, _changes: &[Value]) -> Result<Value, GitError> {
        self.record(format!("commit {repo} {message}"))
    }

    async fn push_changes(&self, repo: &str, branch: &str) -> Result<Value, GitError> {
        self.record(format!("push {repo} {branch}"))
    }

    async fn pull_changes(&self, repo: &str, branch: &str) -> Result<Value, GitError> {
        self.record(format!("pull {repo} {branch}"))
    }

    async fn manage_branch(&self, repo: &str, branch: &str, create: bool) -> Result<Value, GitError> {
        self.record(format!("branch {repo} {branch} {create}"))
    }
}

/// Keeps every reported transition in order.
#[derive(Default)]
pub struct RecordingReporter {
    pub reports: Mutex<Vec<(String, StatusUpdate)>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<(String, StatusUpdate)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn for_task(&self, id: &str) -> Vec<StatusUpdate> {
        self.reports()
            .into_iter()
            .filter(|(task_id, _)| task_id == id)
            .map(|(_, update)| update)
            .collect()
    }
}

#[async_trait]
impl StatusReporter for RecordingReporter {
    async fn report(&self, task_id: &str, update: &StatusUpdate) {
        self.reports
            .lock()
            .unwrap()
            .push((task_id.to_string(), update.clone()));
    }
}

pub fn memory_queue() -> (TaskQueue, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let store = TaskStore::new(backend.clone(), "test:tasks");
    (TaskQueue::new(store, DEFAULT_QUEUE_KEY), backend)
}

/// Serves the HTTP API on an ephemeral local port.
pub fn spawn_api(queue: TaskQueue, completion: Arc<dyn Completion>) -> std::net::SocketAddr {
    use dev_agent_rs::api::{router, AppState};
    use dev_agent_rs::task::NoopReporter;
    use dev_agent_rs::{AdmissionPolicy, DevAgent};

    let store = queue.store().clone();
    let agent = DevAgent::new(completion, queue, Arc::new(NoopReporter), AdmissionPolicy::default());
    let state = AppState {
        agent: Arc::new(agent),
        store,
    };

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let server = axum::Server::from_tcp(listener)
        .unwrap()
        .serve(router(state).into_make_service());
    tokio::spawn(server);
    addr
}
