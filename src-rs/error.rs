//! Error types shared across the queue, the executor and the dispatcher.
//!
//! `ProviderError` lives with the LLM adapters in `llm::types`.

use thiserror::Error;

use crate::llm::ProviderError;

/// Faults raised by a key-value backend or by record (de)serialization.
///
/// These never escape `TaskStore`/`TaskQueue`; both degrade to
/// `None`/`false` and log instead.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors from the git service client.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("git service request failed: {0}")]
    Transport(String),

    #[error("git {operation} failed with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("Unsupported git operation: {0}")]
    Unsupported(String),

    #[error("invalid git parameters: {0}")]
    InvalidParameters(String),
}

/// A fault inside a single task. Its `Display` output is what ends up in
/// the record's `error` field.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Unknown task type: {0}")]
    UnknownType(String),

    #[error("invalid task params: {0}")]
    InvalidParams(String),

    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Git(#[from] GitError),
}

/// Errors surfaced by the dispatcher to the HTTP layer.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("completion failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("could not enqueue task {0}")]
    Enqueue(String),
}
