use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub raw: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub system: Option<String>,
    pub temperature: Option<f64>,
    pub model: Option<String>,
    pub provider: Option<String>,
}

impl CompletionRequest {
    pub fn prompt(prompt: &str, max_tokens: u32) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
            max_tokens,
            system: None,
            temperature: None,
            model: None,
            provider: None,
        }
    }
}

/// A failed provider call. `retryable` marks rate limits, timeouts and
/// upstream 5xx; the router only retries those.
#[derive(Clone, Debug, Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(code: &str, message: &str, retryable: bool) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            retryable,
        }
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new("timeout", &err.to_string(), true)
        } else {
            Self::new("network_error", &err.to_string(), true)
        }
    }
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<LLMResponse, ProviderError>;
}

/// The text-completion capability the executor and dispatcher depend on.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError>;
}

/// Maps a non-success provider response to a `ProviderError`.
pub(crate) fn classify_status(status: u16, body: &str) -> ProviderError {
    let lowered = body.to_lowercase();
    if status == 401 || status == 403 {
        return ProviderError::new("auth_error", body, false);
    }
    if status == 429 || lowered.contains("quota") || lowered.contains("resource_exhausted") {
        return ProviderError::new("rate_limit", body, true);
    }
    if status == 408 {
        return ProviderError::new("timeout", body, true);
    }
    // 529 is Anthropic's "overloaded".
    if status >= 500 {
        return ProviderError::new("server_error", body, true);
    }
    ProviderError::new("api_error", body, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limits_and_server_errors_are_retryable() {
        assert!(classify_status(429, "slow down").retryable);
        assert!(classify_status(529, "overloaded").retryable);
        assert!(classify_status(400, "RESOURCE_EXHAUSTED").retryable);
        assert_eq!(classify_status(400, "RESOURCE_EXHAUSTED").code, "rate_limit");
    }

    #[test]
    fn client_errors_are_final() {
        let err = classify_status(401, "bad key");
        assert_eq!(err.code, "auth_error");
        assert!(!err.retryable);
        assert!(!classify_status(400, "bad request").retryable);
    }
}
