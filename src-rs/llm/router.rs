use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::retry::RetryPolicy;
use super::types::{Completion, CompletionRequest, LLMResponse, ProviderAdapter, ProviderError};

pub struct LLMRouter {
    default_provider: String,
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
    retry: RetryPolicy,
}

impl LLMRouter {
    pub fn new(default_provider: &str) -> Self {
        Self {
            default_provider: default_provider.to_string(),
            providers: HashMap::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn register_provider(&mut self, name: &str, adapter: Arc<dyn ProviderAdapter>) {
        self.providers.insert(name.to_string(), adapter);
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub async fn complete_request(&self, request: CompletionRequest) -> Result<LLMResponse, ProviderError> {
        let provider = request
            .provider
            .clone()
            .unwrap_or_else(|| self.default_provider.clone());
        let adapter = self.providers.get(&provider).ok_or_else(|| {
            ProviderError::new("provider_missing", &format!("provider not registered: {}", provider), false)
        })?;

        let mut attempt = 1;
        loop {
            match adapter.complete(request.clone()).await {
                Ok(resp) => return Ok(resp),
                Err(err) if err.retryable && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        provider = %provider,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying completion"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(provider = %provider, attempt, error = %err, "completion failed");
                    return Err(err);
                }
            }
        }
    }
}

#[async_trait]
impl Completion for LLMRouter {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        self.complete_request(CompletionRequest::prompt(prompt, max_tokens))
            .await
            .map(|resp| resp.content)
    }
}
