use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::rotation::Rotator;
use super::types::{classify_status, CompletionRequest, LLMResponse, ProviderAdapter, ProviderError};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct ClaudeConfig {
    pub api_keys: Vec<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: Option<f64>,
}

/// Anthropic Messages API adapter.
pub struct ClaudeAdapter {
    cfg: ClaudeConfig,
    rotator: Rotator,
    client: Client,
}

impl ClaudeAdapter {
    pub fn new(mut cfg: ClaudeConfig) -> Result<Self, ProviderError> {
        if cfg.base_url.is_empty() {
            cfg.base_url = "https://api.anthropic.com".to_string();
        }
        if cfg.model.is_empty() {
            cfg.model = "claude-3-7-sonnet-20250219".to_string();
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| ProviderError::new("client_error", &err.to_string(), false))?;
        Ok(Self {
            rotator: Rotator::new(cfg.api_keys.clone()),
            cfg,
            client,
        })
    }

    fn payload(&self, request: &CompletionRequest) -> Value {
        let model = request.model.clone().unwrap_or_else(|| self.cfg.model.clone());
        let mut payload = json!({
            "model": model,
            "max_tokens": request.max_tokens,
            "messages": request.messages,
        });
        if let Some(system) = &request.system {
            payload["system"] = json!(system);
        }
        if let Some(temperature) = request.temperature.or(self.cfg.temperature) {
            payload["temperature"] = json!(temperature);
        }
        payload
    }

    async fn send(&self, api_key: &str, payload: &Value) -> Result<LLMResponse, ProviderError> {
        let endpoint = format!("{}/v1/messages", self.cfg.base_url.trim_end_matches('/'));
        let started = std::time::Instant::now();
        let resp = self
            .client
            .post(endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(payload)
            .send()
            .await
            .map_err(|err| ProviderError::from_reqwest(&err))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &body));
        }
        tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "claude request finished");

        let raw: Value = serde_json::from_str(&body)
            .map_err(|_| ProviderError::new("parse_error", "invalid json", false))?;
        let content = parse_content(&raw)
            .ok_or_else(|| ProviderError::new("parse_error", "response has no text content", false))?;
        Ok(LLMResponse {
            content,
            raw: Some(raw),
        })
    }
}

#[async_trait]
impl ProviderAdapter for ClaudeAdapter {
    async fn complete(&self, request: CompletionRequest) -> Result<LLMResponse, ProviderError> {
        let payload = self.payload(&request);
        let tries = self.rotator.len();
        if tries == 0 {
            return Err(ProviderError::new("auth_error", "no Claude API keys", false));
        }
        let mut last_err = None;
        for _ in 0..tries {
            let Some(key) = self.rotator.next() else {
                break;
            };
            match self.send(key, &payload).await {
                Ok(resp) => return Ok(resp),
                Err(err) => {
                    tracing::warn!(code = %err.code, "claude request failed");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ProviderError::new("api_error", "request failed", true)))
    }
}

fn parse_content(raw: &Value) -> Option<String> {
    let blocks = raw.get("content")?.as_array()?;
    let text: String = blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();
    if blocks.is_empty() {
        None
    } else {
        Some(text)
    }
}
