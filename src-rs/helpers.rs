use std::env;
use std::sync::Arc;

use crate::config::AgentConfig;
use crate::llm::{ClaudeAdapter, ClaudeConfig, GeminiAdapter, GeminiConfig, LLMRouter, ProviderError};

/// Reads `PRIMARY` (comma separated) plus `PREFIX_2` .. `PREFIX_10`.
fn load_keys_from_env(primary: &str, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Ok(raw) = env::var(primary) {
        keys.extend(
            raw.split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
        );
    }
    for idx in 2..=10 {
        if let Ok(value) = env::var(format!("{}_{}", prefix, idx)) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                keys.push(trimmed.to_string());
            }
        }
    }
    keys
}

pub fn load_claude_keys() -> Vec<String> {
    load_keys_from_env("CLAUDE_API_KEY", "CLAUDE_API_KEY")
}

pub fn load_gemini_keys() -> Vec<String> {
    load_keys_from_env("GEMINI_API_KEY", "GEMINI_API_KEY")
}

pub fn build_llm_router(cfg: &AgentConfig) -> Result<LLMRouter, ProviderError> {
    let mut router = LLMRouter::new(&cfg.provider);

    let claude_keys = load_claude_keys();
    if !claude_keys.is_empty() {
        let model = if cfg.provider == "claude" {
            cfg.model.clone()
        } else {
            String::new()
        };
        let adapter = ClaudeAdapter::new(ClaudeConfig {
            api_keys: claude_keys,
            base_url: env::var("CLAUDE_API_URL").unwrap_or_default(),
            model,
            temperature: cfg.temperature,
        })?;
        router.register_provider("claude", Arc::new(adapter));
    }

    let gemini_keys = load_gemini_keys();
    if !gemini_keys.is_empty() {
        let model = if cfg.provider == "gemini" {
            cfg.model.clone()
        } else {
            String::new()
        };
        let adapter = GeminiAdapter::new(GeminiConfig {
            api_keys: gemini_keys,
            base_url: String::new(),
            model,
            temperature: cfg.temperature.unwrap_or(0.3),
        })?;
        router.register_provider("gemini", Arc::new(adapter));
    }

    if !router.has_provider(&cfg.provider) {
        return Err(ProviderError::new(
            "provider_missing",
            &format!("{} provider selected but no API key found", cfg.provider),
            false,
        ));
    }
    Ok(router)
}
