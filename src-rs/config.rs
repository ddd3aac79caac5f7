use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::task::{DEFAULT_NAMESPACE, DEFAULT_QUEUE_KEY};

/// When a request is big enough to go to the background queue instead of
/// being answered inline.
#[derive(Clone, Debug, PartialEq)]
pub struct AdmissionPolicy {
    pub max_inline_words: usize,
    pub max_inline_files: usize,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            max_inline_words: 20,
            max_inline_files: 2,
        }
    }
}

impl AdmissionPolicy {
    pub fn should_enqueue(&self, message: &str, file_count: usize) -> bool {
        message.split_whitespace().count() > self.max_inline_words || file_count > self.max_inline_files
    }
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub host: String,
    pub port: u16,
    pub redis_url: String,
    pub api_service_url: String,
    pub git_service_url: String,
    pub provider: String,
    pub model: String,
    pub temperature: Option<f64>,
    pub task_namespace: String,
    pub queue_key: String,
    pub poll_timeout: Duration,
    pub status_timeout: Duration,
    pub admission: AdmissionPolicy,
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            redis_url: "redis://localhost:6379/0".to_string(),
            api_service_url: "http://localhost:8000".to_string(),
            git_service_url: "http://localhost:8004".to_string(),
            provider: "claude".to_string(),
            model: "claude-3-7-sonnet-20250219".to_string(),
            temperature: None,
            task_namespace: DEFAULT_NAMESPACE.to_string(),
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
            poll_timeout: Duration::from_secs(1),
            status_timeout: Duration::from_secs(10),
            admission: AdmissionPolicy::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AgentConfig {
    /// Defaults overridden by environment variables. Call
    /// `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_or("HOST", defaults.host),
            port: env_parse("PORT", defaults.port),
            redis_url: env_or("REDIS_URL", defaults.redis_url),
            api_service_url: env_or("API_SERVICE_URL", defaults.api_service_url),
            git_service_url: env_or("GIT_SERVICE_URL", defaults.git_service_url),
            provider: env_or("LLM_PROVIDER", defaults.provider),
            model: env_opt("LLM_MODEL")
                .or_else(|| env_opt("CLAUDE_API_MODEL"))
                .unwrap_or(defaults.model),
            temperature: env_opt("LLM_TEMPERATURE").and_then(|raw| raw.parse().ok()),
            task_namespace: env_or("TASK_NAMESPACE", defaults.task_namespace),
            queue_key: env_or("TASK_QUEUE_KEY", defaults.queue_key),
            poll_timeout: poll_timeout(env_parse("QUEUE_POLL_SECS", 1)),
            status_timeout: Duration::from_secs(env_parse("STATUS_TIMEOUT_SECS", 10)),
            admission: AdmissionPolicy {
                max_inline_words: env_parse("INLINE_MAX_WORDS", defaults.admission.max_inline_words),
                max_inline_files: env_parse("INLINE_MAX_FILES", defaults.admission.max_inline_files),
            },
            log_level: env_or("LOG_LEVEL", defaults.log_level).to_lowercase(),
        }
    }
}

fn env_or(key: &str, fallback: String) -> String {
    env_opt(key).unwrap_or(fallback)
}

fn env_opt(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}

/// A zero BRPOP timeout blocks forever, which would keep `stop` from
/// ever being observed.
fn poll_timeout(secs: u64) -> Duration {
    if secs == 0 {
        tracing::warn!(key = "QUEUE_POLL_SECS", "poll timeout must be at least 1s, using 1s");
        return Duration::from_secs(1);
    }
    Duration::from_secs(secs)
}

fn env_parse<T: FromStr>(key: &str, fallback: T) -> T {
    match env_opt(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            fallback
        }),
        None => fallback,
    }
}
