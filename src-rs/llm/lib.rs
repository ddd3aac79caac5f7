pub mod claude_adapter;
pub mod gemini_adapter;
pub mod retry;
pub mod rotation;
pub mod router;
pub mod types;

pub use claude_adapter::{ClaudeAdapter, ClaudeConfig};
pub use gemini_adapter::{GeminiAdapter, GeminiConfig};
pub use retry::RetryPolicy;
pub use rotation::Rotator;
pub use router::LLMRouter;
pub use types::{Completion, CompletionRequest, LLMResponse, Message, ProviderAdapter, ProviderError};
