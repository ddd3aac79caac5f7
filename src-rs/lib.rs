pub mod agent;
pub mod config;
pub mod error;
pub mod helpers;
pub mod result;

#[path = "llm/lib.rs"]
pub mod llm;
#[path = "git/lib.rs"]
pub mod git;
#[path = "task/lib.rs"]
pub mod task;
#[path = "api/lib.rs"]
pub mod api;

pub use agent::{DevAgent, RequestKind};
pub use config::{AdmissionPolicy, AgentConfig};
pub use error::{AgentError, GitError, StoreError, TaskError};
pub use result::{AgentReply, ReplyMeta, TaskHandle};
