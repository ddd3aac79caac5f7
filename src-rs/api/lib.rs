pub use crate::agent::DevAgent;
pub use crate::result::AgentReply;
pub use crate::task::{StatusUpdate, Task, TaskStatus, TaskStore};

pub mod handlers;
pub mod server;

pub use server::{router, AgentServer, AppState};
