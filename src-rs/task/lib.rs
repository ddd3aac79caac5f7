pub mod backend;
pub mod executor;
pub mod queue;
pub mod redis_backend;
pub mod status;
pub mod store;
pub mod types;

pub use backend::{KvBackend, MemoryBackend};
pub use executor::{ExecutorHandle, TaskExecutor};
pub use queue::{TaskQueue, DEFAULT_QUEUE_KEY};
pub use redis_backend::RedisBackend;
pub use status::{HttpStatusReporter, NoopReporter, StatusReporter};
pub use store::{StatusApply, TaskStore, DEFAULT_NAMESPACE};
pub use types::{GitParams, OperationPlan, PromptParams, StatusUpdate, Task, TaskKind, TaskStatus};
