pub mod client;
pub mod types;

pub use client::GitClient;
pub use types::{GitOperation, GitOperations};
