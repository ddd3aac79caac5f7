use async_trait::async_trait;
use serde_json::Value;

use crate::error::GitError;
use crate::task::OperationPlan;

const DEFAULT_BRANCH: &str = "main";

/// A git operation decoded from an LLM operation plan.
#[derive(Clone, Debug, PartialEq)]
pub enum GitOperation {
    Clone {
        repo_url: String,
        branch: Option<String>,
    },
    Commit {
        repo_path: String,
        message: String,
        files: Vec<Value>,
    },
    Push {
        repo_path: String,
        branch: String,
    },
    Pull {
        repo_path: String,
        branch: String,
    },
    Branch {
        repo_path: String,
        branch_name: String,
        create: bool,
    },
}

impl GitOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clone { .. } => "clone",
            Self::Commit { .. } => "commit",
            Self::Push { .. } => "push",
            Self::Pull { .. } => "pull",
            Self::Branch { .. } => "branch",
        }
    }

    pub fn from_plan(plan: &OperationPlan) -> Result<Self, GitError> {
        let params = &plan.parameters;
        let operation = plan.operation_type.trim().to_lowercase();
        match operation.as_str() {
            "clone" => Ok(Self::Clone {
                repo_url: required(params, "repo_url")?,
                branch: optional(params, "branch"),
            }),
            "commit" => Ok(Self::Commit {
                repo_path: required(params, "repo_path")?,
                message: required(params, "message")?,
                files: params
                    .get("files")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
            }),
            "push" => Ok(Self::Push {
                repo_path: required(params, "repo_path")?,
                branch: optional(params, "branch").unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            }),
            "pull" => Ok(Self::Pull {
                repo_path: required(params, "repo_path")?,
                branch: optional(params, "branch").unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            }),
            "branch" => Ok(Self::Branch {
                repo_path: required(params, "repo_path")?,
                branch_name: required(params, "branch_name")?,
                create: params.get("create").and_then(Value::as_bool).unwrap_or(false),
            }),
            _ => Err(GitError::Unsupported(plan.operation_type.clone())),
        }
    }
}

fn optional(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn required(params: &Value, key: &str) -> Result<String, GitError> {
    optional(params, key).ok_or_else(|| GitError::InvalidParameters(format!("missing `{key}`")))
}

/// The git primitives the executor can call.
#[async_trait]
pub trait GitOperations: Send + Sync {
    async fn clone_repository(&self, repo_url: &str, branch: Option<&str>) -> Result<Value, GitError>;

    async fn commit_changes(&self, repo: &str, message: &str, changes: &[Value]) -> Result<Value, GitError>;

    async fn push_changes(&self, repo: &str, branch: &str) -> Result<Value, GitError>;

    async fn pull_changes(&self, repo: &str, branch: &str) -> Result<Value, GitError>;

    async fn manage_branch(&self, repo: &str, branch: &str, create: bool) -> Result<Value, GitError>;

    async fn execute(&self, operation: &GitOperation) -> Result<Value, GitError> {
        match operation {
            GitOperation::Clone { repo_url, branch } => self.clone_repository(repo_url, branch.as_deref()).await,
            GitOperation::Commit {
                repo_path,
                message,
                files,
            } => self.commit_changes(repo_path, message, files).await,
            GitOperation::Push { repo_path, branch } => self.push_changes(repo_path, branch).await,
            GitOperation::Pull { repo_path, branch } => self.pull_changes(repo_path, branch).await,
            GitOperation::Branch {
                repo_path,
                branch_name,
                create,
            } => self.manage_branch(repo_path, branch_name, *create).await,
        }
    }
}
