use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};

use super::types::GitOperations;
use crate::error::GitError;

/// HTTP client for the git service.
pub struct GitClient {
    base_url: String,
    client: Client,
}

impl GitClient {
    pub fn new(base_url: &str) -> Result<Self, GitError> {
        let client = Client::builder()
            .build()
            .map_err(|err| GitError::Transport(err.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder, timeout: Duration) -> Result<Value, GitError> {
        let resp = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| GitError::Transport(err.to_string()))?;
        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(operation, status = status.as_u16(), body = %body, "git service error");
            return Err(GitError::Status {
                operation,
                status: status.as_u16(),
                body,
            });
        }
        let value = resp
            .json::<Value>()
            .await
            .map_err(|err| GitError::Transport(err.to_string()))?;
        tracing::info!(operation, "git operation finished");
        Ok(value)
    }
}

#[async_trait]
impl GitOperations for GitClient {
    async fn clone_repository(&self, repo_url: &str, branch: Option<&str>) -> Result<Value, GitError> {
        tracing::info!(repo_url, branch = branch.unwrap_or("default"), "cloning repository");
        let mut query = vec![("url", repo_url)];
        if let Some(branch) = branch {
            query.push(("branch", branch));
        }
        let request = self.client.post(self.url("/repos/clone")).query(&query);
        self.send("clone", request, Duration::from_secs(60)).await
    }

    async fn commit_changes(&self, repo: &str, message: &str, changes: &[Value]) -> Result<Value, GitError> {
        tracing::info!(repo, message, "committing changes");
        let request = self
            .client
            .post(self.url(&format!("/repos/{repo}/commit")))
            .json(&json!({"message": message, "changes": changes}));
        self.send("commit", request, Duration::from_secs(30)).await
    }

    async fn push_changes(&self, repo: &str, branch: &str) -> Result<Value, GitError> {
        tracing::info!(repo, branch, "pushing changes");
        let request = self
            .client
            .post(self.url(&format!("/repos/{repo}/push")))
            .json(&json!({"branch": branch}));
        self.send("push", request, Duration::from_secs(30)).await
    }

    async fn pull_changes(&self, repo: &str, branch: &str) -> Result<Value, GitError> {
        tracing::info!(repo, branch, "pulling changes");
        let request = self
            .client
            .post(self.url(&format!("/repos/{repo}/pull")))
            .json(&json!({"branch": branch}));
        self.send("pull", request, Duration::from_secs(30)).await
    }

    async fn manage_branch(&self, repo: &str, branch: &str, create: bool) -> Result<Value, GitError> {
        tracing::info!(repo, branch, create, "managing branch");
        let request = self
            .client
            .post(self.url(&format!("/repos/{repo}/branch")))
            .json(&json!({"branch": branch, "create": create}));
        self.send("branch", request, Duration::from_secs(10)).await
    }
}
