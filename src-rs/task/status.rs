//! Status reporting bridge: pushes task transitions to the service that
//! owns the authoritative record.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use super::types::StatusUpdate;

/// Best-effort delivery of a status transition. Implementations never
/// fail to the caller; faults are logged and dropped.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report(&self, task_id: &str, update: &StatusUpdate);
}

/// `PATCH {base_url}/tasks/{id}/status`, no retry.
pub struct HttpStatusReporter {
    base_url: String,
    client: Client,
}

impl HttpStatusReporter {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self, task_id: &str) -> String {
        format!("{}/tasks/{}/status", self.base_url, task_id)
    }
}

#[async_trait]
impl StatusReporter for HttpStatusReporter {
    async fn report(&self, task_id: &str, update: &StatusUpdate) {
        tracing::info!(
            task_id = %task_id,
            status = %update.status,
            progress = update.progress,
            "reporting task status"
        );
        let resp = match self.client.patch(self.endpoint(task_id)).json(update).send().await {
            Ok(resp) => resp,
            Err(err) => {
                tracing::error!(task_id = %task_id, error = %err, "status report not delivered");
                return;
            }
        };
        if resp.status() != StatusCode::OK {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(task_id = %task_id, status, body = %body, "status report rejected");
        }
    }
}

/// Drops every report. For deployments where the local store is the only
/// record.
pub struct NoopReporter;

#[async_trait]
impl StatusReporter for NoopReporter {
    async fn report(&self, task_id: &str, update: &StatusUpdate) {
        tracing::debug!(task_id = %task_id, status = %update.status, "status report skipped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_strips_trailing_slash() {
        let reporter = HttpStatusReporter::new("http://api:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(reporter.endpoint("t1"), "http://api:8000/tasks/t1/status");
    }
}
