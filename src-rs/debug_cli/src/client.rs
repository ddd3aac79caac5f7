use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;

use crate::models::{ProcessReply, ProcessRequest, TaskInfo};

pub struct HTTPClient {
    pub base_url: String,
    pub token: Option<String>,
    client: Client,
}

impl HTTPClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("reqwest client"),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, String> {
        let request = match &self.token {
            Some(token) => match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(header) => request.header(AUTHORIZATION, header),
                Err(_) => request,
            },
            None => request,
        };
        let resp = request.send().map_err(|err| err.to_string())?;
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            Err(format!("http {}: {}", status.as_u16(), body))
        }
    }

    fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, String> {
        self.send(request)?.json::<T>().map_err(|err| err.to_string())
    }

    pub fn health(&self) -> Result<serde_json::Value, String> {
        self.send_json(self.client.get(self.url("/health")))
    }

    pub fn process(&self, req: &ProcessRequest) -> Result<ProcessReply, String> {
        self.send_json(self.client.post(self.url("/process")).json(req))
    }

    pub fn list_tasks(&self, status: Option<&str>) -> Result<Vec<TaskInfo>, String> {
        let mut request = self.client.get(self.url("/tasks"));
        if let Some(status) = status {
            request = request.query(&[("status", status)]);
        }
        self.send_json(request)
    }

    pub fn get_task(&self, id: &str) -> Result<TaskInfo, String> {
        self.send_json(self.client.get(self.url(&format!("/tasks/{}", id))))
    }

    pub fn delete_task(&self, id: &str) -> Result<(), String> {
        self.send(self.client.delete(self.url(&format!("/tasks/{}", id))))
            .map(|_| ())
    }
}
