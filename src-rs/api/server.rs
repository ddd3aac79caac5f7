use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;

use crate::agent::DevAgent;
use crate::api::handlers::{
    handle_delete_task, handle_get_task, handle_health, handle_list_tasks, handle_process, handle_update_status,
};
use crate::task::TaskStore;

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<DevAgent>,
    pub store: TaskStore,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/process", post(handle_process))
        .route("/tasks", get(handle_list_tasks))
        .route("/tasks/:task_id", get(handle_get_task).delete(handle_delete_task))
        .route("/tasks/:task_id/status", patch(handle_update_status))
        .with_state(state)
}

pub struct AgentServer {
    pub addr: SocketAddr,
    pub state: AppState,
}

impl AgentServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self { addr, state }
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    pub async fn start(&self, shutdown: impl Future<Output = ()>) -> Result<(), String> {
        tracing::info!(addr = %self.addr, "dev-agent listening");
        axum::Server::try_bind(&self.addr)
            .map_err(|err| err.to_string())?
            .serve(router(self.state.clone()).into_make_service())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|err| err.to_string())
    }
}
