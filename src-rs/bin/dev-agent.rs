use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use dev_agent_rs::api::{AgentServer, AppState};
use dev_agent_rs::git::GitClient;
use dev_agent_rs::helpers::build_llm_router;
use dev_agent_rs::llm::Completion;
use dev_agent_rs::task::{HttpStatusReporter, RedisBackend, StatusReporter, TaskExecutor, TaskQueue, TaskStore};
use dev_agent_rs::{AgentConfig, DevAgent};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("dev-agent error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let cfg = AgentConfig::from_env();
    init_tracing(&cfg.log_level)?;

    let backend = Arc::new(RedisBackend::connect(&cfg.redis_url).await?);
    let queue = TaskQueue::new(TaskStore::new(backend, &cfg.task_namespace), &cfg.queue_key);
    let store = queue.store().clone();

    let reporter: Arc<dyn StatusReporter> =
        Arc::new(HttpStatusReporter::new(&cfg.api_service_url, cfg.status_timeout)?);
    let completion: Arc<dyn Completion> = Arc::new(build_llm_router(&cfg)?);
    let git = Arc::new(GitClient::new(&cfg.git_service_url)?);
    tracing::info!(provider = %cfg.provider, model = %cfg.model, "llm router ready");

    let executor = TaskExecutor::new(queue.clone(), completion.clone(), git, reporter.clone())
        .with_poll_timeout(cfg.poll_timeout);
    let executor = Arc::new(executor).start();

    let agent = Arc::new(DevAgent::new(completion, queue, reporter, cfg.admission.clone()));
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    let server = AgentServer::new(addr, AppState { agent, store });
    let served = server.start(shutdown_signal()).await;

    executor.stop().await;
    served?;
    Ok(())
}

fn init_tracing(level: &str) -> Result<(), Box<dyn Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| format!("failed to initialize tracing subscriber: {err}"))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
