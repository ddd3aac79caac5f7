//! The consumer loop: drains the task queue one task at a time.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::queue::TaskQueue;
use super::status::StatusReporter;
use super::types::{GitParams, PromptParams, StatusUpdate, Task, TaskKind, TaskStatus};
use crate::error::TaskError;
use crate::git::{GitOperation, GitOperations};
use crate::llm::Completion;

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);
const HANDLER_MAX_TOKENS: u32 = 4000;
const CLAIM_PROGRESS: u8 = 10;

/// Single consumer of the task queue.
///
/// Tasks run strictly one after another; a slow completion or git call
/// holds up everything queued behind it. Nothing here retries a failed
/// task or bounds a handler's runtime.
pub struct TaskExecutor {
    queue: TaskQueue,
    completion: Arc<dyn Completion>,
    git: Arc<dyn GitOperations>,
    reporter: Arc<dyn StatusReporter>,
    poll_timeout: Duration,
}

impl TaskExecutor {
    pub fn new(
        queue: TaskQueue,
        completion: Arc<dyn Completion>,
        git: Arc<dyn GitOperations>,
        reporter: Arc<dyn StatusReporter>,
    ) -> Self {
        Self {
            queue,
            completion,
            git,
            reporter,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// One loop iteration. Returns the terminal status of the task it ran,
    /// or `None` when the poll came back empty.
    pub async fn run_once(&self) -> Option<TaskStatus> {
        let task = self.queue.dequeue(self.poll_timeout).await?;
        Some(self.process(task).await)
    }

    /// Spawns the loop. Nothing runs until this is called.
    pub fn start(self: Arc<Self>) -> ExecutorHandle {
        let (shutdown, mut stopped) = watch::channel(false);
        let join = tokio::spawn(async move {
            tracing::info!("task executor started");
            while !*stopped.borrow_and_update() {
                self.run_once().await;
            }
            tracing::info!("task executor stopped");
        });
        ExecutorHandle { shutdown, join }
    }

    pub async fn process(&self, task: Task) -> TaskStatus {
        tracing::info!(task_id = %task.id, task_type = %task.task_type, "starting task");
        self.report(&task.id, StatusUpdate::in_progress(CLAIM_PROGRESS)).await;

        let outcome = match task.kind() {
            Ok(kind) => self.handle(&task.id, kind).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(result) => {
                tracing::info!(task_id = %task.id, "task completed");
                self.report(&task.id, StatusUpdate::completed(result)).await;
                TaskStatus::Completed
            }
            Err(err) => {
                tracing::error!(task_id = %task.id, error = %err, "task failed");
                self.report(&task.id, StatusUpdate::failed(err.to_string())).await;
                TaskStatus::Failed
            }
        }
    }

    async fn handle(&self, id: &str, kind: TaskKind) -> Result<Value, TaskError> {
        match kind {
            TaskKind::CodeGeneration(params) => self.generate_code(id, params).await,
            TaskKind::GitOperation(params) => self.run_git_operation(id, params).await,
            TaskKind::CodeAnalysis(params) => self.analyze_code(id, params).await,
        }
    }

    async fn generate_code(&self, id: &str, params: PromptParams) -> Result<Value, TaskError> {
        self.report(id, StatusUpdate::in_progress(30)).await;
        let response = self.completion.complete(&params.prompt, HANDLER_MAX_TOKENS).await?;
        self.report(id, StatusUpdate::in_progress(70)).await;
        let code_blocks = extract_code_blocks(&response);
        Ok(json!({
            "response": response,
            "code_blocks": code_blocks,
        }))
    }

    async fn run_git_operation(&self, id: &str, params: GitParams) -> Result<Value, TaskError> {
        self.report(id, StatusUpdate::in_progress(20)).await;
        let operation = GitOperation::from_plan(&params.operation_plan)?;
        self.report(id, StatusUpdate::in_progress(40)).await;
        let result = self.git.execute(&operation).await?;
        self.report(id, StatusUpdate::in_progress(80)).await;
        Ok(json!({
            "operation_type": operation.name(),
            "result": result,
        }))
    }

    async fn analyze_code(&self, id: &str, params: PromptParams) -> Result<Value, TaskError> {
        self.report(id, StatusUpdate::in_progress(30)).await;
        let analysis = self.completion.complete(&params.prompt, HANDLER_MAX_TOKENS).await?;
        self.report(id, StatusUpdate::in_progress(80)).await;
        Ok(json!({ "analysis": analysis }))
    }

    /// Pushes the transition to the bridge and mirrors it into the local
    /// store copy.
    async fn report(&self, id: &str, update: StatusUpdate) {
        self.reporter.report(id, &update).await;
        self.queue.store().apply_status(id, &update).await;
    }
}

pub struct ExecutorHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ExecutorHandle {
    /// Asks the loop to exit after its current iteration and waits for it.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.join.await {
            tracing::error!(error = %err, "task executor panicked");
        }
    }
}

fn code_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```([a-zA-Z0-9_+-]*)\n(.*?)\n```").expect("valid code block pattern"))
}

/// Fenced code blocks keyed `file_<n><ext>`, the extension taken from the
/// fence's language tag.
fn extract_code_blocks(text: &str) -> BTreeMap<String, String> {
    code_block_pattern()
        .captures_iter(text)
        .enumerate()
        .map(|(idx, caps)| {
            let language = caps.get(1).map_or("", |m| m.as_str());
            let code = caps.get(2).map_or("", |m| m.as_str());
            (format!("file_{}{}", idx + 1, file_extension(language)), code.to_string())
        })
        .collect()
}

fn file_extension(language: &str) -> &'static str {
    match language.to_lowercase().as_str() {
        "python" => ".py",
        "javascript" => ".js",
        "typescript" => ".ts",
        "java" => ".java",
        "c" => ".c",
        "cpp" => ".cpp",
        "csharp" => ".cs",
        "go" => ".go",
        "ruby" => ".rb",
        "php" => ".php",
        "swift" => ".swift",
        "kotlin" => ".kt",
        "rust" => ".rs",
        "html" => ".html",
        "css" => ".css",
        "json" => ".json",
        "yaml" => ".yaml",
        "yml" => ".yml",
        "xml" => ".xml",
        "markdown" | "md" => ".md",
        "sql" => ".sql",
        "shell" | "bash" => ".sh",
        "dockerfile" => ".Dockerfile",
        "makefile" => ".Makefile",
        _ => ".txt",
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn extracts_fenced_blocks_in_order() {
        let text = "Here:\n```rust\nfn main() {}\n```\nand\n```\nplain\n```\n";
        let blocks = extract_code_blocks(text);
        assert_eq!(blocks.get("file_1.rs").map(String::as_str), Some("fn main() {}"));
        assert_eq!(blocks.get("file_2.txt").map(String::as_str), Some("plain"));
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn multi_line_blocks_keep_their_body() {
        let text = "```python\nimport os\nprint(os.getcwd())\n```";
        let blocks = extract_code_blocks(text);
        assert_eq!(
            blocks.get("file_1.py").map(String::as_str),
            Some("import os\nprint(os.getcwd())")
        );
    }

    #[test]
    fn no_blocks_in_plain_text() {
        assert!(extract_code_blocks("just words").is_empty());
        assert_eq!(file_extension("Bash"), ".sh");
        assert_eq!(file_extension("brainfuck"), ".txt");
    }
}
