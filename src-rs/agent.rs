use std::sync::Arc;

use serde_json::Value;

use crate::config::AdmissionPolicy;
use crate::error::AgentError;
use crate::llm::Completion;
use crate::result::{AgentReply, ReplyMeta, TaskHandle};
use crate::task::{GitParams, OperationPlan, PromptParams, StatusReporter, StatusUpdate, Task, TaskKind, TaskQueue};

const CLASSIFY_MAX_TOKENS: u32 = 100;
const PRELIMINARY_MAX_TOKENS: u32 = 1000;
const ANSWER_MAX_TOKENS: u32 = 4000;
const DESCRIPTION_CHARS: usize = 50;

/// The categories an inbound message can fall into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    CodeAnalysis,
    CodeGeneration,
    ErrorFixing,
    GitOperation,
    GeneralQuestion,
}

impl RequestKind {
    const ALL: [RequestKind; 5] = [
        Self::CodeAnalysis,
        Self::CodeGeneration,
        Self::ErrorFixing,
        Self::GitOperation,
        Self::GeneralQuestion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeAnalysis => "code_analysis",
            Self::CodeGeneration => "code_generation",
            Self::ErrorFixing => "error_fixing",
            Self::GitOperation => "git_operation",
            Self::GeneralQuestion => "general_question",
        }
    }

    /// First category name that appears in the classifier's reply.
    pub fn from_reply(reply: &str) -> Self {
        let reply = reply.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| reply.contains(kind.as_str()))
            .unwrap_or(Self::GeneralQuestion)
    }
}

/// Producer side of the queue: answers short requests inline and turns
/// long-running ones into background tasks.
pub struct DevAgent {
    completion: Arc<dyn Completion>,
    queue: TaskQueue,
    reporter: Arc<dyn StatusReporter>,
    policy: AdmissionPolicy,
}

impl DevAgent {
    pub fn new(
        completion: Arc<dyn Completion>,
        queue: TaskQueue,
        reporter: Arc<dyn StatusReporter>,
        policy: AdmissionPolicy,
    ) -> Self {
        Self {
            completion,
            queue,
            reporter,
            policy,
        }
    }

    pub async fn process_message(
        &self,
        user_id: &str,
        message: &str,
        context: Option<Value>,
    ) -> Result<AgentReply, AgentError> {
        let context = context.unwrap_or(Value::Null);
        let kind = self.classify(message).await?;
        tracing::info!(user_id, request_type = kind.as_str(), "processing message");

        match kind {
            RequestKind::CodeAnalysis => self.answer_analysis(message, &context).await,
            RequestKind::CodeGeneration => self.handle_code_generation(message, context).await,
            RequestKind::ErrorFixing => self.answer_error_fixing(message, &context).await,
            RequestKind::GitOperation => self.handle_git_operation(message, context).await,
            RequestKind::GeneralQuestion => self.answer_general(message, &context).await,
        }
    }

    pub async fn classify(&self, message: &str) -> Result<RequestKind, AgentError> {
        let prompt = format!(
            "Classify the following developer request into exactly ONE category:\n\
             1. code_analysis - explain or review existing code or architecture\n\
             2. code_generation - write new code or modify existing code\n\
             3. error_fixing - fix a bug or debug a problem\n\
             4. git_operation - git work (clone, commit, push, pull, branch)\n\
             5. general_question - anything else\n\n\
             Request: \"{message}\"\n\n\
             Answer with the category name only."
        );
        let reply = self.completion.complete(&prompt, CLASSIFY_MAX_TOKENS).await?;
        Ok(RequestKind::from_reply(&reply))
    }

    /// Stores a pending record, reports `(pending, 0)`, then queues its id.
    pub async fn submit_task(&self, kind: TaskKind, description: &str) -> Result<Task, AgentError> {
        let task = Task::new(&kind, description);
        if !self.queue.store().put(&task).await {
            return Err(AgentError::Enqueue(task.id));
        }
        // Pending goes out before the consumer can see the id, so it never
        // lands after an in_progress report.
        self.reporter.report(&task.id, &StatusUpdate::pending()).await;
        if !self.queue.push(&task.id).await {
            return Err(AgentError::Enqueue(task.id));
        }
        tracing::info!(task_id = %task.id, task_type = %task.task_type, "task submitted");
        Ok(task)
    }

    async fn answer_analysis(&self, message: &str, context: &Value) -> Result<AgentReply, AgentError> {
        let prompt = format!(
            "Analyze the code below and answer the request.\n\nRequest: {message}\n\n{}",
            format_file_context(context_files(context))
        );
        let answer = self.completion.complete(&prompt, ANSWER_MAX_TOKENS).await?;
        let mut meta = ReplyMeta::of(RequestKind::CodeAnalysis.as_str());
        meta.analyzed_files = Some(context_files(context).to_vec());
        Ok(AgentReply {
            message: answer,
            meta,
            task: None,
        })
    }

    async fn answer_error_fixing(&self, message: &str, context: &Value) -> Result<AgentReply, AgentError> {
        let error = context.get("error").and_then(Value::as_str).unwrap_or_default();
        let prompt = format!(
            "Find and fix the problem described below.\n\nRequest: {message}\n\nError:\n{error}\n\n{}",
            format_file_context(context_files(context))
        );
        let answer = self.completion.complete(&prompt, ANSWER_MAX_TOKENS).await?;
        let mut meta = ReplyMeta::of(RequestKind::ErrorFixing.as_str());
        meta.analyzed_files = Some(context_files(context).to_vec());
        Ok(AgentReply {
            message: answer,
            meta,
            task: None,
        })
    }

    async fn answer_general(&self, message: &str, context: &Value) -> Result<AgentReply, AgentError> {
        let project = match context.get("project") {
            Some(project) => format!("Project context: {project}\n\n"),
            None => String::new(),
        };
        let prompt = format!(
            "{project}The user asks: {message}\n\n\
             Give a useful answer focused on software development, taking the project context into account."
        );
        let answer = self.completion.complete(&prompt, ANSWER_MAX_TOKENS).await?;
        Ok(AgentReply {
            message: answer,
            meta: ReplyMeta::of(RequestKind::GeneralQuestion.as_str()),
            task: None,
        })
    }

    async fn handle_code_generation(&self, message: &str, context: Value) -> Result<AgentReply, AgentError> {
        let files = context_files(&context);
        let prompt = format!(
            "Write the code for the request below. Put every file in its own fenced code block \
             tagged with its language.\n\nRequest: {message}\n\n{}",
            format_file_context(files)
        );
        let preliminary = self.completion.complete(&prompt, PRELIMINARY_MAX_TOKENS).await?;
        let meta = ReplyMeta::of(RequestKind::CodeGeneration.as_str());

        if !self.policy.should_enqueue(message, files.len()) {
            return Ok(AgentReply {
                message: preliminary,
                meta,
                task: None,
            });
        }

        let kind = TaskKind::CodeGeneration(PromptParams { prompt, context });
        let task = self
            .submit_task(kind, &describe("Code generation for request", message))
            .await?;
        Ok(AgentReply {
            message: format!("I have started generating code for your request. Preliminary result:\n\n{preliminary}"),
            meta,
            task: Some(TaskHandle::from(&task)),
        })
    }

    async fn handle_git_operation(&self, message: &str, context: Value) -> Result<AgentReply, AgentError> {
        let prompt = format!(
            "The user asks for a git operation: \"{message}\"\n\n\
             Work out the operation type (clone, commit, push, pull, branch), the parameters it needs \
             (repo_url, repo_path, branch, branch_name, message, files) and the steps to run.\n\
             Reply with JSON only:\n\
             {{\"operation_type\": \"...\", \"parameters\": {{}}, \"steps\": [\"...\"]}}"
        );
        let reply = self.completion.complete(&prompt, PRELIMINARY_MAX_TOKENS).await?;

        let operation_plan = match extract_json(&reply) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::error!(error = %err, "could not read git operation plan");
                let mut meta = ReplyMeta::of(RequestKind::GitOperation.as_str());
                meta.error = Some(err);
                return Ok(AgentReply {
                    message: "I could not work out the git operation you asked for. \
                              Please say more precisely what should happen to the repository."
                        .to_string(),
                    meta,
                    task: None,
                });
            }
        };

        let operation_type = operation_plan.operation_type.clone();
        let kind = TaskKind::GitOperation(GitParams {
            operation_plan,
            context,
        });
        let task = self.submit_task(kind, &describe("Git operation", message)).await?;
        let mut meta = ReplyMeta::of(RequestKind::GitOperation.as_str());
        meta.operation_type = Some(operation_type.clone());
        Ok(AgentReply {
            message: format!("Started git operation: {operation_type}. You will be notified when the task finishes."),
            meta,
            task: Some(TaskHandle::from(&task)),
        })
    }
}

fn context_files(context: &Value) -> &[Value] {
    context
        .get("files")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn format_file_context(files: &[Value]) -> String {
    files
        .iter()
        .map(|file| {
            let path = file.get("path").and_then(Value::as_str).unwrap_or("unknown file");
            match file.get("content").and_then(Value::as_str) {
                Some(content) => format!("### File: {path}\n```\n{content}\n```"),
                None => format!("### File: {path}\n(no content provided)"),
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn describe(prefix: &str, message: &str) -> String {
    let head: String = message.chars().take(DESCRIPTION_CHARS).collect();
    format!("{prefix}: {head}...")
}

/// Parses the span from the first `{` to the last `}` as an operation plan.
fn extract_json(text: &str) -> Result<OperationPlan, String> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err("no JSON object in reply".to_string());
    };
    if end < start {
        return Err("no JSON object in reply".to_string());
    }
    serde_json::from_str(&text[start..=end]).map_err(|err| format!("could not parse JSON in reply: {err}"))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::llm::ProviderError;
    use crate::task::{MemoryBackend, NoopReporter, TaskStatus, TaskStore, DEFAULT_QUEUE_KEY};

    /// Hands out canned replies in order.
    struct Scripted(Mutex<VecDeque<String>>);

    impl Scripted {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self(Mutex::new(replies.iter().map(|r| r.to_string()).collect())))
        }
    }

    #[async_trait]
    impl Completion for Scripted {
        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, ProviderError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ProviderError::new("exhausted", "no scripted reply left", false))
        }
    }

    fn agent(replies: &[&str]) -> (DevAgent, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let store = TaskStore::new(backend.clone(), "test:tasks");
        let queue = TaskQueue::new(store, DEFAULT_QUEUE_KEY);
        let agent = DevAgent::new(
            Scripted::new(replies),
            queue,
            Arc::new(NoopReporter),
            AdmissionPolicy::default(),
        );
        (agent, backend)
    }

    #[test]
    fn classifier_reply_is_matched_loosely() {
        assert_eq!(RequestKind::from_reply("  Code_Generation\n"), RequestKind::CodeGeneration);
        assert_eq!(RequestKind::from_reply("category: git_operation"), RequestKind::GitOperation);
        assert_eq!(RequestKind::from_reply("no idea"), RequestKind::GeneralQuestion);
    }

    #[test]
    fn json_plan_is_cut_from_surrounding_text() {
        let plan = extract_json("Sure!\n{\"operation_type\": \"push\", \"parameters\": {\"repo_path\": \"r1\"}}\nDone").unwrap();
        assert_eq!(plan.operation_type, "push");
        assert_eq!(plan.parameters, json!({"repo_path": "r1"}));
        assert!(plan.steps.is_empty());
        assert!(extract_json("nothing here").is_err());
        assert!(extract_json("{not json}").is_err());
    }

    #[test]
    fn description_is_truncated() {
        let long = "x".repeat(80);
        assert_eq!(describe("Git operation", &long), format!("Git operation: {}...", "x".repeat(50)));
    }

    #[tokio::test]
    async fn general_questions_are_answered_inline() {
        let (agent, backend) = agent(&["general_question", "Use cargo."]);
        let reply = agent.process_message("u1", "How do I build?", None).await.unwrap();
        assert_eq!(reply.message, "Use cargo.");
        assert_eq!(reply.meta.request_type, "general_question");
        assert!(reply.task.is_none());
        assert_eq!(backend.list_len(DEFAULT_QUEUE_KEY), 0);
    }

    #[tokio::test]
    async fn short_code_generation_stays_inline() {
        let (agent, backend) = agent(&["code_generation", "fn add() {}"]);
        let reply = agent.process_message("u1", "write an add function", None).await.unwrap();
        assert_eq!(reply.message, "fn add() {}");
        assert!(reply.task.is_none());
        assert_eq!(backend.list_len(DEFAULT_QUEUE_KEY), 0);
    }

    #[tokio::test]
    async fn large_code_generation_is_queued() {
        let (agent, backend) = agent(&["code_generation", "draft"]);
        let context = json!({"files": [{"path": "a.rs"}, {"path": "b.rs"}, {"path": "c.rs"}]});
        let reply = agent
            .process_message("u1", "refactor these", Some(context))
            .await
            .unwrap();

        let handle = reply.task.expect("task handle");
        assert_eq!(handle.task_type, "code_generation");
        assert_eq!(handle.status, TaskStatus::Pending);
        assert_eq!(handle.progress, 0);
        assert!(reply.message.ends_with("draft"));
        assert_eq!(backend.list_len(DEFAULT_QUEUE_KEY), 1);
    }

    #[tokio::test]
    async fn malformed_git_plan_enqueues_nothing() {
        let (agent, backend) = agent(&["git_operation", "I cannot help with that"]);
        let reply = agent.process_message("u1", "push my stuff", None).await.unwrap();
        assert!(reply.task.is_none());
        assert!(reply.meta.error.is_some());
        assert_eq!(backend.list_len(DEFAULT_QUEUE_KEY), 0);
    }

    #[tokio::test]
    async fn git_plan_becomes_a_task() {
        let plan = r#"{"operation_type": "push", "parameters": {"repo_path": "r1", "branch": "dev"}, "steps": ["push"]}"#;
        let (agent, backend) = agent(&["git_operation", plan]);
        let reply = agent.process_message("u1", "push r1 to dev", None).await.unwrap();
        assert_eq!(reply.meta.operation_type.as_deref(), Some("push"));
        let handle = reply.task.expect("task handle");
        assert_eq!(handle.task_type, "git_operation");
        assert_eq!(handle.description, "Git operation: push r1 to dev...");
        assert_eq!(backend.list_len(DEFAULT_QUEUE_KEY), 1);
    }

    /// Records how many ids were queued at the moment each report arrives.
    struct QueueWatcher {
        backend: Arc<MemoryBackend>,
        seen: Mutex<Vec<(TaskStatus, usize)>>,
    }

    #[async_trait]
    impl StatusReporter for QueueWatcher {
        async fn report(&self, _task_id: &str, update: &StatusUpdate) {
            let queued = self.backend.list_len(DEFAULT_QUEUE_KEY);
            self.seen.lock().unwrap().push((update.status, queued));
        }
    }

    #[tokio::test]
    async fn pending_is_reported_before_the_id_is_queued() {
        let backend = Arc::new(MemoryBackend::new());
        let watcher = Arc::new(QueueWatcher {
            backend: backend.clone(),
            seen: Mutex::new(Vec::new()),
        });
        let queue = TaskQueue::new(TaskStore::new(backend.clone(), "test:tasks"), DEFAULT_QUEUE_KEY);
        let agent = DevAgent::new(Scripted::new(&[]), queue, watcher.clone(), AdmissionPolicy::default());

        let kind = TaskKind::CodeGeneration(PromptParams {
            prompt: "refactor".to_string(),
            context: json!({}),
        });
        let task = agent.submit_task(kind, "Code generation").await.unwrap();

        assert_eq!(*watcher.seen.lock().unwrap(), vec![(TaskStatus::Pending, 0)]);
        assert_eq!(backend.list_len(DEFAULT_QUEUE_KEY), 1);
        assert!(agent.queue.store().get(&task.id).await.is_some());
    }

    #[tokio::test]
    async fn provider_failure_surfaces_as_error() {
        let (agent, _) = agent(&[]);
        let err = agent.process_message("u1", "hello", None).await.unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));
    }
}
