use std::io;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;

use crate::client::HTTPClient;
use crate::models::{AttachedFile, CLIConfig, ChatMessage, ProcessRequest};
use crate::render;

const WAIT_POLL: Duration = Duration::from_secs(1);
const WAIT_LIMIT: Duration = Duration::from_secs(600);

pub struct REPL {
    pub config: CLIConfig,
    pub client: HTTPClient,
    pub history: Vec<ChatMessage>,
    pub attached: Vec<AttachedFile>,
}

impl REPL {
    pub fn new(config: CLIConfig, client: HTTPClient) -> Self {
        Self {
            config,
            client,
            history: Vec::new(),
            attached: Vec::new(),
        }
    }

    pub fn run(&mut self) {
        render::banner(&self.config);
        loop {
            render::prompt();
            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('/') {
                if self.handle_command(&line) {
                    break;
                }
                continue;
            }
            self.send(&line);
        }
    }

    fn handle_command(&mut self, line: &str) -> bool {
        let mut parts = line.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("").trim_start_matches('/');
        let rest = parts.next().unwrap_or("").trim();
        match cmd {
            "exit" | "quit" => return true,
            "help" => render::help(),
            "tasks" => {
                let status = if rest.is_empty() { None } else { Some(rest) };
                match self.client.list_tasks(status) {
                    Ok(tasks) => render::tasks(&tasks),
                    Err(err) => render::error(&err),
                }
            }
            "task" => match self.client.get_task(rest) {
                Ok(task) => render::task(&task, self.config.debug),
                Err(err) => render::error(&err),
            },
            "wait" => self.wait_for(rest),
            "delete" => match self.client.delete_task(rest) {
                Ok(()) => render::info("task deleted"),
                Err(err) => render::error(&err),
            },
            "attach" => match std::fs::read_to_string(rest) {
                Ok(content) => {
                    self.attached.push(AttachedFile {
                        path: rest.to_string(),
                        content,
                    });
                    render::info(&format!("{} file(s) attached", self.attached.len()));
                }
                Err(err) => render::error(&format!("{}: {}", rest, err)),
            },
            "detach" => {
                self.attached.clear();
                render::info("attachments cleared");
            }
            "user" => {
                if rest.is_empty() {
                    render::info(&format!("user: {}", self.config.user_id));
                } else {
                    self.config.user_id = rest.to_string();
                    render::info("user updated");
                }
            }
            "project" => {
                if rest.is_empty() {
                    self.config.project_id = None;
                    render::info("project cleared");
                } else {
                    self.config.project_id = Some(rest.to_string());
                    render::info("project updated");
                }
            }
            "debug" => {
                if rest.is_empty() {
                    self.config.debug = !self.config.debug;
                    render::info(&format!("debug: {}", self.config.debug));
                } else if let Some(flag) = parse_on_off(rest) {
                    self.config.debug = flag;
                    render::info(&format!("debug: {}", self.config.debug));
                } else {
                    render::error("invalid debug flag");
                }
            }
            "history" => render::history(&self.history),
            "reset" => {
                self.history.clear();
                render::info("history cleared");
            }
            "config" => render::config(&self.config, &self.attached),
            "base" => {
                if rest.is_empty() {
                    render::info(&format!("base: {}", self.config.base_url));
                } else {
                    self.config.base_url = rest.to_string();
                    self.client = HTTPClient::new(&self.config.base_url, self.config.token.clone());
                    render::info("base url updated");
                }
            }
            "token" => {
                if !rest.is_empty() {
                    self.config.token = Some(rest.to_string());
                    self.client = HTTPClient::new(&self.config.base_url, self.config.token.clone());
                }
                render::info("token updated");
            }
            _ => render::info("unknown command, type /help"),
        }
        false
    }

    fn send(&mut self, line: &str) {
        self.history.push(ChatMessage {
            role: "user".to_string(),
            content: line.to_string(),
        });

        let context = if self.attached.is_empty() {
            None
        } else {
            Some(json!({ "files": self.attached }))
        };
        let req = ProcessRequest {
            user_id: self.config.user_id.clone(),
            message: line.to_string(),
            project_id: self.config.project_id.clone(),
            context,
        };

        match self.client.process(&req) {
            Ok(reply) => {
                self.history.push(ChatMessage {
                    role: "assistant".to_string(),
                    content: reply.message.clone(),
                });
                render::reply(&reply, self.config.debug);
            }
            Err(err) => render::error(&err),
        }
    }

    fn wait_for(&self, id: &str) {
        let started = Instant::now();
        let mut last_progress = None;
        while started.elapsed() < WAIT_LIMIT {
            let task = match self.client.get_task(id) {
                Ok(task) => task,
                Err(err) => {
                    render::error(&err);
                    return;
                }
            };
            if task.is_terminal() {
                render::task(&task, self.config.debug);
                return;
            }
            if last_progress != Some(task.progress) {
                render::info(&format!("{} {}%", task.status, task.progress));
                last_progress = Some(task.progress);
            }
            thread::sleep(WAIT_POLL);
        }
        render::error("gave up waiting for the task");
    }
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
