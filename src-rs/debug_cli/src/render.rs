use std::io::{self, Write};

use crate::models::{AttachedFile, CLIConfig, ChatMessage, ProcessReply, TaskInfo};

pub fn banner(cfg: &CLIConfig) {
    println!("Dev Agent Debug CLI");
    println!("API: {}", cfg.base_url);
    println!(
        "User: {}  Project: {}",
        cfg.user_id,
        cfg.project_id.as_deref().unwrap_or("-")
    );
    println!("Type /help for commands.");
}

pub fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

pub fn help() {
    println!("Commands:");
    println!("  /help                  Show commands");
    println!("  /exit | /quit          Exit");
    println!("  /tasks [status]        List tasks, optionally by status");
    println!("  /task <id>             Show one task");
    println!("  /wait <id>             Poll a task until it finishes");
    println!("  /delete <id>           Delete a task");
    println!("  /attach <path>         Attach a local file to the context");
    println!("  /detach                Drop attached files");
    println!("  /user <id>             Set user id");
    println!("  /project <id>          Set project id");
    println!("  /debug [on|off]        Toggle debug output");
    println!("  /history               Show chat history");
    println!("  /reset                 Clear chat history");
    println!("  /config                Show current config");
    println!("  /base <url>            Update base URL");
    println!("  /token <token>         Update bearer token");
}

pub fn reply(reply: &ProcessReply, debug: bool) {
    println!("assistant> {}", reply.message);
    if let Some(task) = &reply.task {
        println!("queued task {} ({}): {}", task.id, task.task_type, task.description);
    }
    if debug {
        println!("meta: {}", reply.meta);
    }
}

pub fn task(task: &TaskInfo, debug: bool) {
    println!("[{}] {} {} {}% {}", task.status, task.id, task.task_type, task.progress, task.description);
    if let Some(err) = &task.error {
        println!("  error: {}", err);
    }
    if let Some(result) = &task.result {
        if debug {
            println!("  result: {}", result);
        } else if let Some(text) = result.get("response").or_else(|| result.get("analysis")).and_then(|v| v.as_str()) {
            println!("{}", text);
        } else {
            println!("  result: {}", result);
        }
    }
}

pub fn tasks(tasks: &[TaskInfo]) {
    if tasks.is_empty() {
        println!("no tasks");
        return;
    }
    for task in tasks {
        println!("[{}] {} {}% - {}", task.status, task.id, task.progress, task.description);
    }
}

pub fn config(cfg: &CLIConfig, attached: &[AttachedFile]) {
    println!("config:");
    println!("  base: {}", cfg.base_url);
    println!("  user: {}", cfg.user_id);
    println!("  project: {}", cfg.project_id.as_deref().unwrap_or("-"));
    println!("  debug: {}", cfg.debug);
    for file in attached {
        println!("  attached: {} ({} bytes)", file.path, file.content.len());
    }
}

pub fn history(items: &[ChatMessage]) {
    if items.is_empty() {
        println!("no history");
        return;
    }
    for msg in items {
        println!("{}> {}", msg.role, msg.content);
    }
}

pub fn info(msg: &str) {
    println!("{}", msg);
}

pub fn error(msg: &str) {
    eprintln!("error: {}", msg);
}
