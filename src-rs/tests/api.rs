//! The HTTP surface end to end, over a real socket.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{memory_queue, spawn_api, FakeCompletion};
use dev_agent_rs::task::{PromptParams, StatusUpdate, Task, TaskKind, TaskStatus, TaskStore};

fn analysis_task(prompt: &str) -> Task {
    Task::new(
        &TaskKind::CodeAnalysis(PromptParams {
            prompt: prompt.to_string(),
            context: json!({}),
        }),
        prompt,
    )
}

async fn api(reply: &str) -> (String, TaskStore, Arc<FakeCompletion>) {
    let (queue, _backend) = memory_queue();
    let store = queue.store().clone();
    let completion = FakeCompletion::failing_on(reply, "explode");
    let addr = spawn_api(queue, completion.clone());
    (format!("http://{addr}"), store, completion)
}

#[tokio::test]
async fn health_reports_ok() {
    let (base, _, _) = api("general_question").await;
    let body: Value = reqwest::get(format!("{base}/health")).await.unwrap().json().await.unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn unknown_task_is_404_with_detail() {
    let (base, _, _) = api("general_question").await;
    let resp = reqwest::get(format!("{base}/tasks/missing")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert!(body.get("detail").is_some());
}

#[tokio::test]
async fn stored_task_is_served_and_listed() {
    let (base, store, _) = api("general_question").await;
    let pending = analysis_task("pending one");
    let running = analysis_task("running one");
    store.put(&pending).await;
    store.put(&running).await;
    store.apply_status(&running.id, &StatusUpdate::in_progress(10)).await;

    let task: Task = reqwest::get(format!("{base}/tasks/{}", pending.id))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(task.id, pending.id);
    assert_eq!(task.task_type, "code_analysis");

    let all: Vec<Task> = reqwest::get(format!("{base}/tasks")).await.unwrap().json().await.unwrap();
    assert_eq!(all.len(), 2);

    let in_progress: Vec<Task> = reqwest::get(format!("{base}/tasks?status=in_progress"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(in_progress.len(), 1);
    assert_eq!(in_progress[0].id, running.id);
}

#[tokio::test]
async fn patch_merges_status_and_guards_finished_tasks() {
    let (base, store, _) = api("general_question").await;
    let task = analysis_task("patch me");
    store.put(&task).await;
    let client = reqwest::Client::new();
    let url = format!("{base}/tasks/{}/status", task.id);

    let resp = client
        .patch(&url)
        .json(&json!({"status": "completed", "progress": 100, "result": {"analysis": "ok"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({"status": "updated"}));
    assert_eq!(store.get(&task.id).await.unwrap().status, TaskStatus::Completed);

    let resp = client
        .patch(&url)
        .json(&json!({"status": "in_progress", "progress": 50}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(store.get(&task.id).await.unwrap().status, TaskStatus::Completed);

    let resp = client
        .patch(format!("{base}/tasks/missing/status"))
        .json(&json!({"status": "in_progress", "progress": 10}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn task_listing_is_paged_newest_first() {
    let (base, store, _) = api("general_question").await;
    let start = chrono::Utc::now();
    let mut ids = Vec::new();
    for n in 0..3 {
        let mut task = analysis_task(&format!("task {n}"));
        task.created_at = Some(start + chrono::Duration::seconds(n));
        store.put(&task).await;
        ids.push(task.id);
    }
    let page = |query: &str| {
        let url = format!("{base}/tasks{query}");
        async move {
            let tasks: Vec<Task> = reqwest::get(url).await.unwrap().json().await.unwrap();
            tasks.into_iter().map(|task| task.id).collect::<Vec<_>>()
        }
    };

    assert_eq!(page("").await, vec![ids[2].clone(), ids[1].clone(), ids[0].clone()]);
    assert_eq!(page("?limit=2").await, vec![ids[2].clone(), ids[1].clone()]);
    assert_eq!(page("?limit=2&offset=2").await, vec![ids[0].clone()]);
    assert!(page("?offset=5").await.is_empty());
}

#[tokio::test]
async fn listing_defaults_to_twenty_tasks() {
    let (base, store, _) = api("general_question").await;
    for n in 0..25 {
        store.put(&analysis_task(&format!("bulk {n}"))).await;
    }
    let tasks: Vec<Task> = reqwest::get(format!("{base}/tasks")).await.unwrap().json().await.unwrap();
    assert_eq!(tasks.len(), 20);
}

#[tokio::test]
async fn patch_caps_progress_and_refuses_pending_rewind() {
    let (base, store, _) = api("general_question").await;
    let task = analysis_task("overshoot");
    store.put(&task).await;
    let client = reqwest::Client::new();
    let url = format!("{base}/tasks/{}/status", task.id);

    let resp = client
        .patch(&url)
        .json(&json!({"status": "in_progress", "progress": 250}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(store.get(&task.id).await.unwrap().progress, 100);

    let resp = client
        .patch(&url)
        .json(&json!({"status": "pending", "progress": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(store.get(&task.id).await.unwrap().status, TaskStatus::InProgress);
}

#[tokio::test]
async fn delete_removes_the_record() {
    let (base, store, _) = api("general_question").await;
    let task = analysis_task("delete me");
    store.put(&task).await;
    let client = reqwest::Client::new();
    let url = format!("{base}/tasks/{}", task.id);

    assert_eq!(client.delete(&url).send().await.unwrap().status(), StatusCode::NO_CONTENT);
    assert!(store.get(&task.id).await.is_none());
    assert_eq!(client.delete(&url).send().await.unwrap().status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn process_answers_inline() {
    let (base, _, completion) = api("general_question").await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/process"))
        .json(&json!({"user_id": "u1", "message": "what is a monad"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["meta"]["type"], "general_question");
    assert!(body.get("task").is_none());
    assert_eq!(completion.calls(), 2);
}

#[tokio::test]
async fn process_failure_is_500_with_detail() {
    let (base, _, _) = api("general_question").await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/process"))
        .json(&json!({"user_id": "u1", "message": "explode please"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("upstream exploded"));
}
