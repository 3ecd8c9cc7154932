//! Integration tests for the Todoist task source
//!
//! Runs the client against a mock REST v2 API:
//! - due/overdue selection in source order
//! - project names and comments attached to the batch
//! - auth and server failures surface as errors

use chrono::NaiveDate;
use serde_json::json;
use std::time::Duration;
use taskloop::retry::RetryPolicy;
use taskloop::todoist::{TaskSourceError, TodoistClient, TodoistConfig};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(base_url: &str, task_limit: Option<usize>) -> TodoistClient {
    TodoistClient::new(
        TodoistConfig {
            api_token: "todoist-token".to_string(),
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(5),
            task_limit,
        },
        RetryPolicy::no_retry(Duration::from_secs(5)),
    )
    .unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
}

async fn mount_projects(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/projects"))
        .and(header("Authorization", "Bearer todoist-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "p1", "name": "Home" },
            { "id": "p2", "name": "Growth" }
        ])))
        .mount(server)
        .await;
}

async fn mount_tasks(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "T1", "content": "Buy milk", "project_id": "p1",
                "priority": 1, "labels": [], "comment_count": 0,
                "due": { "date": "2024-05-10", "string": "today", "is_recurring": false }
            },
            {
                "id": "T9", "content": "Plan vacation", "project_id": "p1",
                "due": { "date": "2024-07-01" }
            },
            {
                "id": "T2", "content": "Learn LangGraph", "project_id": "p2",
                "description": "agents", "priority": 3, "labels": ["study"],
                "comment_count": 1,
                "due": { "date": "2024-05-02" }
            },
            { "id": "T7", "content": "Someday maybe", "project_id": "p2" }
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_selects_due_and_overdue_tasks_in_order() {
    let server = MockServer::start().await;
    mount_projects(&server).await;
    mount_tasks(&server).await;
    Mock::given(method("GET"))
        .and(path("/comments"))
        .and(query_param("task_id", "T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "c1", "posted_at": "2024-05-01T09:00:00Z", "content": "Start with the tutorial" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let batch = client(&server.uri(), None)
        .fetch_tasks_due_by(today())
        .await
        .unwrap();

    let ids: Vec<_> = batch.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["T1", "T2"]);
    assert_eq!(batch.project_name(&batch.tasks[0]), "Home");
    assert_eq!(batch.project_name(&batch.tasks[1]), "Growth");

    let learn = &batch.tasks[1];
    assert_eq!(learn.labels, vec!["study".to_string()]);
    assert_eq!(learn.priority, 3);
    assert_eq!(learn.comments.len(), 1);
    assert_eq!(learn.comments[0].content, "Start with the tutorial");
    assert!(batch.tasks[0].comments.is_empty());
}

#[tokio::test]
async fn test_fetch_applies_task_limit_after_filtering() {
    let server = MockServer::start().await;
    mount_projects(&server).await;
    mount_tasks(&server).await;

    let batch = client(&server.uri(), Some(1))
        .fetch_tasks_due_by(today())
        .await
        .unwrap();

    assert_eq!(batch.tasks.len(), 1);
    assert_eq!(batch.tasks[0].id, "T1");
}

#[tokio::test]
async fn test_rejected_token_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let result = client(&server.uri(), None).fetch_tasks_due_by(today()).await;
    assert!(matches!(result, Err(TaskSourceError::Unauthorized(_))));
}

#[tokio::test]
async fn test_comment_fetch_failure_fails_the_batch() {
    let server = MockServer::start().await;
    mount_projects(&server).await;
    mount_tasks(&server).await;
    Mock::given(method("GET"))
        .and(path("/comments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = client(&server.uri(), None).fetch_tasks_due_by(today()).await;
    assert!(matches!(
        result,
        Err(TaskSourceError::Api { status: 500, .. })
    ));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_projects(&server).await;
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let retrying = TodoistClient::new(
        TodoistConfig {
            api_token: "todoist-token".to_string(),
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            task_limit: None,
        },
        RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        },
    )
    .unwrap();

    let batch = retrying.fetch_tasks_due_by(today()).await.unwrap();
    assert!(batch.tasks.is_empty());
    assert_eq!(batch.project_names.len(), 2);
}
