//! Todoist REST v2 client

use super::models::{Comment, Project, Task};
use super::{TaskBatch, TaskSource, TaskSourceError};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

/// Todoist client configuration
#[derive(Debug, Clone)]
pub struct TodoistConfig {
    pub api_token: String,
    pub base_url: String,
    pub timeout: Duration,
    pub task_limit: Option<usize>,
}

impl Default for TodoistConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_url: "https://api.todoist.com/rest/v2".to_string(),
            timeout: Duration::from_secs(30),
            task_limit: None,
        }
    }
}

/// Todoist REST client implementing [`TaskSource`]
pub struct TodoistClient {
    config: TodoistConfig,
    client: Client,
    retry: RetryPolicy,
}

impl TodoistClient {
    pub fn new(config: TodoistConfig, retry: RetryPolicy) -> Result<Self, TaskSourceError> {
        if config.api_token.trim().is_empty() {
            return Err(TaskSourceError::NotConfigured(
                "Todoist API token is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TaskSourceError::Network(e.to_string()))?;

        Ok(Self {
            config,
            client,
            retry,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, TaskSourceError> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let url = url.as_str();
        let operation = format!("todoist GET /{path}");

        self.retry
            .run(&operation, || async move {
                let response = self
                    .client
                    .get(url)
                    .bearer_auth(&self.config.api_token)
                    .query(query)
                    .send()
                    .await
                    .map_err(|e| {
                        if e.is_timeout() {
                            TaskSourceError::Timeout(e.to_string())
                        } else {
                            TaskSourceError::Network(e.to_string())
                        }
                    })?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(Self::error_for_status(status, body));
                }

                response
                    .json::<T>()
                    .await
                    .map_err(|e| TaskSourceError::Decode(e.to_string()))
            })
            .await
    }

    fn error_for_status(status: StatusCode, body: String) -> TaskSourceError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TaskSourceError::Unauthorized(
                format!("Todoist rejected the API token ({status})"),
            ),
            _ => TaskSourceError::Api {
                status: status.as_u16(),
                message: body,
            },
        }
    }

    pub async fn fetch_projects(&self) -> Result<Vec<Project>, TaskSourceError> {
        self.get_json("projects", &[]).await
    }

    pub async fn fetch_comments(&self, task_id: &str) -> Result<Vec<Comment>, TaskSourceError> {
        self.get_json("comments", &[("task_id", task_id)]).await
    }

    /// Tasks due on or before `today`, with comments and the configured limit applied
    pub async fn fetch_tasks_due_by(&self, today: NaiveDate) -> Result<TaskBatch, TaskSourceError> {
        let projects = self.fetch_projects().await?;
        let all_tasks: Vec<Task> = self.get_json("tasks", &[]).await?;
        let fetched = all_tasks.len();

        let mut tasks = select_due_tasks(all_tasks, today, self.config.task_limit);

        for task in tasks.iter_mut().filter(|t| t.comment_count > 0) {
            task.comments = self.fetch_comments(&task.id).await?;
            debug!(task_id = %task.id, comments = task.comments.len(), "Fetched comments");
        }

        info!(
            fetched,
            selected = tasks.len(),
            projects = projects.len(),
            %today,
            "Fetched Todoist tasks"
        );

        Ok(TaskBatch {
            tasks,
            project_names: projects.into_iter().map(|p| (p.id, p.name)).collect(),
        })
    }
}

/// Keep tasks due by `today` in source order, then apply the limit (pure function)
pub fn select_due_tasks(tasks: Vec<Task>, today: NaiveDate, limit: Option<usize>) -> Vec<Task> {
    let due = tasks.into_iter().filter(|task| task.is_due_by(today));
    match limit {
        Some(limit) => due.take(limit).collect(),
        None => due.collect(),
    }
}

#[async_trait]
impl TaskSource for TodoistClient {
    async fn fetch_tasks(&self) -> Result<TaskBatch, TaskSourceError> {
        self.fetch_tasks_due_by(Local::now().date_naive()).await
    }
}
