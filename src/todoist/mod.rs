//! Task source: today's and overdue Todoist tasks
//!
//! The pipeline depends only on the [`TaskSource`] trait. Any failure here is
//! fatal for the run.

pub mod client;
pub mod models;

pub use client::{TodoistClient, TodoistConfig};
pub use models::{Comment, Due, Project, Task};

use crate::retry::Retryable;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Project name used when a task's project id is unknown
pub const UNKNOWN_PROJECT: &str = "Unknown Project";

/// Tasks for one run plus the project id → name map
#[derive(Debug, Clone, Default)]
pub struct TaskBatch {
    pub tasks: Vec<Task>,
    pub project_names: HashMap<String, String>,
}

impl TaskBatch {
    pub fn project_name(&self, task: &Task) -> &str {
        self.project_names
            .get(&task.project_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_PROJECT)
    }
}

/// Source of the tasks to process
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Tasks due today or overdue, in source order
    async fn fetch_tasks(&self) -> Result<TaskBatch, TaskSourceError>;
}

/// Task source errors
#[derive(Debug, Clone, Error)]
pub enum TaskSourceError {
    #[error("Task source not configured: {0}")]
    NotConfigured(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl Retryable for TaskSourceError {
    fn is_retryable(&self) -> bool {
        match self {
            TaskSourceError::Network(_) | TaskSourceError::Timeout(_) => true,
            TaskSourceError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    fn timed_out(operation: &str, after: Duration) -> Self {
        TaskSourceError::Timeout(format!("{operation} exceeded {}s", after.as_secs_f32()))
    }
}
