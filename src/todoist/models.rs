//! Todoist REST v2 records
//!
//! Tasks are read-only for the whole pipeline once fetched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A task as returned by `GET /tasks`, with its comments attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: Vec<String>,
    /// 1 (normal) to 4 (urgent)
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub due: Option<Due>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub comment_count: u32,
    /// Filled in by the client from `GET /comments`
    #[serde(default)]
    pub comments: Vec<Comment>,
}

fn default_priority() -> u8 {
    1
}

/// Due information of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Due {
    /// `YYYY-MM-DD`
    pub date: String,
    #[serde(default)]
    pub string: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
}

/// A comment on a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub posted_at: String,
    pub content: String,
}

/// A project, only used to resolve names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

impl Task {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            description: String::new(),
            labels: Vec::new(),
            priority: default_priority(),
            project_id: String::new(),
            due: None,
            created_at: None,
            comment_count: 0,
            comments: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    pub fn with_due(mut self, date: impl Into<String>) -> Self {
        self.due = Some(Due {
            date: date.into(),
            string: None,
            is_recurring: false,
        });
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_comments(mut self, comments: Vec<Comment>) -> Self {
        self.comment_count = comments.len() as u32;
        self.comments = comments;
        self
    }

    /// Parsed due date, `None` when absent or unparseable
    pub fn due_date(&self) -> Option<NaiveDate> {
        let due = self.due.as_ref()?;
        // Dated tasks with a time carry `YYYY-MM-DDTHH:MM:SS` here
        let date_part = due.date.get(..10).unwrap_or(&due.date);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }

    /// Due today or overdue relative to `today`
    pub fn is_due_by(&self, today: NaiveDate) -> bool {
        self.due_date().is_some_and(|date| date <= today)
    }

    /// Due date as shown in prompts and files
    pub fn due_display(&self) -> String {
        self.due
            .as_ref()
            .map(|due| due.date.clone())
            .unwrap_or_else(|| "No due date".to_string())
    }

    /// Labels as shown in prompts and files
    pub fn labels_display(&self) -> String {
        if self.labels.is_empty() {
            "None".to_string()
        } else {
            self.labels.join(", ")
        }
    }
}

impl Comment {
    pub fn new(posted_at: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            posted_at: posted_at.into(),
            content: content.into(),
        }
    }

    /// `YYYY-MM-DD` prefix of the timestamp
    pub fn date(&self) -> &str {
        self.posted_at.get(..10).unwrap_or(&self.posted_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_deserializes_from_rest_payload() {
        let json = serde_json::json!({
            "id": "2995104339",
            "project_id": "2203306141",
            "content": "Buy Milk",
            "description": "",
            "labels": ["Food"],
            "priority": 1,
            "due": {"date": "2024-09-01", "is_recurring": false, "string": "tomorrow"},
            "comment_count": 2,
            "created_at": "2019-12-11T22:36:50.000000Z",
            "url": "https://todoist.com/showTask?id=2995104339"
        });

        let task: Task = serde_json::from_value(json).unwrap();
        assert_eq!(task.id, "2995104339");
        assert_eq!(task.labels, vec!["Food"]);
        assert_eq!(task.comment_count, 2);
        assert!(task.comments.is_empty());
        assert_eq!(
            task.due_date(),
            NaiveDate::from_ymd_opt(2024, 9, 1)
        );
    }

    #[test]
    fn test_due_filter_keeps_today_and_overdue() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();

        assert!(Task::new("1", "a").with_due("2024-05-10").is_due_by(today));
        assert!(Task::new("2", "b").with_due("2024-05-01").is_due_by(today));
        assert!(Task::new("3", "c")
            .with_due("2024-05-09T18:00:00")
            .is_due_by(today));
        assert!(!Task::new("4", "d").with_due("2024-05-11").is_due_by(today));
        assert!(!Task::new("5", "e").is_due_by(today));
        assert!(!Task::new("6", "f").with_due("soon").is_due_by(today));
    }

    #[test]
    fn test_display_helpers() {
        let task = Task::new("1", "a");
        assert_eq!(task.due_display(), "No due date");
        assert_eq!(task.labels_display(), "None");

        let task = task.with_labels(["home", "errand"]).with_due("2024-05-10");
        assert_eq!(task.due_display(), "2024-05-10");
        assert_eq!(task.labels_display(), "home, errand");
    }

    #[test]
    fn test_comment_date_prefix() {
        let comment = Comment::new("2024-05-03T09:12:00Z", "Booked the venue");
        assert_eq!(comment.date(), "2024-05-03");
        assert_eq!(Comment::new("", "x").date(), "");
    }
}
