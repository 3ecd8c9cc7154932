//! Per-task markdown files for learning and abstract tasks
//!
//! One file per task, named from the sanitized task content. Writing the
//! same task again replaces the whole file; only the original creation date
//! carries over.

use crate::error::TaskLoopError;
use crate::todoist::{Comment, Task};
use chrono::{DateTime, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MAX_NAME_CHARS: usize = 100;
const TIMESTAMP_FORMAT: &str = "%B %d, %Y at %I:%M %p";
const DATE_FORMAT: &str = "%B %d, %Y";

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s-]+").expect("valid regex"));
static UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").expect("valid regex"));
static CREATED_FOOTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*File created: (?P<created>[^|*]+?) \| Last updated: [^*]*\*")
        .expect("valid regex")
});

/// Safe file stem derived from task content
///
/// `"Learn LangGraph Architecture!"` → `learn_langgraph_architecture`
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(name, "");
    let underscored = SEPARATORS.replace_all(&cleaned, "_").to_lowercase();
    let collapsed = UNDERSCORES.replace_all(&underscored, "_");
    let cut: String = collapsed.chars().take(MAX_NAME_CHARS).collect();
    cut.trim_matches('_').to_string()
}

/// Whether a write made a new file or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Created,
    Updated,
}

impl FileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileAction::Created => "Created",
            FileAction::Updated => "Updated",
        }
    }
}

/// Generated content for one task file
#[derive(Debug, Clone)]
pub struct LearningEntry<'a> {
    pub task: &'a Task,
    pub project_name: &'a str,
    pub learning_plan: &'a str,
    pub next_step: &'a str,
}

/// Directory holding the per-task files
#[derive(Debug, Clone)]
pub struct LearningFileStore {
    dir: PathBuf,
}

impl LearningFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `{dir}/{sanitized content}.md`, or `task_{id}.md` if nothing survives
    pub fn path_for(&self, task: &Task) -> PathBuf {
        let mut stem = sanitize_filename(&task.content);
        if stem.is_empty() {
            stem = format!("task_{}", sanitize_filename(&task.id));
        }
        self.dir.join(format!("{stem}.md"))
    }

    /// Create or overwrite the task's file
    pub async fn write(
        &self,
        entry: &LearningEntry<'_>,
        now: DateTime<Local>,
    ) -> Result<(PathBuf, FileAction), TaskLoopError> {
        let path = self.path_for(entry.task);

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            TaskLoopError::persistence(format!(
                "Failed to create {}: {e}",
                self.dir.display()
            ))
        })?;

        let existing = match tokio::fs::read_to_string(&path).await {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(TaskLoopError::persistence(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        let action = if existing.is_some() {
            FileAction::Updated
        } else {
            FileAction::Created
        };
        let created = existing
            .as_deref()
            .and_then(extract_created_date)
            .unwrap_or_else(|| now.format(DATE_FORMAT).to_string());

        let content = render(entry, &created, now);
        tokio::fs::write(&path, content).await.map_err(|e| {
            TaskLoopError::persistence(format!("Failed to write {}: {e}", path.display()))
        })?;

        debug!(path = %path.display(), action = action.as_str(), "Wrote learning file");
        info!(task_id = %entry.task.id, file = %path.display(), "{} learning task file", action.as_str());

        Ok((path, action))
    }
}

/// The `File created` date from an existing file's footer
pub fn extract_created_date(content: &str) -> Option<String> {
    CREATED_FOOTER
        .captures(content)
        .and_then(|caps| caps.name("created"))
        .map(|m| m.as_str().trim().to_string())
}

fn human_timestamp(raw: &str, format: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(format).to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d") {
        return date.format(DATE_FORMAT).to_string();
    }
    raw.to_string()
}

fn render_comments(comments: &[Comment]) -> String {
    if comments.is_empty() {
        return "## Comments from Todoist\n\nNo comments yet.\n\n".to_string();
    }

    let mut section = String::from("## Comments from Todoist\n\n");
    for (i, comment) in comments.iter().enumerate() {
        let posted = if comment.posted_at.is_empty() {
            "Unknown date".to_string()
        } else {
            human_timestamp(&comment.posted_at, TIMESTAMP_FORMAT)
        };
        section.push_str(&format!(
            "### Comment {} ({})\n{}\n\n",
            i + 1,
            posted,
            comment.content.trim()
        ));
    }
    section
}

fn render(entry: &LearningEntry<'_>, created: &str, now: DateTime<Local>) -> String {
    let task = entry.task;
    let task_created = task
        .created_at
        .as_deref()
        .map(|raw| human_timestamp(raw, DATE_FORMAT))
        .unwrap_or_else(|| "Unknown".to_string());
    let description = if task.description.trim().is_empty() {
        "No description provided"
    } else {
        task.description.as_str()
    };
    let timestamp = now.format(TIMESTAMP_FORMAT);

    format!(
        "# {content}\n\n\
         **Project:** {project}\n\
         **Created:** {task_created}\n\
         **Due:** {due}\n\
         **Labels:** {labels}\n\n\
         ---\n\n\
         ## Task Description\n\n\
         {description}\n\n\
         ---\n\n\
         {comments}\
         ---\n\n\
         ## Learning Path (Generated: {timestamp})\n\n\
         {plan}\n\n\
         ### Next Immediate Step\n\n\
         {next_step}\n\n\
         ---\n\n\
         *File created: {created} | Last updated: {timestamp}*\n",
        content = task.content,
        project = entry.project_name,
        due = task.due_display(),
        labels = task.labels_display(),
        comments = render_comments(&task.comments),
        plan = entry.learning_plan.trim(),
        next_step = entry.next_step.trim(),
    )
}
