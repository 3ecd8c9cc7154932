//! Final markdown report
//!
//! One entry per task in input order. A task without a result still gets an
//! entry, with [`MISSING_RESULT_PLACEHOLDER`] in place of the result.

use crate::error::TaskLoopError;
use crate::pipeline::state::{AnomalyKind, RunState};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

/// Shown instead of a result that was never recorded
pub const MISSING_RESULT_PLACEHOLDER: &str = "_No result was recorded for this task._";

/// Report file name for a completion time
pub fn report_file_name(completed_at: DateTime<Local>) -> String {
    format!("task_report_{}.md", completed_at.format("%Y%m%d_%H%M%S"))
}

/// Render the report (pure function)
pub fn render(state: &RunState, generated_at: DateTime<Local>) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "# Task Processing Report - {}\n",
        generated_at.format("%Y-%m-%d")
    );
    let _ = writeln!(out, "**Run ID:** {}", state.run_id);
    let _ = writeln!(
        out,
        "**Generated:** {}",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out, "**Total Tasks:** {}\n", state.len());
    out.push_str("---\n\n");

    for (i, task) in state.tasks().iter().enumerate() {
        let task_type = state
            .task_type(&task.id)
            .map(|t| t.as_str())
            .unwrap_or("unclassified");

        let _ = writeln!(out, "## {}. {}\n", i + 1, task.content);
        let _ = writeln!(out, "**Type:** {task_type}");
        let _ = writeln!(out, "**Project:** {}", state.project_name(task));
        if !task.description.trim().is_empty() {
            let _ = writeln!(out, "**Description:** {}", task.description.trim());
        }
        if !task.labels.is_empty() {
            let _ = writeln!(out, "**Labels:** {}", task.labels.join(", "));
        }
        let _ = writeln!(out, "**Due Date:** {}", task.due_display());
        let _ = writeln!(out, "**Priority:** {}", task.priority);
        if let Some(path) = state.learning_file(&task.id) {
            let _ = writeln!(out, "**Learning File:** `{}`", path.display());
        }
        if let Some(path) = state.context_file(&task.id) {
            let _ = writeln!(out, "**Context:** `{}`", path.display());
        }

        out.push_str("\n### Processing Result:\n\n");
        out.push_str(state.result(&task.id).unwrap_or(MISSING_RESULT_PLACEHOLDER).trim());
        out.push_str("\n\n---\n\n");
    }

    let missing = state.missing_results();
    if !state.anomalies().is_empty() || !missing.is_empty() {
        out.push_str("## Run Notes\n\n");
        for anomaly in state.anomalies() {
            let _ = writeln!(out, "- {anomaly}");
        }
        for task in missing {
            let _ = writeln!(
                out,
                "- {} (task {}): placeholder used for \"{}\"",
                AnomalyKind::MissingResult.label(),
                task.id,
                task.content
            );
        }
    }

    out
}

/// Write the report into `dir`, creating it if needed
pub async fn write_report(
    state: &RunState,
    dir: &Path,
    completed_at: DateTime<Local>,
) -> Result<PathBuf, TaskLoopError> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        TaskLoopError::report(format!("Failed to create {}: {e}", dir.display()))
    })?;

    let path = dir.join(report_file_name(completed_at));
    tokio::fs::write(&path, render(state, completed_at))
        .await
        .map_err(|e| TaskLoopError::report(format!("Failed to write {}: {e}", path.display())))?;

    info!(path = %path.display(), tasks = state.len(), "Report written");
    Ok(path)
}
