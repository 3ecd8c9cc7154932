//! Run state
//!
//! One owned value carries everything a run learns about its tasks. It is
//! threaded by `&mut` through classification, the task loop and the report;
//! there is no ambient state.

use crate::classifier::{Classification, ClassificationSource, TaskType};
use crate::error::TaskLoopError;
use crate::routing::{DecisionSource, ProcessorKind, RoutingDecision};
use crate::todoist::{Task, TaskBatch, UNKNOWN_PROJECT};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Why a task left the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    Router,
    IterationLimit,
    ProcessorFailed,
}

/// Per-task state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InProgress(ProcessorKind),
    Complete(CompletionReason),
}

impl TaskStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, TaskStatus::Complete(_))
    }
}

/// One routing decision, kept for the log and tests
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRecord {
    pub iteration: usize,
    pub decision: RoutingDecision,
    pub source: DecisionSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    ClassificationDefaulted,
    IterationLimit,
    ProcessorFailed,
    FileWriteFailed,
    MissingResult,
}

impl AnomalyKind {
    pub fn label(&self) -> &'static str {
        match self {
            AnomalyKind::ClassificationDefaulted => "Classification defaulted",
            AnomalyKind::IterationLimit => "Iteration limit reached",
            AnomalyKind::ProcessorFailed => "Processor failed",
            AnomalyKind::FileWriteFailed => "File write failed",
            AnomalyKind::MissingResult => "Missing result",
        }
    }
}

/// Something worth telling the reader of the report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub task_id: Option<String>,
    pub kind: AnomalyKind,
    pub message: String,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.task_id {
            Some(id) => write!(f, "{} (task {}): {}", self.kind.label(), id, self.message),
            None => write!(f, "{}: {}", self.kind.label(), self.message),
        }
    }
}

/// Everything one run knows, keyed by task id
#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: Uuid,
    pub started_at: DateTime<Local>,
    tasks: Vec<Task>,
    project_names: HashMap<String, String>,
    classifications: HashMap<String, Classification>,
    processing_records: HashMap<String, Vec<ProcessorKind>>,
    results: HashMap<String, String>,
    statuses: HashMap<String, TaskStatus>,
    decisions: HashMap<String, Vec<DecisionRecord>>,
    learning_files: HashMap<String, PathBuf>,
    context_files: HashMap<String, PathBuf>,
    anomalies: Vec<Anomaly>,
}

impl RunState {
    pub fn new(batch: TaskBatch) -> Self {
        let statuses = batch
            .tasks
            .iter()
            .map(|t| (t.id.clone(), TaskStatus::Pending))
            .collect();

        Self {
            run_id: Uuid::new_v4(),
            started_at: Local::now(),
            tasks: batch.tasks,
            project_names: batch.project_names,
            classifications: HashMap::new(),
            processing_records: HashMap::new(),
            results: HashMap::new(),
            statuses,
            decisions: HashMap::new(),
            learning_files: HashMap::new(),
            context_files: HashMap::new(),
            anomalies: Vec::new(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn project_name(&self, task: &Task) -> &str {
        self.project_names
            .get(&task.project_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_PROJECT)
    }

    // Classification

    /// Record a task's type; written once per task
    pub fn set_classification(&mut self, task_id: &str, classification: Classification) {
        if self.classifications.contains_key(task_id) {
            return;
        }

        match &classification.source {
            ClassificationSource::Model => {}
            ClassificationSource::Defaulted { raw_response } => self.add_anomaly(
                Some(task_id),
                AnomalyKind::ClassificationDefaulted,
                format!(
                    "model answered {:?}, used '{}'",
                    raw_response, classification.task_type
                ),
            ),
            ClassificationSource::Failed { error } => self.add_anomaly(
                Some(task_id),
                AnomalyKind::ClassificationDefaulted,
                format!(
                    "classification failed ({}), used '{}'",
                    crate::error::sanitize_error_message(error),
                    classification.task_type
                ),
            ),
        }
        self.classifications
            .insert(task_id.to_string(), classification);
    }

    pub fn classification(&self, task_id: &str) -> Option<&Classification> {
        self.classifications.get(task_id)
    }

    pub fn task_type(&self, task_id: &str) -> Option<TaskType> {
        self.classifications.get(task_id).map(|c| c.task_type)
    }

    /// Every task must be classified before routing starts
    pub fn ensure_classified(&self) -> Result<(), TaskLoopError> {
        let missing: Vec<&str> = self
            .tasks
            .iter()
            .filter(|t| !self.classifications.contains_key(&t.id))
            .map(|t| t.id.as_str())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(TaskLoopError::internal(format!(
                "tasks reached routing without a classification: {}",
                missing.join(", ")
            )))
        }
    }

    // Processing

    pub fn history(&self, task_id: &str) -> &[ProcessorKind] {
        self.processing_records
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Append-only
    pub fn record_processing(&mut self, task_id: &str, processor: ProcessorKind) {
        self.processing_records
            .entry(task_id.to_string())
            .or_default()
            .push(processor);
    }

    /// Latest result replaces any earlier one
    pub fn set_result(&mut self, task_id: &str, result: String) {
        self.results.insert(task_id.to_string(), result);
    }

    pub fn result(&self, task_id: &str) -> Option<&str> {
        self.results.get(task_id).map(String::as_str)
    }

    pub fn status(&self, task_id: &str) -> TaskStatus {
        self.statuses
            .get(task_id)
            .copied()
            .unwrap_or(TaskStatus::Pending)
    }

    pub fn set_status(&mut self, task_id: &str, status: TaskStatus) {
        self.statuses.insert(task_id.to_string(), status);
    }

    pub fn record_decision(&mut self, task_id: &str, record: DecisionRecord) {
        self.decisions
            .entry(task_id.to_string())
            .or_default()
            .push(record);
    }

    pub fn decisions(&self, task_id: &str) -> &[DecisionRecord] {
        self.decisions
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // Files

    pub fn set_learning_file(&mut self, task_id: &str, path: PathBuf) {
        self.learning_files.insert(task_id.to_string(), path);
    }

    pub fn learning_file(&self, task_id: &str) -> Option<&Path> {
        self.learning_files.get(task_id).map(PathBuf::as_path)
    }

    /// Learning files in task order
    pub fn learning_files(&self) -> Vec<PathBuf> {
        self.tasks
            .iter()
            .filter_map(|t| self.learning_files.get(&t.id).cloned())
            .collect()
    }

    pub fn set_context_file(&mut self, task_id: &str, path: PathBuf) {
        self.context_files.insert(task_id.to_string(), path);
    }

    pub fn context_file(&self, task_id: &str) -> Option<&Path> {
        self.context_files.get(task_id).map(PathBuf::as_path)
    }

    // Anomalies

    pub fn add_anomaly(&mut self, task_id: Option<&str>, kind: AnomalyKind, message: impl Into<String>) {
        self.anomalies.push(Anomaly {
            task_id: task_id.map(str::to_string),
            kind,
            message: message.into(),
        });
    }

    pub fn anomalies(&self) -> &[Anomaly] {
        &self.anomalies
    }

    pub fn anomalies_of(&self, kind: AnomalyKind) -> usize {
        self.anomalies.iter().filter(|a| a.kind == kind).count()
    }

    /// Tasks without a result, in task order
    pub fn missing_results(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| !self.results.contains_key(&t.id))
            .collect()
    }

    pub fn completed_count(&self, reason: CompletionReason) -> usize {
        self.tasks
            .iter()
            .filter(|t| self.status(&t.id) == TaskStatus::Complete(reason))
            .count()
    }
}
