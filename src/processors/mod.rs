//! Task processors
//!
//! Each processor turns one task into a result string, with at most one file
//! written along the way. The task loop only sees the [`Processor`] trait and
//! looks implementations up by [`ProcessorKind`].

pub mod learning;
pub mod next_action;
pub mod planning;
pub mod research;

pub use learning::LearningProcessor;
pub use next_action::NextActionProcessor;
pub use planning::PlanningProcessor;
pub use research::ResearchProcessor;

use crate::classifier::TaskType;
use crate::error::TaskLoopError;
use crate::routing::ProcessorKind;
use crate::todoist::Task;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// What a processor gets for one task
#[derive(Debug, Clone, Copy)]
pub struct ProcessorInput<'a> {
    pub task: &'a Task,
    pub task_type: TaskType,
    pub project_name: &'a str,
}

/// What a processor produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessorOutput {
    pub result: String,
    /// Per-task markdown file, when one was written
    pub learning_file: Option<PathBuf>,
    /// Context document used for the prompt
    pub context_file: Option<PathBuf>,
    /// File write failure; the result is still valid
    pub file_error: Option<String>,
}

impl ProcessorOutput {
    pub fn text(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait Processor: Send + Sync {
    fn kind(&self) -> ProcessorKind;

    /// # Errors
    ///
    /// Returns error if the language model could not produce a result.
    async fn process(&self, input: &ProcessorInput<'_>) -> Result<ProcessorOutput, TaskLoopError>;
}

/// Processor implementations keyed by kind
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<ProcessorKind, Arc<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the processor for its kind
    pub fn register(&mut self, processor: Arc<dyn Processor>) {
        self.processors.insert(processor.kind(), processor);
    }

    pub fn with(mut self, processor: Arc<dyn Processor>) -> Self {
        self.register(processor);
        self
    }

    pub fn get(&self, kind: ProcessorKind) -> Option<Arc<dyn Processor>> {
        self.processors.get(&kind).cloned()
    }

    /// Kinds without an implementation
    pub fn missing(&self) -> Vec<ProcessorKind> {
        ProcessorKind::ALL
            .into_iter()
            .filter(|kind| !self.processors.contains_key(kind))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.processors.keys().map(ProcessorKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("ProcessorRegistry")
            .field("processors", &kinds)
            .finish()
    }
}
