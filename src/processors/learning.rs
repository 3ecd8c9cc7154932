//! Learning and abstract task processor
//!
//! Two sequential model calls: the curriculum (or insight document for
//! abstract tasks), then one next step conditioned on it. Both land in the
//! task's learning file. A failed file write is reported, not fatal.

use crate::classifier::TaskType;
use crate::context::ContextLibrary;
use crate::error::TaskLoopError;
use crate::learning_files::{LearningEntry, LearningFileStore};
use crate::llm::LlmClient;
use crate::observability::metrics;
use crate::processors::{Processor, ProcessorInput, ProcessorOutput};
use crate::prompts::{self, CommentPolicy};
use crate::routing::ProcessorKind;
use async_trait::async_trait;
use chrono::Local;
use tracing::{debug, warn};

pub struct LearningProcessor {
    llm: LlmClient,
    contexts: ContextLibrary,
    files: LearningFileStore,
    comments: CommentPolicy,
}

impl LearningProcessor {
    pub fn new(
        llm: LlmClient,
        contexts: ContextLibrary,
        files: LearningFileStore,
        comments: CommentPolicy,
    ) -> Self {
        Self {
            llm,
            contexts,
            files,
            comments,
        }
    }

    fn fail(&self, error: impl std::fmt::Display) -> TaskLoopError {
        TaskLoopError::processor(self.kind().as_str(), error.to_string())
    }
}

#[async_trait]
impl Processor for LearningProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Learning
    }

    async fn process(&self, input: &ProcessorInput<'_>) -> Result<ProcessorOutput, TaskLoopError> {
        let task = input.task;
        let context = self.contexts.load_for_task(task).await;
        let context_block = context.as_ref().map(|doc| doc.format_for_prompt());

        let (purpose, prompt) = match input.task_type {
            TaskType::Abstract => (
                "abstract_insight",
                prompts::abstract_prompt(
                    task,
                    input.project_name,
                    self.comments,
                    context_block.as_deref(),
                ),
            ),
            _ => (
                "learning_curriculum",
                prompts::learning_prompt(
                    task,
                    input.project_name,
                    self.comments,
                    context_block.as_deref(),
                ),
            ),
        };

        let curriculum = self
            .llm
            .prompt(purpose, &prompt)
            .await
            .map_err(|e| self.fail(e))?;

        let next_step_prompt =
            prompts::next_step_prompt(task, &curriculum, self.comments, context_block.as_deref());
        let next_step = self
            .llm
            .prompt("next_step", &next_step_prompt)
            .await
            .map_err(|e| self.fail(e))?;

        let entry = LearningEntry {
            task,
            project_name: input.project_name,
            learning_plan: &curriculum,
            next_step: &next_step,
        };

        let (learning_file, file_error) = match self.files.write(&entry, Local::now()).await {
            Ok((path, action)) => {
                metrics().file_written(true);
                debug!(task_id = %task.id, action = action.as_str(), "Learning file written");
                (Some(path), None)
            }
            Err(e) => {
                metrics().file_written(false);
                warn!(task_id = %task.id, error = %e, "Failed to write learning file");
                (None, Some(e.sanitized_message()))
            }
        };

        Ok(ProcessorOutput {
            result: format!("{}\n\n**Next Step:** {}", curriculum.trim(), next_step.trim()),
            learning_file,
            context_file: context.map(|doc| doc.path),
            file_error,
        })
    }
}
