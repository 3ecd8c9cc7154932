//! Per-task routing loop
//!
//! Routes one task until the router declares it complete, a processor fails,
//! or the decision cap is hit. Never fails the run for a task-level problem.

use crate::error::TaskLoopError;
use crate::observability::metrics::{metrics, TaskOutcome};
use crate::observability::{processor_span, task_span};
use crate::pipeline::state::{AnomalyKind, CompletionReason, DecisionRecord, RunState, TaskStatus};
use crate::processors::{ProcessorInput, ProcessorOutput, ProcessorRegistry};
use crate::routing::{ProcessorKind, RoutingContext, RoutingDecision, TaskRouter};
use crate::search::truncate_chars;
use crate::todoist::Task;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Default cap on routing decisions per task
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Characters of the last output shown to the router
pub const LAST_OUTPUT_CHARS: usize = 500;

/// Result text recorded when a processor fails before producing anything
pub fn failure_note(processor: ProcessorKind, error: &TaskLoopError) -> String {
    format!(
        "_Processing failed in {}: {}_",
        processor,
        error.sanitized_message()
    )
}

pub struct TaskLoop {
    router: TaskRouter,
    processors: ProcessorRegistry,
    max_iterations: usize,
}

impl TaskLoop {
    pub fn new(router: TaskRouter, processors: ProcessorRegistry) -> Self {
        Self {
            router,
            processors,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Values below 1 are raised to 1
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Drive one task to completion
    ///
    /// # Errors
    ///
    /// Returns error only if `index` is out of range or the task was never
    /// classified.
    pub async fn process_task(
        &self,
        state: &mut RunState,
        index: usize,
    ) -> Result<CompletionReason, TaskLoopError> {
        let task = state
            .task(index)
            .cloned()
            .ok_or_else(|| TaskLoopError::invalid_input(format!("no task at index {index}")))?;

        let span = task_span!(task_id = %task.id, index = index);
        self.run_loop(state, index, &task).instrument(span).await
    }

    async fn run_loop(
        &self,
        state: &mut RunState,
        index: usize,
        task: &Task,
    ) -> Result<CompletionReason, TaskLoopError> {
        let task_type = state.task_type(&task.id).ok_or_else(|| {
            TaskLoopError::internal(format!("task {} reached routing unclassified", task.id))
        })?;
        let project_name = state.project_name(task).to_string();
        let tasks_remaining = state.len().saturating_sub(index);
        let started = Instant::now();

        info!(content = %task.content, %task_type, "Processing task");

        let mut last_output: Option<String> = None;
        let mut iteration = 0;

        let reason = loop {
            if iteration >= self.max_iterations {
                // The last allowed pass may have run the designated processor
                if let Some(routed) = self
                    .router
                    .table_completion(task_type, state.history(&task.id))
                {
                    state.record_decision(
                        &task.id,
                        DecisionRecord {
                            iteration: iteration + 1,
                            decision: routed.decision,
                            source: routed.source,
                        },
                    );
                    break CompletionReason::Router;
                }
                warn!(
                    max_iterations = self.max_iterations,
                    "Routing decision cap reached, forcing task complete"
                );
                state.add_anomaly(
                    Some(&task.id),
                    AnomalyKind::IterationLimit,
                    format!(
                        "forced complete after {} routing decisions",
                        self.max_iterations
                    ),
                );
                break CompletionReason::IterationLimit;
            }
            iteration += 1;

            let history = state.history(&task.id).to_vec();
            let truncated = last_output
                .as_deref()
                .map(|text| truncate_chars(text, LAST_OUTPUT_CHARS));
            let ctx = RoutingContext {
                task,
                task_type,
                history: &history,
                last_output: truncated.as_deref(),
                iteration,
                max_iterations: self.max_iterations,
                tasks_remaining,
            };

            let routed = self.router.route(&ctx).await;
            debug!(
                iteration,
                decision = ?routed.decision,
                source = ?routed.source,
                "Routing decision"
            );
            state.record_decision(
                &task.id,
                DecisionRecord {
                    iteration,
                    decision: routed.decision.clone(),
                    source: routed.source,
                },
            );

            let processor = match routed.decision {
                RoutingDecision::Complete { reason } => {
                    debug!(reason = %reason, "Task complete");
                    break CompletionReason::Router;
                }
                RoutingDecision::Invoke { processor, .. } => processor,
            };

            state.set_status(&task.id, TaskStatus::InProgress(processor));
            state.record_processing(&task.id, processor);

            let outcome = match self.processors.get(processor) {
                Some(implementation) => {
                    let input = ProcessorInput {
                        task,
                        task_type,
                        project_name: &project_name,
                    };
                    implementation
                        .process(&input)
                        .instrument(processor_span!(processor = %processor))
                        .await
                }
                None => Err(TaskLoopError::processor(
                    processor.as_str(),
                    "no implementation registered",
                )),
            };

            match outcome {
                Ok(output) => {
                    last_output = Some(output.result.clone());
                    Self::record_output(state, task, processor, output);
                }
                Err(e) => {
                    warn!(processor = %processor, error = %e, "Processor failed");
                    state.add_anomaly(
                        Some(&task.id),
                        AnomalyKind::ProcessorFailed,
                        format!("{processor}: {}", e.sanitized_message()),
                    );
                    if state.result(&task.id).is_none() {
                        state.set_result(&task.id, failure_note(processor, &e));
                    }
                    break CompletionReason::ProcessorFailed;
                }
            }
        };

        state.set_status(&task.id, TaskStatus::Complete(reason));

        let outcome = match reason {
            CompletionReason::Router => TaskOutcome::Completed,
            CompletionReason::IterationLimit => TaskOutcome::ForcedComplete,
            CompletionReason::ProcessorFailed => TaskOutcome::Failed,
        };
        metrics().task_finished(outcome, started.elapsed());

        info!(
            ?reason,
            decisions = iteration,
            duration_ms = started.elapsed().as_millis() as u64,
            "Task finished"
        );

        Ok(reason)
    }

    fn record_output(
        state: &mut RunState,
        task: &Task,
        processor: ProcessorKind,
        output: ProcessorOutput,
    ) {
        if let Some(path) = output.learning_file {
            state.set_learning_file(&task.id, path);
        }
        if let Some(path) = output.context_file {
            state.set_context_file(&task.id, path);
        }
        if let Some(error) = output.file_error {
            state.add_anomaly(
                Some(&task.id),
                AnomalyKind::FileWriteFailed,
                format!("{processor}: {error}"),
            );
        }
        state.set_result(&task.id, output.result);
    }
}
