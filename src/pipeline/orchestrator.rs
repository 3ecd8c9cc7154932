//! Run orchestrator
//!
//! fetch → classify every task → route each task in order → write report.
//! Only a task source failure or a report write failure ends the run early.

use crate::classifier::TaskClassifier;
use crate::config::{PipelineConfig, RoutingStrategy};
use crate::context::ContextLibrary;
use crate::error::TaskLoopError;
use crate::learning_files::LearningFileStore;
use crate::llm::{LlmClient, LlmProviderFactory};
use crate::observability::{metrics, run_span};
use crate::pipeline::state::{AnomalyKind, CompletionReason, RunState};
use crate::pipeline::task_loop::TaskLoop;
use crate::processors::{
    LearningProcessor, NextActionProcessor, PlanningProcessor, ProcessorRegistry,
    ResearchProcessor,
};
use crate::prompts::CommentPolicy;
use crate::report;
use crate::retry::RetryPolicy;
use crate::routing::{LlmRouter, TaskRouter};
use crate::search::{SerperConfig, SerperSearch, WebSearch};
use crate::todoist::{TaskSource, TodoistClient, TodoistConfig};
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// Overrides applied on top of the configuration file
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Process at most this many tasks
    pub limit: Option<usize>,
    /// Skip the model router and use only the static table
    pub static_routing: bool,
}

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub report_path: PathBuf,
    pub tasks: usize,
    pub completed: usize,
    pub forced_complete: usize,
    pub failed: usize,
    pub defaulted_classifications: usize,
    pub learning_files: Vec<PathBuf>,
    pub anomalies: Vec<String>,
}

impl RunSummary {
    fn from_state(state: &RunState, report_path: PathBuf) -> Self {
        Self {
            run_id: state.run_id,
            report_path,
            tasks: state.len(),
            completed: state.completed_count(CompletionReason::Router),
            forced_complete: state.completed_count(CompletionReason::IterationLimit),
            failed: state.completed_count(CompletionReason::ProcessorFailed),
            defaulted_classifications: state.anomalies_of(AnomalyKind::ClassificationDefaulted),
            learning_files: state.learning_files(),
            anomalies: state.anomalies().iter().map(ToString::to_string).collect(),
        }
    }
}

/// The whole daily run
pub struct Pipeline {
    source: Arc<dyn TaskSource>,
    classifier: TaskClassifier,
    task_loop: TaskLoop,
    report_dir: PathBuf,
    limit: Option<usize>,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn TaskSource>,
        classifier: TaskClassifier,
        task_loop: TaskLoop,
        report_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            classifier,
            task_loop,
            report_dir: report_dir.into(),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Build every collaborator from configuration and the environment
    ///
    /// # Errors
    ///
    /// Returns error if a required secret is missing or a client cannot be
    /// built.
    pub fn from_config(config: &PipelineConfig, options: &RunOptions) -> Result<Self, TaskLoopError> {
        config.validate()?;
        let retry = RetryPolicy::from_config(&config.retry);

        let todoist = TodoistClient::new(
            TodoistConfig {
                api_token: config.get_todoist_token()?,
                base_url: config.todoist.base_url.trim_end_matches('/').to_string(),
                timeout: config.retry.timeout(),
                task_limit: config.todoist.task_limit,
            },
            retry.clone(),
        )?;

        let provider = LlmProviderFactory::create(
            &config.llm,
            config.get_llm_api_key()?,
            config.retry.timeout(),
        )?;
        let llm = LlmClient::new(provider, config.llm.model_name())
            .with_temperature(config.llm.temperature)
            .with_max_tokens(config.llm.max_tokens)
            .with_system_prompt(config.llm.system_prompt.clone())
            .with_retry(retry.clone());

        let search: Option<Arc<dyn WebSearch>> = match config.get_search_api_key() {
            Some(api_key) => {
                let serper: Arc<dyn WebSearch> = Arc::new(SerperSearch::new(
                    SerperConfig {
                        api_key,
                        base_url: config.search.base_url.trim_end_matches('/').to_string(),
                        max_results: config.search.max_results,
                        timeout: config.retry.timeout(),
                    },
                    retry.clone(),
                )?);
                Some(serper)
            }
            None => {
                warn!(
                    env = %config.search.api_key_env,
                    "No web search key set, planning tasks run without search"
                );
                None
            }
        };

        let comments = CommentPolicy::new(config.prompts.max_comments);
        let processors = ProcessorRegistry::new()
            .with(Arc::new(ResearchProcessor::new(llm.clone(), comments)))
            .with(Arc::new(NextActionProcessor::new(llm.clone(), comments)))
            .with(Arc::new(
                PlanningProcessor::new(llm.clone(), search, comments)
                    .with_max_search_chars(config.search.max_chars),
            ))
            .with(Arc::new(LearningProcessor::new(
                llm.clone(),
                ContextLibrary::from_config(&config.output.contexts_dir, &config.contexts),
                LearningFileStore::new(&config.output.learning_dir),
                comments,
            )));

        let static_routing =
            options.static_routing || config.routing.strategy == RoutingStrategy::Static;
        let router = if static_routing {
            TaskRouter::static_only()
        } else {
            TaskRouter::new(Arc::new(LlmRouter::new(
                llm.clone().with_temperature(config.routing.temperature),
            )))
        };

        let task_loop =
            TaskLoop::new(router, processors).with_max_iterations(config.routing.max_iterations);

        Ok(Self::new(
            Arc::new(todoist),
            TaskClassifier::new(llm),
            task_loop,
            &config.output.report_dir,
        )
        .with_limit(options.limit))
    }

    /// Run once, end to end
    ///
    /// # Errors
    ///
    /// Returns error if the task source fails or the report cannot be written.
    /// Task-level failures are recorded in the report instead.
    pub async fn run(&self) -> Result<RunSummary, TaskLoopError> {
        let (_, summary) = self.run_with_state().await?;
        Ok(summary)
    }

    /// Run once and hand back the final state as well
    pub async fn run_with_state(&self) -> Result<(RunState, RunSummary), TaskLoopError> {
        metrics().run_started();

        let mut batch = self.source.fetch_tasks().await.map_err(|e| {
            error!(error = %e, "Failed to fetch tasks, aborting run");
            TaskLoopError::from(e)
        })?;
        if let Some(limit) = self.limit {
            batch.tasks.truncate(limit);
        }
        metrics().tasks_fetched(batch.tasks.len());

        let mut state = RunState::new(batch);
        let span = run_span!(run_id = %state.run_id, tasks = state.len());

        async {
            info!(tasks = state.len(), "Fetched tasks due today or overdue");

            self.classify_all(&mut state).await;
            state.ensure_classified()?;

            for index in 0..state.len() {
                self.task_loop.process_task(&mut state, index).await?;
            }

            let report_path = report::write_report(&state, &self.report_dir, Local::now()).await?;
            let summary = RunSummary::from_state(&state, report_path);

            info!(
                report = %summary.report_path.display(),
                completed = summary.completed,
                forced = summary.forced_complete,
                failed = summary.failed,
                "Run finished"
            );
            Ok::<_, TaskLoopError>(summary)
        }
        .instrument(span)
        .await
        .map(|summary| (state, summary))
    }

    async fn classify_all(&self, state: &mut RunState) {
        let tasks = state.tasks().to_vec();
        for task in &tasks {
            let classification = self.classifier.classify(task).await;
            info!(task_id = %task.id, task_type = %classification.task_type, "Classified");
            state.set_classification(&task.id, classification);
        }
    }
}
