//! Planning processor
//!
//! Searches the web for a how-to guide, then asks the model for a progress
//! report that treats the task's comments as steps already taken.

use crate::error::TaskLoopError;
use crate::llm::LlmClient;
use crate::observability::metrics;
use crate::processors::{Processor, ProcessorInput, ProcessorOutput};
use crate::prompts::{self, CommentPolicy, SearchSection};
use crate::routing::ProcessorKind;
use crate::search::{format_results, truncate_chars, WebSearch};
use crate::todoist::Task;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Character budget for search results in the prompt
pub const DEFAULT_SEARCH_CHARS: usize = 2000;

pub struct PlanningProcessor {
    llm: LlmClient,
    search: Option<Arc<dyn WebSearch>>,
    comments: CommentPolicy,
    max_search_chars: usize,
}

impl PlanningProcessor {
    pub fn new(llm: LlmClient, search: Option<Arc<dyn WebSearch>>, comments: CommentPolicy) -> Self {
        Self {
            llm,
            search,
            comments,
            max_search_chars: DEFAULT_SEARCH_CHARS,
        }
    }

    pub fn with_max_search_chars(mut self, max_chars: usize) -> Self {
        self.max_search_chars = max_chars;
        self
    }

    async fn search_section(&self, task: &Task) -> SearchSection {
        let Some(search) = &self.search else {
            debug!(task_id = %task.id, "No web search backend configured");
            return SearchSection::Unavailable;
        };

        let query = prompts::planning_search_query(task);
        match search.search(&query).await {
            Ok(hits) => {
                metrics().search_performed(true);
                debug!(task_id = %task.id, backend = search.name(), hits = hits.len(), "Web search done");
                SearchSection::Results(truncate_chars(
                    &format_results(&hits),
                    self.max_search_chars,
                ))
            }
            Err(e) => {
                metrics().search_performed(false);
                warn!(
                    task_id = %task.id,
                    backend = search.name(),
                    error = %e,
                    "Web search failed, planning without results"
                );
                SearchSection::Failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl Processor for PlanningProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Planning
    }

    async fn process(&self, input: &ProcessorInput<'_>) -> Result<ProcessorOutput, TaskLoopError> {
        let search = self.search_section(input.task).await;
        let prompt =
            prompts::planning_prompt(input.task, input.project_name, self.comments, &search);

        let report = self
            .llm
            .prompt("planning_report", &prompt)
            .await
            .map_err(|e| TaskLoopError::processor(self.kind().as_str(), e.to_string()))?;

        Ok(ProcessorOutput::text(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TaskType;
    use crate::search::SearchHit;
    use crate::testing::mocks::{MockLlmProvider, MockWebSearch};
    use crate::todoist::Comment;

    fn input(task: &Task) -> ProcessorInput<'_> {
        ProcessorInput {
            task,
            task_type: TaskType::Planning,
            project_name: "Home",
        }
    }

    #[tokio::test]
    async fn test_search_query_and_truncated_results_reach_prompt() {
        let provider = Arc::new(MockLlmProvider::single_response("Progress: 40%"));
        let search = Arc::new(MockWebSearch::with_hits(vec![SearchHit {
            title: "Kitchen renovation checklist".to_string(),
            link: "https://example.com/kitchen".to_string(),
            snippet: "x".repeat(5000),
        }]));
        let processor = PlanningProcessor::new(
            LlmClient::new(provider.clone(), "m"),
            Some(search.clone()),
            CommentPolicy::default(),
        )
        .with_max_search_chars(300);

        let task = Task::new("P1", "renovate kitchen")
            .with_comments(vec![Comment::new("2024-05-01", "Got three quotes")]);
        let output = processor.process(&input(&task)).await.unwrap();

        assert_eq!(output.result, "Progress: 40%");
        assert_eq!(
            search.queries(),
            vec!["how to renovate kitchen step by step guide checklist".to_string()]
        );

        let prompt = &provider.requests()[0].messages[0].content;
        assert!(prompt.contains("Kitchen renovation checklist"));
        assert!(prompt.contains("Got three quotes"));
        assert!(!prompt.contains(&"x".repeat(400)));
    }

    #[tokio::test]
    async fn test_search_failure_degrades_prompt() {
        let provider = Arc::new(MockLlmProvider::single_response("Plan without search"));
        let processor = PlanningProcessor::new(
            LlmClient::new(provider.clone(), "m"),
            Some(Arc::new(MockWebSearch::failing())),
            CommentPolicy::default(),
        );

        let task = Task::new("P1", "renovate kitchen");
        let output = processor.process(&input(&task)).await.unwrap();

        assert_eq!(output.result, "Plan without search");
        assert!(provider.requests()[0].messages[0]
            .content
            .contains("Analysis will proceed without web search results"));
    }

    #[tokio::test]
    async fn test_without_search_backend() {
        let provider = Arc::new(MockLlmProvider::single_response("Plan"));
        let processor =
            PlanningProcessor::new(LlmClient::new(provider.clone(), "m"), None, CommentPolicy::default());

        let task = Task::new("P1", "renovate kitchen");
        processor.process(&input(&task)).await.unwrap();

        assert!(provider.requests()[0].messages[0]
            .content
            .contains("Web search not available"));
    }
}
