//! Research plan processor

use crate::error::TaskLoopError;
use crate::llm::LlmClient;
use crate::processors::{Processor, ProcessorInput, ProcessorOutput};
use crate::prompts::{self, CommentPolicy};
use crate::routing::ProcessorKind;
use async_trait::async_trait;
use tracing::debug;

/// One LLM call producing questions, topics and source types
pub struct ResearchProcessor {
    llm: LlmClient,
    comments: CommentPolicy,
}

impl ResearchProcessor {
    pub fn new(llm: LlmClient, comments: CommentPolicy) -> Self {
        Self { llm, comments }
    }
}

#[async_trait]
impl Processor for ResearchProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Research
    }

    async fn process(&self, input: &ProcessorInput<'_>) -> Result<ProcessorOutput, TaskLoopError> {
        let prompt = prompts::research_prompt(input.task, input.project_name, self.comments);
        let plan = self
            .llm
            .prompt("research_plan", &prompt)
            .await
            .map_err(|e| TaskLoopError::processor(self.kind().as_str(), e.to_string()))?;

        debug!(task_id = %input.task.id, chars = plan.len(), "Research plan generated");
        Ok(ProcessorOutput::text(plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TaskType;
    use crate::retry::RetryPolicy;
    use crate::testing::mocks::MockLlmProvider;
    use crate::todoist::Task;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_research_plan_is_the_result() {
        let provider = Arc::new(MockLlmProvider::single_response(
            "1. Key questions\n2. Topics\n3. Sources",
        ));
        let processor = ResearchProcessor::new(
            LlmClient::new(provider.clone(), "m"),
            CommentPolicy::default(),
        );
        let task = Task::new("R1", "Compare vector databases");

        let output = processor
            .process(&ProcessorInput {
                task: &task,
                task_type: TaskType::Research,
                project_name: "Work",
            })
            .await
            .unwrap();

        assert_eq!(output.result, "1. Key questions\n2. Topics\n3. Sources");
        assert!(output.learning_file.is_none());
        assert_eq!(provider.call_count(), 1);
        assert!(provider.requests()[0].messages[0]
            .content
            .contains("research plan"));
    }

    #[tokio::test]
    async fn test_llm_failure_is_a_processor_error() {
        let processor = ResearchProcessor::new(
            LlmClient::new(Arc::new(MockLlmProvider::with_failure()), "m")
                .with_retry(RetryPolicy::no_retry(Duration::from_secs(1))),
            CommentPolicy::default(),
        );
        let task = Task::new("R1", "x");

        let result = processor
            .process(&ProcessorInput {
                task: &task,
                task_type: TaskType::Research,
                project_name: "Work",
            })
            .await;

        assert!(matches!(
            result,
            Err(TaskLoopError::Processor { ref processor, .. }) if processor == "research_processor"
        ));
    }
}
