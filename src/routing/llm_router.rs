//! LLM-based router
//!
//! Asks the model for the next step and accepts only answers that pass the
//! routing schema and name a known processor. Everything else is an error
//! for the caller to fall back on.
//!
//! Structured output per provider:
//! - OpenAI: JSON Schema with `response_format`
//! - Ollama: `format: "json"`
//! - Anthropic: JSON requested in the prompt

use crate::error::TaskLoopError;
use crate::llm::provider::{JsonSchemaDefinition, ResponseFormat};
use crate::llm::LlmClient;
use crate::prompts;
use crate::routing::router::{Router, RoutingContext, RoutingDecision};
use crate::routing::schema::RoutingDecisionOutput;
use tracing::{debug, info, warn};

/// Router that lets the model pick the next processor
pub struct LlmRouter {
    llm: LlmClient,
}

impl LlmRouter {
    /// `llm` should already carry the routing temperature
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    fn response_format(&self) -> ResponseFormat {
        if self.llm.provider_name() == "openai" {
            ResponseFormat::JsonSchema {
                json_schema: JsonSchemaDefinition {
                    name: "routing_decision".to_string(),
                    // Non-strict: strict mode rejects schemas without additionalProperties
                    strict: Some(false),
                    schema: RoutingDecisionOutput::json_schema(),
                },
            }
        } else {
            ResponseFormat::Json
        }
    }

    /// Parse and validate the model's answer (pure function)
    pub fn parse_routing_decision(text: &str) -> Result<RoutingDecision, TaskLoopError> {
        let output = RoutingDecisionOutput::from_model_text(text).map_err(|e| {
            warn!(error = %e, response = %text, "Failed to parse routing decision");
            TaskLoopError::routing(e)
        })?;

        output.into_decision().map_err(|e| {
            warn!(error = %e, "Routing decision names an unknown processor");
            TaskLoopError::routing(e)
        })
    }
}

#[async_trait::async_trait]
impl Router for LlmRouter {
    async fn decide_next_step(
        &self,
        ctx: &RoutingContext<'_>,
    ) -> Result<RoutingDecision, TaskLoopError> {
        let prompt = prompts::routing_prompt(ctx);
        debug!(task_id = %ctx.task.id, "Routing prompt:\n{}", prompt);

        let text = self
            .llm
            .complete_json("routing", &prompt, self.response_format())
            .await?;

        let decision = Self::parse_routing_decision(&text)?;

        info!(
            task_id = %ctx.task.id,
            iteration = ctx.iteration,
            complete = decision.is_complete(),
            reason = %decision.reason(),
            "Parsed routing decision from LLM"
        );

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TaskType;
    use crate::retry::RetryPolicy;
    use crate::routing::router::ProcessorKind;
    use crate::testing::mocks::MockLlmProvider;
    use crate::todoist::Task;
    use std::sync::Arc;
    use std::time::Duration;

    fn router(provider: Arc<MockLlmProvider>) -> LlmRouter {
        LlmRouter::new(
            LlmClient::new(provider, "mock-model")
                .with_temperature(0.2)
                .with_retry(RetryPolicy::no_retry(Duration::from_secs(5))),
        )
    }

    fn ctx<'a>(task: &'a Task, history: &'a [ProcessorKind]) -> RoutingContext<'a> {
        RoutingContext {
            task,
            task_type: TaskType::Research,
            history,
            last_output: None,
            iteration: 1,
            max_iterations: 5,
            tasks_remaining: 3,
        }
    }

    #[test]
    fn test_parse_routing_decision() {
        let decision = LlmRouter::parse_routing_decision(
            r#"{"goto": "research_processor", "reason": "needs a plan", "is_complete": false}"#,
        )
        .unwrap();
        assert_eq!(
            decision,
            RoutingDecision::Invoke {
                processor: ProcessorKind::Research,
                reason: "needs a plan".to_string()
            }
        );

        assert!(matches!(
            LlmRouter::parse_routing_decision(
                r#"{"goto": "editor", "reason": "x", "is_complete": false}"#
            ),
            Err(TaskLoopError::Routing { .. })
        ));
    }

    #[tokio::test]
    async fn test_decision_from_model() {
        let provider = Arc::new(MockLlmProvider::single_response(
            r#"{"goto": "research_processor", "reason": "research task", "is_complete": false}"#,
        ));
        let task = Task::new("R1", "Compare vector databases");

        let decision = router(provider.clone())
            .decide_next_step(&ctx(&task, &[]))
            .await
            .unwrap();

        assert_eq!(
            decision,
            RoutingDecision::Invoke {
                processor: ProcessorKind::Research,
                reason: "research task".to_string()
            }
        );

        let request = &provider.requests()[0];
        assert_eq!(request.temperature, Some(0.2));
        assert!(matches!(request.response_format, Some(ResponseFormat::Json)));
        assert!(request.messages[0].content.contains("Compare vector databases"));
    }

    #[tokio::test]
    async fn test_llm_failure_is_an_error() {
        let provider = Arc::new(MockLlmProvider::with_failure());
        let task = Task::new("R1", "Compare vector databases");

        let result = router(provider).decide_next_step(&ctx(&task, &[])).await;
        assert!(matches!(result, Err(TaskLoopError::Llm { .. })));
    }
}
