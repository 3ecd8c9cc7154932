//! Combined router used by the task loop
//!
//! The model-driven router proposes, the static table disposes:
//!
//! 1. If the static table says the task is complete, it is.
//! 2. Otherwise the model router is asked.
//! 3. A valid `Invoke` from the model is used as-is.
//! 4. A model `Complete` before any processor ran is replaced by the table.
//! 5. Errors and invalid answers fall back to the table.

use crate::classifier::TaskType;
use crate::observability::metrics;
use crate::routing::fallback::FallbackRouter;
use crate::routing::router::{ProcessorKind, Router, RoutingContext, RoutingDecision};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which path produced a decision
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DecisionSource {
    Model,
    Fallback { cause: String },
}

impl DecisionSource {
    fn fallback(cause: impl Into<String>) -> Self {
        DecisionSource::Fallback {
            cause: cause.into(),
        }
    }
}

/// A decision plus where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedDecision {
    pub decision: RoutingDecision,
    pub source: DecisionSource,
}

/// Primary router with the static table as safety net
pub struct TaskRouter {
    primary: Option<Arc<dyn Router>>,
    fallback: FallbackRouter,
}

impl TaskRouter {
    pub fn new(primary: Arc<dyn Router>) -> Self {
        Self {
            primary: Some(primary),
            fallback: FallbackRouter::new(),
        }
    }

    /// Static table only
    pub fn static_only() -> Self {
        Self {
            primary: None,
            fallback: FallbackRouter::new(),
        }
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// The table's completion verdict, if it already has one
    pub fn table_completion(
        &self,
        task_type: TaskType,
        history: &[ProcessorKind],
    ) -> Option<RoutedDecision> {
        let table = self.fallback.decide(task_type, history);
        table.is_complete().then(|| RoutedDecision {
            decision: table,
            source: DecisionSource::fallback("designated processor already ran"),
        })
    }

    /// Decide the next step; never fails
    pub async fn route(&self, ctx: &RoutingContext<'_>) -> RoutedDecision {
        if let Some(complete) = self.table_completion(ctx.task_type, ctx.history) {
            return complete;
        }
        let table = self.fallback.decide(ctx.task_type, ctx.history);

        let Some(primary) = &self.primary else {
            return RoutedDecision {
                decision: table,
                source: DecisionSource::fallback("static routing"),
            };
        };

        match primary.decide_next_step(ctx).await {
            Ok(decision @ RoutingDecision::Invoke { .. }) => {
                debug!(task_id = %ctx.task.id, "Using model routing decision");
                RoutedDecision {
                    decision,
                    source: DecisionSource::Model,
                }
            }
            Ok(RoutingDecision::Complete { reason }) => {
                if ctx.history.is_empty() {
                    warn!(
                        task_id = %ctx.task.id,
                        reason = %reason,
                        "Model completed a task before any processor ran, using routing table"
                    );
                    metrics().routing_fallback_used();
                    RoutedDecision {
                        decision: table,
                        source: DecisionSource::fallback(
                            "model declared completion before any processor ran",
                        ),
                    }
                } else {
                    RoutedDecision {
                        decision: RoutingDecision::Complete { reason },
                        source: DecisionSource::Model,
                    }
                }
            }
            Err(e) => {
                warn!(
                    task_id = %ctx.task.id,
                    error = %e,
                    "Model routing failed, using routing table"
                );
                metrics().routing_fallback_used();
                RoutedDecision {
                    decision: table,
                    source: DecisionSource::fallback(e.sanitized_message()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TaskType;
    use crate::error::TaskLoopError;
    use crate::routing::router::ProcessorKind;
    use crate::todoist::Task;

    struct Fixed(Result<RoutingDecision, String>);

    #[async_trait::async_trait]
    impl Router for Fixed {
        async fn decide_next_step(
            &self,
            _ctx: &RoutingContext<'_>,
        ) -> Result<RoutingDecision, TaskLoopError> {
            self.0.clone().map_err(TaskLoopError::routing)
        }
    }

    fn ctx<'a>(task: &'a Task, task_type: TaskType, history: &'a [ProcessorKind]) -> RoutingContext<'a> {
        RoutingContext {
            task,
            task_type,
            history,
            last_output: None,
            iteration: history.len() + 1,
            max_iterations: 5,
            tasks_remaining: 1,
        }
    }

    fn invoke(processor: ProcessorKind) -> RoutingDecision {
        RoutingDecision::Invoke {
            processor,
            reason: "model says so".to_string(),
        }
    }

    #[test]
    fn test_table_completion_only_after_designated_processor() {
        let router = TaskRouter::static_only();

        assert!(router.table_completion(TaskType::Planning, &[]).is_none());
        assert!(router
            .table_completion(TaskType::Planning, &[ProcessorKind::Research])
            .is_none());

        let done = router
            .table_completion(TaskType::Planning, &[ProcessorKind::Planning])
            .unwrap();
        assert!(done.decision.is_complete());
        assert!(matches!(done.source, DecisionSource::Fallback { .. }));
    }

    #[tokio::test]
    async fn test_model_invoke_is_used() {
        let router = TaskRouter::new(Arc::new(Fixed(Ok(invoke(ProcessorKind::Research)))));
        let task = Task::new("1", "a");

        let routed = router.route(&ctx(&task, TaskType::Research, &[])).await;
        assert_eq!(routed.decision, invoke(ProcessorKind::Research));
        assert_eq!(routed.source, DecisionSource::Model);
    }

    #[tokio::test]
    async fn test_model_error_falls_back_to_table() {
        let router = TaskRouter::new(Arc::new(Fixed(Err("bad json".to_string()))));
        let task = Task::new("1", "a");

        let routed = router.route(&ctx(&task, TaskType::Planning, &[])).await;
        assert!(matches!(
            routed.decision,
            RoutingDecision::Invoke {
                processor: ProcessorKind::Planning,
                ..
            }
        ));
        assert!(matches!(routed.source, DecisionSource::Fallback { .. }));
    }

    #[tokio::test]
    async fn test_premature_completion_is_overridden() {
        let router = TaskRouter::new(Arc::new(Fixed(Ok(RoutingDecision::Complete {
            reason: "looks done".to_string(),
        }))));
        let task = Task::new("1", "a");

        let routed = router.route(&ctx(&task, TaskType::Learning, &[])).await;
        assert!(matches!(
            routed.decision,
            RoutingDecision::Invoke {
                processor: ProcessorKind::Learning,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_model_completion_after_a_processor_is_accepted() {
        let router = TaskRouter::new(Arc::new(Fixed(Ok(RoutingDecision::Complete {
            reason: "research plan is enough".to_string(),
        }))));
        let task = Task::new("1", "a");
        let history = [ProcessorKind::Research];

        let routed = router
            .route(&ctx(&task, TaskType::Learning, &history))
            .await;
        assert!(routed.decision.is_complete());
        assert_eq!(routed.source, DecisionSource::Model);
    }

    #[tokio::test]
    async fn test_table_completion_is_final() {
        // The model would keep going; the table says the designated processor already ran
        let router = TaskRouter::new(Arc::new(Fixed(Ok(invoke(ProcessorKind::Research)))));
        let task = Task::new("1", "a");
        let history = [ProcessorKind::NextAction];

        let routed = router.route(&ctx(&task, TaskType::Short, &history)).await;
        assert!(routed.decision.is_complete());
        assert!(matches!(routed.source, DecisionSource::Fallback { .. }));
    }

    #[tokio::test]
    async fn test_static_only() {
        let router = TaskRouter::static_only();
        assert!(!router.has_primary());
        let task = Task::new("1", "a");

        let routed = router.route(&ctx(&task, TaskType::Abstract, &[])).await;
        assert!(matches!(
            routed.decision,
            RoutingDecision::Invoke {
                processor: ProcessorKind::Learning,
                ..
            }
        ));
    }
}
