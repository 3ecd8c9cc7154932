//! Static routing table
//!
//! One processor per task type. Once that processor has run, the task is
//! complete. The answer depends only on the task type and whether the
//! designated processor is in the history.

use crate::classifier::TaskType;
use crate::error::TaskLoopError;
use crate::routing::router::{ProcessorKind, Router, RoutingContext, RoutingDecision};

/// The processor each task type is sent to
pub fn designated_processor(task_type: TaskType) -> ProcessorKind {
    match task_type {
        TaskType::Planning => ProcessorKind::Planning,
        TaskType::Learning | TaskType::Abstract => ProcessorKind::Learning,
        TaskType::Research => ProcessorKind::Research,
        TaskType::Short => ProcessorKind::NextAction,
    }
}

/// Deterministic router backed by [`designated_processor`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackRouter;

impl FallbackRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn decide(&self, task_type: TaskType, history: &[ProcessorKind]) -> RoutingDecision {
        let processor = designated_processor(task_type);
        if history.contains(&processor) {
            RoutingDecision::Complete {
                reason: format!("{processor} already ran for this {task_type} task"),
            }
        } else {
            RoutingDecision::Invoke {
                processor,
                reason: format!("{task_type} tasks go to {processor}"),
            }
        }
    }
}

#[async_trait::async_trait]
impl Router for FallbackRouter {
    async fn decide_next_step(
        &self,
        ctx: &RoutingContext<'_>,
    ) -> Result<RoutingDecision, TaskLoopError> {
        Ok(self.decide(ctx.task_type, ctx.history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_task_type() -> impl Strategy<Value = TaskType> {
        prop::sample::select(TaskType::ALL.to_vec())
    }

    fn any_history() -> impl Strategy<Value = Vec<ProcessorKind>> {
        prop::collection::vec(prop::sample::select(ProcessorKind::ALL.to_vec()), 0..6)
    }

    #[test]
    fn test_table() {
        assert_eq!(designated_processor(TaskType::Planning), ProcessorKind::Planning);
        assert_eq!(designated_processor(TaskType::Learning), ProcessorKind::Learning);
        assert_eq!(designated_processor(TaskType::Abstract), ProcessorKind::Learning);
        assert_eq!(designated_processor(TaskType::Research), ProcessorKind::Research);
        assert_eq!(designated_processor(TaskType::Short), ProcessorKind::NextAction);
    }

    #[test]
    fn test_complete_after_designated_processor_ran_once() {
        let router = FallbackRouter::new();

        assert_eq!(
            router.decide(TaskType::Short, &[]),
            RoutingDecision::Invoke {
                processor: ProcessorKind::NextAction,
                reason: "short tasks go to next_action_processor".to_string()
            }
        );
        assert!(router
            .decide(TaskType::Short, &[ProcessorKind::NextAction])
            .is_complete());
        assert!(!router
            .decide(TaskType::Short, &[ProcessorKind::Research])
            .is_complete());
    }

    proptest! {
        #[test]
        fn prop_invoked_processor_is_always_the_designated_one(
            task_type in any_task_type(),
            history in any_history(),
        ) {
            match FallbackRouter::new().decide(task_type, &history) {
                RoutingDecision::Invoke { processor, .. } => {
                    prop_assert_eq!(processor, designated_processor(task_type));
                    prop_assert!(!history.contains(&processor));
                }
                RoutingDecision::Complete { .. } => {
                    prop_assert!(history.contains(&designated_processor(task_type)));
                }
            }
        }

        #[test]
        fn prop_at_most_one_invocation_before_completion(task_type in any_task_type()) {
            let router = FallbackRouter::new();
            let mut history = Vec::new();
            let mut decisions = 0;
            while let RoutingDecision::Invoke { processor, .. } = router.decide(task_type, &history) {
                history.push(processor);
                decisions += 1;
                prop_assert!(decisions <= 1);
            }
            prop_assert_eq!(history, vec![designated_processor(task_type)]);
        }
    }
}
