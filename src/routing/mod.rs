//! Task-loop routing
//!
//! The [`Router`] trait separates "what runs next" from the processors that
//! do the work. [`LlmRouter`] asks a model, [`FallbackRouter`] applies the
//! static table, and [`TaskRouter`] combines the two so that free-form model
//! text never reaches execution unvalidated.

pub mod fallback;
pub mod llm_router;
pub mod router;
pub mod schema;
pub mod task_router;

pub use fallback::{designated_processor, FallbackRouter};
pub use llm_router::LlmRouter;
pub use router::{ProcessorKind, Router, RoutingContext, RoutingDecision, COMPLETE_SENTINEL};
pub use schema::RoutingDecisionOutput;
pub use task_router::{DecisionSource, RoutedDecision, TaskRouter};
