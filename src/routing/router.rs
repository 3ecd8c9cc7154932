//! Router trait and decision types
//!
//! A router looks at one task's classification, the processors already run
//! for it and the last output, then decides which processor runs next or
//! that the task is complete.
//!
//! ```text
//! RunState → RoutingContext → Router → RoutingDecision → TaskLoop
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use taskloop::classifier::TaskType;
//! use taskloop::routing::{FallbackRouter, Router, RoutingContext, RoutingDecision};
//! use taskloop::todoist::Task;
//!
//! async fn example(router: &dyn Router) -> Result<(), taskloop::TaskLoopError> {
//!     let task = Task::new("T1", "Buy milk");
//!     let ctx = RoutingContext {
//!         task: &task,
//!         task_type: TaskType::Short,
//!         history: &[],
//!         last_output: None,
//!         iteration: 1,
//!         max_iterations: 5,
//!         tasks_remaining: 1,
//!     };
//!
//!     match router.decide_next_step(&ctx).await? {
//!         RoutingDecision::Invoke { processor, reason } => println!("{processor}: {reason}"),
//!         RoutingDecision::Complete { reason } => println!("done: {reason}"),
//!     }
//!     Ok(())
//! }
//! ```

use crate::classifier::TaskType;
use crate::error::TaskLoopError;
use crate::todoist::Task;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire name a router uses to declare a task finished
pub const COMPLETE_SENTINEL: &str = "task_complete";

/// The closed set of processors a router may invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessorKind {
    #[serde(rename = "research_processor")]
    Research,
    #[serde(rename = "next_action_processor")]
    NextAction,
    #[serde(rename = "planning_processor")]
    Planning,
    #[serde(rename = "learning_processor")]
    Learning,
}

impl ProcessorKind {
    pub const ALL: [ProcessorKind; 4] = [
        ProcessorKind::Research,
        ProcessorKind::NextAction,
        ProcessorKind::Planning,
        ProcessorKind::Learning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessorKind::Research => "research_processor",
            ProcessorKind::NextAction => "next_action_processor",
            ProcessorKind::Planning => "planning_processor",
            ProcessorKind::Learning => "learning_processor",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ProcessorKind::Research => "builds a research plan (for research tasks)",
            ProcessorKind::NextAction => "suggests one concrete next action (for short tasks)",
            ProcessorKind::Planning => {
                "assesses progress with web search and lists remaining steps (for planning tasks)"
            }
            ProcessorKind::Learning => {
                "builds a curriculum or insight document and a next step (for learning and abstract tasks)"
            }
        }
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProcessorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| format!("unknown processor '{s}'"))
    }
}

/// What happens next for a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoutingDecision {
    /// Run this processor
    Invoke {
        processor: ProcessorKind,
        reason: String,
    },
    /// Nothing left to do for this task
    Complete { reason: String },
}

impl RoutingDecision {
    pub fn is_complete(&self) -> bool {
        matches!(self, RoutingDecision::Complete { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            RoutingDecision::Invoke { reason, .. } | RoutingDecision::Complete { reason } => reason,
        }
    }
}

/// Everything a router sees for one decision
#[derive(Debug, Clone, Copy)]
pub struct RoutingContext<'a> {
    pub task: &'a Task,
    pub task_type: TaskType,
    /// Processors already run for this task, oldest first
    pub history: &'a [ProcessorKind],
    /// Most recent processor output, already truncated
    pub last_output: Option<&'a str>,
    /// 1-based decision number for this task
    pub iteration: usize,
    pub max_iterations: usize,
    /// Tasks left in the run, including this one
    pub tasks_remaining: usize,
}

/// Decides the next step for a task
#[async_trait::async_trait]
pub trait Router: Send + Sync {
    /// Decide which processor runs next, or that the task is complete
    ///
    /// # Errors
    ///
    /// Returns error if the decision could not be made or the answer was
    /// outside the closed set of processors.
    async fn decide_next_step(
        &self,
        ctx: &RoutingContext<'_>,
    ) -> Result<RoutingDecision, TaskLoopError>;
}
