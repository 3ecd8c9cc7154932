//! The daily run: state, the per-task loop and the orchestrator that ties
//! them to the task source and the report.

pub mod orchestrator;
pub mod state;
pub mod task_loop;

pub use orchestrator::{Pipeline, RunOptions, RunSummary};
pub use state::{Anomaly, AnomalyKind, CompletionReason, DecisionRecord, RunState, TaskStatus};
pub use task_loop::{failure_note, TaskLoop, DEFAULT_MAX_ITERATIONS, LAST_OUTPUT_CHARS};
