//! Taskloop - daily task triage with LLM processors
//!
//! Fetches the Todoist tasks that are due today or overdue, classifies each
//! one, routes it through a small set of LLM-backed processors and writes a
//! single markdown report for the run.
//!
//! # Overview
//!
//! - Task source client for the Todoist REST API
//! - Five-way task classification with a safe default
//! - LLM routing with a static fallback table and a per-task decision cap
//! - Research, next action, planning (with web search) and learning processors
//! - Learning files kept on disk and merged across runs
//! - Timestamped markdown report
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use taskloop::{Pipeline, PipelineConfig, RunOptions};
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::load_from_file(Path::new("taskloop.toml"))?;
//! let pipeline = Pipeline::from_config(&config, &RunOptions::default())?;
//! let summary = pipeline.run().await?;
//! println!("Report written to {}", summary.report_path.display());
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod context;
pub mod error;
pub mod learning_files;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod processors;
pub mod prompts;
pub mod report;
pub mod retry;
pub mod routing;
pub mod search;
pub mod testing;
pub mod todoist;

pub use classifier::{Classification, TaskClassifier, TaskType};
pub use config::{ConfigError, PipelineConfig};
pub use error::{TaskLoopError, TaskLoopResult};
pub use pipeline::{Pipeline, RunOptions, RunState, RunSummary};
pub use routing::{ProcessorKind, RoutingDecision};
pub use todoist::{Task, TaskSource};
