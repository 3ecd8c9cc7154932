//! Observability: structured logging and run metrics

pub mod logging;
pub mod metrics;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat};
pub use metrics::{metrics, MetricsCollector, MetricsSnapshot, TaskOutcome};

// Span macros for structured logging
pub use logging::{processor_span, run_span, task_span};
