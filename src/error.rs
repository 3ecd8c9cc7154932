//! Error types for the task pipeline
//!
//! Lower layers (LLM providers, the Todoist client, web search) keep their own
//! typed errors; everything converges on [`TaskLoopError`] at the pipeline
//! boundary. Error text that ends up in a report or learning file goes through
//! [`sanitize_error_message`] first.

use crate::llm::provider::LlmError;
use crate::search::SearchError;
use crate::todoist::TaskSourceError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Debug, Error)]
pub enum TaskLoopError {
    #[error("Task source error: {0}")]
    TaskSource(#[from] TaskSourceError),

    #[error("LLM provider error: {message}")]
    Llm { message: String },

    #[error("Processor {processor} failed: {message}")]
    Processor { processor: String, message: String },

    #[error("Routing error: {message}")]
    Routing { message: String },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Report error: {message}")]
    Report { message: String },

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LlmError> for TaskLoopError {
    fn from(error: LlmError) -> Self {
        Self::Llm {
            message: error.to_string(),
        }
    }
}

impl TaskLoopError {
    /// Create LLM error
    pub fn llm<S: Into<String>>(message: S) -> Self {
        Self::Llm {
            message: message.into(),
        }
    }

    /// Create processor failure
    pub fn processor<P: Into<String>, S: Into<String>>(processor: P, message: S) -> Self {
        Self::Processor {
            processor: processor.into(),
            message: message.into(),
        }
    }

    /// Create routing error
    pub fn routing<S: Into<String>>(message: S) -> Self {
        Self::Routing {
            message: message.into(),
        }
    }

    /// Create persistence error
    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Create report error
    pub fn report<S: Into<String>>(message: S) -> Self {
        Self::Report {
            message: message.into(),
        }
    }

    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error must end the run instead of being absorbed per task
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TaskLoopError::TaskSource(_) | TaskLoopError::Config(_) | TaskLoopError::Report { .. }
        )
    }

    /// Error text safe to write into reports and task files
    pub fn sanitized_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret|bearer)[=:]\s*\S+").expect("valid regex")
});

static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("valid regex")
});

const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Redact secrets and sensitive paths, then cap the length at 500 bytes
pub fn sanitize_error_message(message: &str) -> String {
    let sanitized = SECRET_PATTERN.replace_all(message, "${1}=***");
    let mut sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_ERROR_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for pipeline operations
pub type TaskLoopResult<T> = Result<T, TaskLoopError>;
