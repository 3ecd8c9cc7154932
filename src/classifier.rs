//! Task classification
//!
//! One LLM call per task, answer constrained to the closed set of
//! [`TaskType`]s. Anything the model says outside that set, and any LLM
//! failure, falls back to [`DEFAULT_TASK_TYPE`].

use crate::llm::LlmClient;
use crate::observability::metrics;
use crate::prompts;
use crate::todoist::Task;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Fixed set of task types driving routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Research,
    Planning,
    Short,
    Learning,
    Abstract,
}

/// Substituted when the model's answer is not a known tag.
///
/// `short` routes to the next-action processor: one cheap call that still
/// yields something actionable.
pub const DEFAULT_TASK_TYPE: TaskType = TaskType::Short;

impl TaskType {
    pub const ALL: [TaskType; 5] = [
        TaskType::Research,
        TaskType::Planning,
        TaskType::Short,
        TaskType::Learning,
        TaskType::Abstract,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Research => "research",
            TaskType::Planning => "planning",
            TaskType::Short => "short",
            TaskType::Learning => "learning",
            TaskType::Abstract => "abstract",
        }
    }

    /// One-line description used in the classification prompt
    pub fn description(&self) -> &'static str {
        match self {
            TaskType::Research => "Tasks requiring web search, reading notes, or gathering information",
            TaskType::Planning => {
                "Tasks requiring structured planning methodology or breaking down a project"
            }
            TaskType::Short => "Simple tasks that need a clear next action step",
            TaskType::Learning => "Educational tasks for building knowledge or skills",
            TaskType::Abstract => {
                "Tasks involving model building, asking questions, finding parallels, or conceptual thinking"
            }
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "research" => Ok(TaskType::Research),
            "planning" => Ok(TaskType::Planning),
            "short" => Ok(TaskType::Short),
            "learning" => Ok(TaskType::Learning),
            "abstract" => Ok(TaskType::Abstract),
            other => Err(format!("unknown task type '{other}'")),
        }
    }
}

/// Where a task's type came from
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationSource {
    Model,
    /// The model answered something outside the closed set
    Defaulted { raw_response: String },
    /// The LLM call failed after retries
    Failed { error: String },
}

/// A task's assigned type
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub task_type: TaskType,
    pub source: ClassificationSource,
}

impl Classification {
    pub fn model(task_type: TaskType) -> Self {
        Self {
            task_type,
            source: ClassificationSource::Model,
        }
    }

    pub fn is_default(&self) -> bool {
        !matches!(self.source, ClassificationSource::Model)
    }
}

/// Extract a task type from a model answer (pure function)
///
/// Accepts a JSON object with a `type` / `classification` / `task_type` field,
/// a bare tag, or prose that names exactly one distinct tag.
pub fn parse_task_type(response: &str) -> Option<TaskType> {
    let trimmed = response.trim();

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&trimmed[start..=end]) {
                for key in ["type", "classification", "task_type"] {
                    if let Some(tag) = value.get(key).and_then(|v| v.as_str()) {
                        return tag.parse().ok();
                    }
                }
                return None;
            }
        }
    }

    let bare = trimmed.trim_matches(|c: char| !c.is_alphanumeric());
    if let Ok(task_type) = bare.parse() {
        return Some(task_type);
    }

    let lowered = trimmed.to_lowercase();
    let mentioned: Vec<TaskType> = TaskType::ALL
        .into_iter()
        .filter(|t| {
            lowered
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word == t.as_str())
        })
        .collect();

    match mentioned.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

/// Assigns exactly one [`TaskType`] per task
pub struct TaskClassifier {
    llm: LlmClient,
}

impl TaskClassifier {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// Classify one task; never fails
    pub async fn classify(&self, task: &Task) -> Classification {
        let prompt = prompts::classification_prompt(task);

        let response = match self.llm.prompt("classification", &prompt).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    task_id = %task.id,
                    error = %e,
                    default = %DEFAULT_TASK_TYPE,
                    "Classification call failed, using default type"
                );
                metrics().classification_defaulted();
                return Classification {
                    task_type: DEFAULT_TASK_TYPE,
                    source: ClassificationSource::Failed {
                        error: e.to_string(),
                    },
                };
            }
        };

        match parse_task_type(&response) {
            Some(task_type) => {
                debug!(task_id = %task.id, %task_type, "Task classified");
                Classification::model(task_type)
            }
            None => {
                warn!(
                    task_id = %task.id,
                    response = %response,
                    default = %DEFAULT_TASK_TYPE,
                    "Classification outside the known set, using default type"
                );
                metrics().classification_defaulted();
                Classification {
                    task_type: DEFAULT_TASK_TYPE,
                    source: ClassificationSource::Defaulted {
                        raw_response: response,
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::testing::mocks::MockLlmProvider;
    use std::sync::Arc;
    use std::time::Duration;

    fn classifier(provider: Arc<MockLlmProvider>) -> TaskClassifier {
        TaskClassifier::new(LlmClient::new(provider, "mock-model").with_retry(RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        }))
    }

    #[test]
    fn test_parse_bare_tags() {
        assert_eq!(parse_task_type("short"), Some(TaskType::Short));
        assert_eq!(parse_task_type("  Learning.\n"), Some(TaskType::Learning));
        assert_eq!(parse_task_type("\"abstract\""), Some(TaskType::Abstract));
    }

    #[test]
    fn test_parse_json_answers() {
        assert_eq!(
            parse_task_type(r#"{"type": "planning"}"#),
            Some(TaskType::Planning)
        );
        assert_eq!(
            parse_task_type("Sure!\n{\"classification\": \"research\", \"why\": \"needs sources\"}"),
            Some(TaskType::Research)
        );
        assert_eq!(parse_task_type(r#"{"type": "urgent"}"#), None);
    }

    #[test]
    fn test_parse_prose_with_single_tag() {
        assert_eq!(
            parse_task_type("This looks like a learning task to me"),
            Some(TaskType::Learning)
        );
        assert_eq!(parse_task_type("Either research or planning"), None);
        assert_eq!(parse_task_type("shortcut"), None);
    }

    #[test]
    fn test_unknown_tags_are_rejected() {
        assert_eq!(parse_task_type("urgent"), None);
        assert_eq!(parse_task_type(""), None);
    }

    #[tokio::test]
    async fn test_classify_uses_model_answer() {
        let provider = Arc::new(MockLlmProvider::single_response("learning"));
        let result = classifier(provider.clone())
            .classify(&Task::new("T2", "Learn LangGraph"))
            .await;

        assert_eq!(result, Classification::model(TaskType::Learning));
        let prompt = &provider.requests()[0].messages[0].content;
        assert!(prompt.contains("Learn LangGraph"));
    }

    #[tokio::test]
    async fn test_out_of_set_answer_is_normalized_to_default() {
        let provider = Arc::new(MockLlmProvider::single_response("urgent"));
        let result = classifier(provider)
            .classify(&Task::new("T3", "Renew passport"))
            .await;

        assert_eq!(result.task_type, DEFAULT_TASK_TYPE);
        assert_eq!(
            result.source,
            ClassificationSource::Defaulted {
                raw_response: "urgent".to_string()
            }
        );
        assert!(result.is_default());
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_default() {
        let provider = Arc::new(MockLlmProvider::with_failure());
        let result = classifier(provider)
            .classify(&Task::new("T4", "Anything"))
            .await;

        assert_eq!(result.task_type, DEFAULT_TASK_TYPE);
        assert!(matches!(result.source, ClassificationSource::Failed { .. }));
    }
}
