//! Single next-action processor

use crate::error::TaskLoopError;
use crate::llm::LlmClient;
use crate::processors::{Processor, ProcessorInput, ProcessorOutput};
use crate::prompts::{self, CommentPolicy};
use crate::routing::ProcessorKind;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

static LIST_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*•]\s+").expect("valid regex"));

/// Collapse a model answer to one line without list markers or wrapping quotes
pub fn normalize_action(text: &str) -> String {
    let joined = text
        .lines()
        .map(|line| LIST_MARKER.replace(line.trim(), "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    joined
        .trim_matches(|c| c == '"' || c == '\u{201c}' || c == '\u{201d}')
        .trim()
        .to_string()
}

pub struct NextActionProcessor {
    llm: LlmClient,
    comments: CommentPolicy,
}

impl NextActionProcessor {
    pub fn new(llm: LlmClient, comments: CommentPolicy) -> Self {
        Self { llm, comments }
    }
}

#[async_trait]
impl Processor for NextActionProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::NextAction
    }

    async fn process(&self, input: &ProcessorInput<'_>) -> Result<ProcessorOutput, TaskLoopError> {
        let prompt = prompts::next_action_prompt(input.task, input.project_name, self.comments);
        let text = self
            .llm
            .prompt("next_action", &prompt)
            .await
            .map_err(|e| TaskLoopError::processor(self.kind().as_str(), e.to_string()))?;

        Ok(ProcessorOutput::text(normalize_action(&text)))
    }
}
