//! Mock implementations for testing
//!
//! Provides mock LlmProvider, TaskSource and WebSearch implementations so the
//! whole pipeline can run without Todoist, a model server or a search API.

use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
};
use crate::search::{SearchError, SearchHit, WebSearch};
use crate::todoist::{Task, TaskBatch, TaskSource, TaskSourceError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Fail,
}

#[derive(Debug, Clone)]
struct Rule {
    needles: Vec<String>,
    outcome: Scripted,
}

/// Mock LLM provider for testing
///
/// Rules match on the last message of a request and are checked in the order
/// they were added. Requests no rule matches get the scripted responses in
/// turn, cycling when they run out.
#[derive(Debug, Default)]
pub struct MockLlmProvider {
    responses: Vec<String>,
    rules: Vec<Rule>,
    current_response: AtomicUsize,
    should_fail: bool,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlmProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            ..Self::default()
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Reply with `response` when the prompt contains `needle`
    pub fn when(self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.rule(vec![needle.into()], Scripted::Reply(response.into()))
    }

    /// Reply with `response` when the prompt contains every needle
    pub fn when_all(self, needles: &[&str], response: impl Into<String>) -> Self {
        let needles = needles.iter().map(|n| n.to_string()).collect();
        self.rule(needles, Scripted::Reply(response.into()))
    }

    /// Fail requests whose prompt contains `needle`
    pub fn fail_when(self, needle: impl Into<String>) -> Self {
        self.rule(vec![needle.into()], Scripted::Fail)
    }

    fn rule(mut self, needles: Vec<String>, outcome: Scripted) -> Self {
        self.rules.push(Rule { needles, outcome });
        self
    }

    /// Every request received, oldest first
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Requests whose last message contains `needle`
    pub fn calls_containing(&self, needle: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.messages.last().is_some_and(|m| m.content.contains(needle)))
            .count()
    }

    fn scripted_outcome(&self, prompt: &str) -> Scripted {
        if self.should_fail {
            return Scripted::Fail;
        }

        if let Some(rule) = self
            .rules
            .iter()
            .find(|rule| rule.needles.iter().all(|n| prompt.contains(n.as_str())))
        {
            return rule.outcome.clone();
        }

        let index = self.current_response.fetch_add(1, Ordering::SeqCst);
        match self.responses.len() {
            0 => Scripted::Reply("Mock response".to_string()),
            len => Scripted::Reply(self.responses[index % len].clone()),
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn available_models(&self) -> Vec<String> {
        vec!["mock-model".to_string()]
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let content = match self.scripted_outcome(&prompt) {
            Scripted::Reply(content) => content,
            Scripted::Fail => return Err(LlmError::RequestFailed("Mock LLM failure".to_string())),
        };

        Ok(CompletionResponse {
            content: Some(content),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            metadata: HashMap::new(),
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            Err(LlmError::RequestFailed(
                "Mock health check failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Mock task source for testing
#[derive(Debug, Default)]
pub struct MockTaskSource {
    batch: TaskBatch,
    error: Option<TaskSourceError>,
    fetches: AtomicUsize,
}

impl MockTaskSource {
    pub fn new(batch: TaskBatch) -> Self {
        Self {
            batch,
            ..Self::default()
        }
    }

    /// Tasks with every project resolved to `project_name`
    pub fn with_tasks(tasks: Vec<Task>, project_name: &str) -> Self {
        let project_names = tasks
            .iter()
            .map(|t| (t.project_id.clone(), project_name.to_string()))
            .collect();
        Self::new(TaskBatch {
            tasks,
            project_names,
        })
    }

    pub fn failing(error: TaskSourceError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskSource for MockTaskSource {
    async fn fetch_tasks(&self) -> Result<TaskBatch, TaskSourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(self.batch.clone()),
        }
    }
}

/// Mock web search for testing
#[derive(Debug, Default)]
pub struct MockWebSearch {
    hits: Vec<SearchHit>,
    should_fail: bool,
    queries: Mutex<Vec<String>>,
}

impl MockWebSearch {
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .map(|queries| queries.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl WebSearch for MockWebSearch {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }

        if self.should_fail {
            Err(SearchError::Request("Mock search failure".to_string()))
        } else {
            Ok(self.hits.clone())
        }
    }
}
