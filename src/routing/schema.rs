//! Structured output schema for routing decisions
//!
//! The model answers with `{goto, reason, is_complete}`. The answer is
//! checked against the generated JSON schema and then mapped through the
//! closed processor set before anything executes.

use crate::routing::router::{ProcessorKind, RoutingDecision, COMPLETE_SENTINEL};
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::to_value(schemars::schema_for!(RoutingDecisionOutput)).unwrap_or(Value::Null)
});

/// Raw routing answer from the model
///
/// Used with:
/// - OpenAI: JSON Schema with `response_format`
/// - Anthropic and Ollama: JSON requested in the prompt
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RoutingDecisionOutput {
    /// Processor name, or `task_complete`
    pub goto: String,

    /// One sentence explaining the decision
    pub reason: String,

    /// Whether the task needs no further processing
    pub is_complete: bool,
}

impl RoutingDecisionOutput {
    /// JSON schema for this structure
    pub fn json_schema() -> Value {
        SCHEMA.clone()
    }

    /// Parse a model answer, tolerating prose around the JSON object
    pub fn from_model_text(text: &str) -> Result<Self, String> {
        let start = text
            .find('{')
            .ok_or_else(|| "no JSON object in routing answer".to_string())?;
        let end = text
            .rfind('}')
            .filter(|end| *end > start)
            .ok_or_else(|| "unterminated JSON object in routing answer".to_string())?;

        let value: Value = serde_json::from_str(&text[start..=end])
            .map_err(|e| format!("routing answer is not valid JSON: {e}"))?;

        Self::validate_value(&value)?;

        serde_json::from_value(value).map_err(|e| format!("routing answer has wrong shape: {e}"))
    }

    /// Check a JSON value against the generated schema
    pub fn validate_value(value: &Value) -> Result<(), String> {
        let validator = jsonschema::validator_for(&SCHEMA)
            .map_err(|e| format!("routing schema failed to compile: {e}"))?;

        validator.validate(value).map_err(|errors| {
            let messages: Vec<String> = errors
                .map(|e| format!("At '{}': {}", e.instance_path, e))
                .collect();
            format!("routing answer violates schema: {}", messages.join("; "))
        })
    }

    /// Map onto the closed decision set
    ///
    /// # Errors
    ///
    /// Returns error if `goto` names neither a known processor nor the
    /// completion sentinel.
    pub fn into_decision(self) -> Result<RoutingDecision, String> {
        let goto = self.goto.trim();

        if self.is_complete || goto == COMPLETE_SENTINEL {
            return Ok(RoutingDecision::Complete {
                reason: self.reason,
            });
        }

        let processor: ProcessorKind = goto.parse()?;
        Ok(RoutingDecision::Invoke {
            processor,
            reason: self.reason,
        })
    }
}
