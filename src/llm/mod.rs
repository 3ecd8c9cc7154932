//! Language model access
//!
//! Provider-agnostic interface (OpenAI, Anthropic, Ollama) and the
//! [`LlmClient`] every pipeline stage talks to.

pub mod client;
pub mod provider;
pub mod providers;

pub use client::*;
pub use provider::*;
pub use providers::*;
