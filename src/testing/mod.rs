//! Testing utilities and mock implementations
//!
//! Mocks for the pipeline's three outbound collaborators: the language model,
//! the task source and web search.

pub mod mocks;

pub use mocks::*;
