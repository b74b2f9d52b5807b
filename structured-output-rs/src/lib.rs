//! # Structured Output
//!
//! Schema-constrained generation on top of local language models.
//!
//! This crate provides:
//!
//! - A retry loop that calls a backend, pulls a JSON object out of its text,
//!   validates it against a JSON Schema and retries on failure
//! - A per-call attempt trace for debugging what the model produced
//! - Backends for a local `llama-cli` process and OpenAI-compatible servers
//! - Configuration management utilities
//!
//! ## Architecture
//!
//! - `GenerationBackend`: raw text generation, never fails with an error
//! - `JsonExtractor`: finds the JSON candidate in free-form text
//! - `OutputSchema`: compiled JSON Schema with readable violation messages
//! - `StructuredGenerator`: the retry loop
//! - `StructuredSession`: "run" and "show trace" for a UI
//! - `GenerationError`: the failures a caller can observe

pub mod backend;
pub use backend::{
    BackendOutcome, GenerationBackend, GenerationRequest, LlamaCliBackend, OpenAiCompatBackend,
};

pub mod error;
pub use error::{GenerationError, Result};

pub mod extract;
pub use extract::{BalancedBraceExtractor, GreedyBraceExtractor, JsonExtractor};

pub mod generator;
pub use generator::{generate_structured, StructuredGenerator, StructuredOutput};

pub mod schema;
pub use schema::{OutputSchema, PrimitiveType};

pub mod trace;
pub use trace::{AttemptRecord, AttemptTrace, FailureKind, NO_ATTEMPTS_MESSAGE};

pub mod resilience;
pub use resilience::RetryPolicy;

pub mod config;
pub use config::{ConfigProvider, ServiceConfig};

pub mod session;
pub use session::StructuredSession;

pub mod gpu;
pub mod prompt;

// Utility module for common functionality
mod util;

#[cfg(test)]
mod tests;
