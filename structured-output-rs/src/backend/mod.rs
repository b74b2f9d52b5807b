//! Generation backends
//!
//! A backend turns a [`GenerationRequest`] into raw model text. It never returns
//! an error: failures come back as [`BackendOutcome::Failed`] so the retry loop
//! can record them and move on.
//!
//! - [`LlamaCliBackend`]: spawns a local `llama-cli` process
//! - [`OpenAiCompatBackend`]: talks to an OpenAI-compatible local server

pub mod llama_cli;
pub mod openai_compat;

pub use llama_cli::LlamaCliBackend;
pub use openai_compat::OpenAiCompatBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, Result};

/// One generation call. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    prompt: String,
    system_prompt: Option<String>,
    /// Model file path or server-side model name
    model: String,
}

impl GenerationRequest {
    /// Build a request. The prompt must contain something other than whitespace.
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(GenerationError::invalid_request("prompt must not be empty"));
        }
        Ok(Self {
            prompt,
            system_prompt: None,
            model: model.into(),
        })
    }

    /// Attach a system prompt. Blank strings are ignored.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        self.system_prompt = if system_prompt.trim().is_empty() {
            None
        } else {
            Some(system_prompt)
        };
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// What a backend call produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutcome {
    /// Text on the primary channel; `diagnostics` is whatever the side channel said
    Completed { text: String, diagnostics: String },

    /// Nothing usable on the primary channel
    Failed { reason: String, diagnostics: String },
}

impl BackendOutcome {
    pub fn completed(text: impl Into<String>) -> Self {
        BackendOutcome::Completed {
            text: text.into(),
            diagnostics: String::new(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        BackendOutcome::Failed {
            reason: reason.into(),
            diagnostics: String::new(),
        }
    }

    /// Text the extractor should scan. A failed call falls back to its
    /// diagnostic output, which is empty when the backend said nothing at all.
    pub fn raw_text(&self) -> &str {
        match self {
            BackendOutcome::Completed { text, .. } => text,
            BackendOutcome::Failed { diagnostics, .. } => diagnostics,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            BackendOutcome::Completed { .. } => None,
            BackendOutcome::Failed { reason, .. } => Some(reason),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, BackendOutcome::Failed { .. })
    }
}

/// External text-generation service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Backend identifier used in logs
    fn name(&self) -> &'static str;

    /// Run one generation. Must not panic on backend errors.
    async fn generate(&self, request: &GenerationRequest) -> BackendOutcome;
}
