//! Query surface over the retry loop
//!
//! A session answers the two questions a UI asks: "run this prompt" and "what
//! happened on the last run". The last trace belongs to the session, so two
//! sessions never see each other's attempts.

use log::info;
use tokio::sync::RwLock;

use crate::backend::GenerationRequest;
use crate::error::{GenerationError, Result};
use crate::generator::{StructuredGenerator, StructuredOutput};
use crate::prompt::FewShotPrompt;
use crate::schema::OutputSchema;
use crate::trace::{AttemptTrace, NO_ATTEMPTS_MESSAGE};
use crate::util::generate_run_id;

pub struct StructuredSession {
    generator: StructuredGenerator,
    schema: OutputSchema,
    prompt: FewShotPrompt,
    system_prompt: Option<String>,
    last_trace: RwLock<Option<AttemptTrace>>,
}

impl StructuredSession {
    /// Session with the math-answer schema and the math-solver preamble
    pub fn new(generator: StructuredGenerator) -> Self {
        Self::with_schema(generator, OutputSchema::math_answer(), FewShotPrompt::default())
    }

    pub fn with_schema(
        generator: StructuredGenerator,
        schema: OutputSchema,
        prompt: FewShotPrompt,
    ) -> Self {
        Self {
            generator,
            schema,
            prompt,
            system_prompt: None,
            last_trace: RwLock::new(None),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn schema(&self) -> &OutputSchema {
        &self.schema
    }

    pub fn backend_name(&self) -> &'static str {
        self.generator.backend_name()
    }

    /// Run the loop and keep its trace. Input errors leave no trace behind.
    pub async fn run_structured(&self, prompt: &str, model: &str) -> Result<StructuredOutput> {
        *self.last_trace.write().await = None;

        if prompt.trim().is_empty() {
            return Err(GenerationError::invalid_request("prompt must not be empty"));
        }
        if model.trim().is_empty() {
            return Err(GenerationError::invalid_request("model path must not be empty"));
        }

        let mut request = GenerationRequest::new(self.prompt.render(prompt), model.trim())?;
        if let Some(ref system) = self.system_prompt {
            request = request.with_system_prompt(system.clone());
        }

        let run_id = generate_run_id();
        info!(
            "Run {} started: backend={}, model={}, {}",
            run_id,
            self.generator.backend_name(),
            request.model(),
            self.generator.policy()
        );

        let result = self.generator.generate_structured(&request, &self.schema).await;

        let trace = match &result {
            Ok(output) => Some(output.trace.clone()),
            Err(err) => err.trace().cloned(),
        };
        if let Some(ref trace) = trace {
            info!("Run {} finished after {} attempt(s)", run_id, trace.len());
        }
        *self.last_trace.write().await = trace;

        result
    }

    /// "Run": formatted structured result, or `Error: ...`
    pub async fn run(&self, prompt: &str, model: &str) -> String {
        match self.run_structured(prompt, model).await {
            Ok(output) => format_success(&output),
            Err(err) => format_error(&err),
        }
    }

    /// "Show trace": the last run's attempts as pretty JSON, or the sentinel
    pub async fn show_trace(&self) -> String {
        match self.last_trace.read().await.as_ref() {
            Some(trace) if !trace.is_empty() => trace.to_pretty_json(),
            _ => NO_ATTEMPTS_MESSAGE.to_string(),
        }
    }

    pub async fn last_trace(&self) -> Option<AttemptTrace> {
        self.last_trace.read().await.clone()
    }
}

/// Pretty structured output followed by the raw model text
pub fn format_success(output: &StructuredOutput) -> String {
    let pretty = serde_json::to_string_pretty(&output.value)
        .unwrap_or_else(|_| output.value.to_string());
    format!(
        "Structured Output:\n{}\n\nRaw LLM Output:\n{}",
        pretty, output.raw
    )
}

pub fn format_error(err: &GenerationError) -> String {
    format!("Error: {}", err)
}
