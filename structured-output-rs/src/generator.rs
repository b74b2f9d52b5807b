//! The structured-output retry loop
//!
//! Each attempt runs the same cycle: call the backend, extract a JSON object from
//! its text, parse it, validate it against the schema, record the attempt. The
//! first valid object wins. Only running out of attempts is reported as an
//! error, and that error carries the whole trace.

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::backend::{BackendOutcome, GenerationBackend, GenerationRequest};
use crate::error::{GenerationError, Result};
use crate::extract::{GreedyBraceExtractor, JsonExtractor};
use crate::resilience::{pause, RetryPolicy};
use crate::schema::OutputSchema;
use crate::trace::{AttemptRecord, AttemptTrace, FailureKind};
use crate::util::{measure_time_async, truncate_string};

/// Error text recorded when the output holds nothing that looks like an object
pub const NO_JSON_FOUND: &str = "no JSON object found in backend output";

/// A schema-valid object together with the text it came from
#[derive(Debug, Clone)]
pub struct StructuredOutput {
    /// The parsed object, keys in the order the model wrote them
    pub value: Value,

    /// Full raw backend text of the successful attempt
    pub raw: String,

    /// Every attempt of this call, the successful one last
    pub trace: AttemptTrace,
}

/// Result of judging one backend outcome
struct Evaluation {
    record: AttemptRecord,
    value: Option<Value>,
}

/// Drives a backend until its output satisfies a schema
#[derive(Clone)]
pub struct StructuredGenerator {
    backend: Arc<dyn GenerationBackend>,
    extractor: Arc<dyn JsonExtractor>,
    policy: RetryPolicy,
}

impl StructuredGenerator {
    /// Greedy extraction and the default policy (3 attempts, 1s apart)
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            extractor: Arc::new(GreedyBraceExtractor),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_extractor(mut self, extractor: impl JsonExtractor + 'static) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run the retry loop for one request.
    ///
    /// Returns the first valid object, or [`GenerationError::Exhausted`] holding
    /// `max_attempts` records. Configuration errors are returned before the
    /// backend is ever called.
    pub async fn generate_structured(
        &self,
        request: &GenerationRequest,
        schema: &OutputSchema,
    ) -> Result<StructuredOutput> {
        self.policy.validate()?;

        let max_attempts = self.policy.max_attempts;
        let mut trace = AttemptTrace::with_limit(max_attempts);
        let mut pauses = self.policy.pauses();

        for attempt in 1..=max_attempts {
            let (outcome, elapsed) =
                measure_time_async(|| self.backend.generate(request)).await;
            debug!(
                "Attempt {}/{} via {} finished in {:?}",
                attempt,
                max_attempts,
                self.backend.name(),
                elapsed
            );

            let Evaluation { record, value } =
                evaluate(attempt, &outcome, self.extractor.as_ref(), schema);
            let raw = record.full_output.clone();
            let error = record.error.clone();
            trace.push(record);

            if let Some(value) = value {
                info!("Valid structured output on attempt {}/{}", attempt, max_attempts);
                return Ok(StructuredOutput { value, raw, trace });
            }

            warn!(
                "Attempt {}/{} invalid: {}",
                attempt,
                max_attempts,
                truncate_string(&error, 256)
            );

            if attempt < max_attempts {
                pause(&mut pauses).await;
            }
        }

        Err(GenerationError::Exhausted {
            max_attempts,
            trace,
        })
    }
}

/// Shorthand for a one-off call with an explicit policy
pub async fn generate_structured(
    backend: Arc<dyn GenerationBackend>,
    request: &GenerationRequest,
    schema: &OutputSchema,
    policy: RetryPolicy,
) -> Result<StructuredOutput> {
    StructuredGenerator::new(backend)
        .with_policy(policy)
        .generate_structured(request, schema)
        .await
}

/// Extract, parse and validate one backend outcome.
///
/// Missing or unparseable JSON is validated as an empty object, so a schema with
/// no requirements still accepts it. The recorded error names the earliest
/// stage that went wrong.
fn evaluate(
    attempt: u32,
    outcome: &BackendOutcome,
    extractor: &dyn JsonExtractor,
    schema: &OutputSchema,
) -> Evaluation {
    let full_output = outcome.raw_text().to_string();
    let backend_error = outcome.failure_reason().map(str::to_string);

    let (raw_json, parsed, stage_issue) = match extractor.extract(&full_output) {
        None => {
            let issue = match outcome.failure_reason() {
                Some(reason) => (FailureKind::Backend, format!("backend failed: {}", reason)),
                None => (FailureKind::Extraction, NO_JSON_FOUND.to_string()),
            };
            (String::new(), empty_object(), Some(issue))
        }
        Some(candidate) => match serde_json::from_str::<Value>(candidate) {
            Ok(value) => (candidate.to_string(), value, None),
            Err(e) => (
                candidate.to_string(),
                empty_object(),
                Some((FailureKind::Parse, format!("invalid JSON: {}", e))),
            ),
        },
    };

    match schema.validate(&parsed) {
        Ok(()) => Evaluation {
            record: AttemptRecord::succeeded(attempt, raw_json, full_output)
                .with_backend_error(backend_error),
            value: Some(parsed),
        },
        Err(validation_error) => {
            let (kind, error) =
                stage_issue.unwrap_or((FailureKind::Validation, validation_error));
            Evaluation {
                record: AttemptRecord::failed(attempt, kind, error, raw_json, full_output)
                    .with_backend_error(backend_error),
                value: None,
            }
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
