//! Attempt trace
//!
//! One [`AttemptRecord`] per backend call, appended in invocation order. Records
//! are immutable once pushed and the trace refuses to grow past its limit.

use serde::{Deserialize, Serialize};

/// Sentinel returned when no run has produced a trace yet
pub const NO_ATTEMPTS_MESSAGE: &str = "No debug attempts recorded.";

/// Why an attempt did not produce a valid object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The backend errored or produced nothing on its primary channel
    Backend,
    /// No JSON-shaped substring in the output
    Extraction,
    /// The extracted substring was not valid JSON
    Parse,
    /// The parsed value did not satisfy the schema
    Validation,
}

/// Outcome of a single generate/extract/validate cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt index
    pub attempt: u32,

    pub valid: bool,

    /// Empty when the attempt was valid
    pub error: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,

    /// Substring handed to the JSON parser, empty if extraction found nothing
    pub raw_json: String,

    /// Full raw backend text
    pub full_output: String,

    /// Reason given by the backend when it failed outright
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_error: Option<String>,
}

impl AttemptRecord {
    pub fn succeeded(attempt: u32, raw_json: String, full_output: String) -> Self {
        Self {
            attempt,
            valid: true,
            error: String::new(),
            failure: None,
            raw_json,
            full_output,
            backend_error: None,
        }
    }

    pub fn failed(
        attempt: u32,
        failure: FailureKind,
        error: impl Into<String>,
        raw_json: String,
        full_output: String,
    ) -> Self {
        Self {
            attempt,
            valid: false,
            error: error.into(),
            failure: Some(failure),
            raw_json,
            full_output,
            backend_error: None,
        }
    }

    /// Attach the backend's own failure reason
    pub fn with_backend_error(mut self, reason: Option<String>) -> Self {
        self.backend_error = reason;
        self
    }
}

/// Ordered, append-only record of one retry-loop invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptTrace {
    limit: u32,
    records: Vec<AttemptRecord>,
}

impl AttemptTrace {
    /// Create an empty trace that accepts at most `limit` records
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit,
            records: Vec::with_capacity(limit as usize),
        }
    }

    /// Append a record. Returns false, and drops the record, once the limit is reached.
    pub fn push(&mut self, record: AttemptRecord) -> bool {
        if self.records.len() as u32 >= self.limit {
            log::warn!(
                "Attempt trace is full ({} records), dropping attempt {}",
                self.limit,
                record.attempt
            );
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn records(&self) -> &[AttemptRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn last(&self) -> Option<&AttemptRecord> {
        self.records.last()
    }

    /// Index of the first valid attempt, if any
    pub fn first_valid(&self) -> Option<u32> {
        self.records.iter().find(|r| r.valid).map(|r| r.attempt)
    }

    /// Pretty JSON array of the records, the format the debug view shows
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.records).unwrap_or_else(|e| {
            log::error!("Failed to serialize attempt trace: {}", e);
            "[]".to_string()
        })
    }
}
