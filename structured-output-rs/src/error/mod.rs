//! Error handling for structured generation
//!
//! Per-attempt failures (backend, extraction, parsing, validation) never leave
//! the retry loop; they are recorded in the [`AttemptTrace`]. The variants here
//! are the failures a caller can actually observe:
//! - bad configuration or request input, rejected before the first attempt
//! - schemas that do not compile
//! - exhaustion of every attempt, carrying the full trace

use thiserror::Error;

use crate::trace::AttemptTrace;

/// Result type for structured generation operations
pub type Result<T> = std::result::Result<T, GenerationError>;

/// Main error type for structured generation
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The request was rejected before the backend was called
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The output schema could not be compiled
    #[error("Schema error: {0}")]
    Schema(String),

    /// The backend could not be reached or built
    #[error("Backend error: {0}")]
    Backend(String),

    /// Response parsing errors outside the retry loop
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// Every attempt produced invalid output
    #[error("Failed to get valid structured output after {max_attempts} attempts")]
    Exhausted {
        max_attempts: u32,
        trace: AttemptTrace,
    },
}

impl GenerationError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        GenerationError::Configuration(message.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        GenerationError::InvalidRequest(message.into())
    }

    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        GenerationError::Schema(message.into())
    }

    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        GenerationError::Backend(message.into())
    }

    /// Create a parsing error
    pub fn parsing(message: impl Into<String>) -> Self {
        GenerationError::Parsing(message.into())
    }

    /// The attempt trace, when the error came out of the retry loop
    pub fn trace(&self) -> Option<&AttemptTrace> {
        match self {
            GenerationError::Exhausted { trace, .. } => Some(trace),
            _ => None,
        }
    }

    /// Consume the error and keep only its trace
    pub fn into_trace(self) -> Option<AttemptTrace> {
        match self {
            GenerationError::Exhausted { trace, .. } => Some(trace),
            _ => None,
        }
    }

    /// Check if this error came from running out of attempts
    pub fn is_exhausted(&self) -> bool {
        matches!(self, GenerationError::Exhausted { .. })
    }
}

/// Convert reqwest errors to GenerationError
impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::backend(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            GenerationError::backend(format!("Connection error: {}", err))
        } else if err.is_decode() {
            GenerationError::parsing(format!("Response decode error: {}", err))
        } else if let Some(status) = err.status() {
            GenerationError::backend(format!("HTTP {}: {}", status.as_u16(), err))
        } else {
            GenerationError::backend(format!("HTTP client error: {}", err))
        }
    }
}

/// Convert serde_json errors to GenerationError
impl From<serde_json::Error> for GenerationError {
    fn from(err: serde_json::Error) -> Self {
        GenerationError::parsing(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_names_attempts() {
        let err = GenerationError::Exhausted {
            max_attempts: 3,
            trace: AttemptTrace::with_limit(3),
        };
        assert_eq!(
            err.to_string(),
            "Failed to get valid structured output after 3 attempts"
        );
        assert!(err.is_exhausted());
        assert!(err.trace().is_some());
    }

    #[test]
    fn test_non_loop_errors_have_no_trace() {
        let err = GenerationError::invalid_request("prompt must not be empty");
        assert!(err.trace().is_none());
        assert!(!err.is_exhausted());
        assert_eq!(err.to_string(), "Invalid request: prompt must not be empty");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: GenerationError = json_err.into();
        assert!(matches!(err, GenerationError::Parsing(_)));
    }
}
