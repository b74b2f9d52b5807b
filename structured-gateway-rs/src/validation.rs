//! Request validation for the gateway
//!
//! Run requests are checked against a JSON Schema before they reach the
//! session, and string fields are cleaned of control characters.

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use serde_json::{json, Value};

/// Maximum request payload size (1MB)
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Longest prompt accepted from the UI, in characters
pub const MAX_PROMPT_CHARS: usize = 16 * 1024;

/// Schema for run requests
pub static RUN_REQUEST_SCHEMA: Lazy<JSONSchema> = Lazy::new(|| {
    let schema = json!({
        "type": "object",
        "required": ["prompt"],
        "properties": {
            "prompt": {
                "type": "string",
                "maxLength": MAX_PROMPT_CHARS
            },
            "model_path": {
                "type": ["string", "null"],
                "maxLength": 4096
            }
        },
        "additionalProperties": false
    });

    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema)
        .expect("Invalid schema")
});

/// Error response for validation failures
#[derive(Debug, serde::Serialize)]
pub struct ValidationErrorResponse {
    pub error: String,
    pub code: u16,
    pub details: Option<Vec<String>>,
}

/// Validation error for API requests
#[derive(Debug, thiserror::Error)]
pub enum ApiValidationError {
    #[error("Invalid request format: {0}")]
    InvalidFormat(String),

    #[error("Content type must be {0}")]
    ContentType(String),

    #[error("Request payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Schema validation error: {0}")]
    Schema(String),
}

impl ApiValidationError {
    /// Convert to HTTP status code and error response
    pub fn to_response(&self) -> (StatusCode, Json<ValidationErrorResponse>) {
        let (status, code) = match self {
            Self::InvalidFormat(_) => (StatusCode::BAD_REQUEST, 400),
            Self::ContentType(_) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, 415),
            Self::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, 413),
            Self::Schema(_) => (StatusCode::BAD_REQUEST, 400),
        };

        (
            status,
            Json(ValidationErrorResponse {
                error: self.to_string(),
                code,
                details: None,
            }),
        )
    }
}

/// Validate the Content-Type header
pub fn validate_content_type(headers: &HeaderMap, expected: &str) -> Result<(), ApiValidationError> {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !content_type.starts_with(expected) {
        return Err(ApiValidationError::ContentType(format!(
            "Expected content type '{}', got '{}'",
            expected, content_type
        )));
    }

    Ok(())
}

/// Parse a request body into JSON
pub fn parse_json_body(body: &[u8]) -> Result<Value, ApiValidationError> {
    if body.len() > MAX_PAYLOAD_SIZE {
        return Err(ApiValidationError::PayloadTooLarge(format!(
            "Payload size ({} bytes) exceeds maximum allowed size ({} bytes)",
            body.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    let text = std::str::from_utf8(body).map_err(|_| {
        ApiValidationError::InvalidFormat("Request body is not valid UTF-8".to_string())
    })?;

    serde_json::from_str::<Value>(text.trim())
        .map_err(|e| ApiValidationError::InvalidFormat(format!("Invalid JSON: {}", e)))
}

/// Validate a run request against its schema
pub fn validate_run_request(json: &Value) -> Result<(), ApiValidationError> {
    if let Err(errors) = RUN_REQUEST_SCHEMA.validate(json) {
        let error_details: Vec<String> = errors
            .map(|err| {
                let location = err.instance_path.to_string();
                if location.is_empty() {
                    err.to_string()
                } else {
                    format!("{} at {}", err, location)
                }
            })
            .collect();

        return Err(ApiValidationError::Schema(if error_details.is_empty() {
            "Schema validation failed".to_string()
        } else {
            error_details.join("; ")
        }));
    }

    Ok(())
}

/// Strip null bytes and control characters (other than line breaks and tabs)
/// from every string value, recursively
pub fn sanitize_json_object(value: &mut Value) {
    match value {
        Value::String(s) => {
            if s.chars().any(|c| c.is_control() && !matches!(c, '\n' | '\t' | '\r')) {
                *s = s
                    .chars()
                    .filter(|&c| !c.is_control() || matches!(c, '\n' | '\t' | '\r'))
                    .collect();
            }
        }
        Value::Array(arr) => {
            for item in arr {
                sanitize_json_object(item);
            }
        }
        Value::Object(obj) => {
            for (_, val) in obj {
                sanitize_json_object(val);
            }
        }
        _ => {}
    }
}

/// Generate middleware config for payload limits
pub fn payload_limit_config() -> tower_http::limit::RequestBodyLimitLayer {
    tower_http::limit::RequestBodyLimitLayer::new(MAX_PAYLOAD_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_validate_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json; charset=utf-8"));

        assert!(validate_content_type(&headers, "application/json").is_ok());
        assert!(validate_content_type(&headers, "text/plain").is_err());
        assert!(validate_content_type(&HeaderMap::new(), "application/json").is_err());
    }

    #[test]
    fn test_validate_run_request() {
        let valid = json!({"prompt": "What is 2+2?", "model_path": "models/q.gguf"});
        let no_model = json!({"prompt": "What is 2+2?"});
        let missing_prompt = json!({"model_path": "models/q.gguf"});
        let extra_field = json!({"prompt": "hi", "temperature": 0.7});

        assert!(validate_run_request(&valid).is_ok());
        assert!(validate_run_request(&no_model).is_ok());
        assert!(validate_run_request(&missing_prompt).is_err());
        assert!(validate_run_request(&extra_field).is_err());
    }

    #[test]
    fn test_parse_json_body() {
        assert!(parse_json_body(b"  {\"prompt\": \"hi\"}\n").is_ok());
        assert!(matches!(
            parse_json_body(b"{\"prompt\": "),
            Err(ApiValidationError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_json_body(&[0xff, 0xfe]),
            Err(ApiValidationError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_sanitize_json_object() {
        let mut value = json!({
            "prompt": "What\u{0000} is\u{0007} 2+2?\nShow steps.",
            "nested": ["ok\u{001b}"]
        });
        sanitize_json_object(&mut value);

        assert_eq!(value["prompt"], "What is 2+2?\nShow steps.");
        assert_eq!(value["nested"][0], "ok");
    }
}
