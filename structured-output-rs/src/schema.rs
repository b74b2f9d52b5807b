//! Output schema contract
//!
//! Wraps a compiled Draft 7 JSON Schema. The schemas used here are the
//! `{type: object, properties, required}` shape: required keys, each with a
//! primitive type.

use std::fmt;
use std::sync::Arc;

use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Map, Value};

use crate::error::{GenerationError, Result};

/// Primitive JSON types a property can be declared as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
}

impl PrimitiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Number => "number",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Array => "array",
            PrimitiveType::Object => "object",
            PrimitiveType::Null => "null",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled, read-only schema the extracted JSON must satisfy
#[derive(Clone)]
pub struct OutputSchema {
    source: Value,
    compiled: Arc<JSONSchema>,
}

impl fmt::Debug for OutputSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSchema")
            .field("source", &self.source)
            .finish()
    }
}

impl OutputSchema {
    /// Compile a schema from its JSON form
    pub fn from_value(source: Value) -> Result<Self> {
        if !source.is_object() {
            return Err(GenerationError::schema("schema must be a JSON object"));
        }

        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&source)
            .map_err(|e| GenerationError::schema(format!("invalid schema: {}", e)))?;

        Ok(Self {
            source,
            compiled: Arc::new(compiled),
        })
    }

    /// Object schema where every listed key is required with the given type
    pub fn object(fields: &[(&str, PrimitiveType)]) -> Result<Self> {
        let mut properties = Map::new();
        for (key, ty) in fields {
            properties.insert((*key).to_string(), json!({ "type": ty.as_str() }));
        }
        let required: Vec<&str> = fields.iter().map(|(key, _)| *key).collect();

        Self::from_value(json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }))
    }

    /// `problem` and `answer`, both strings
    pub fn math_answer() -> Self {
        Self::object(&[
            ("problem", PrimitiveType::String),
            ("answer", PrimitiveType::String),
        ])
        .expect("math answer schema compiles")
    }

    /// Check an instance. The error joins every validator message with `; `.
    pub fn validate(&self, instance: &Value) -> std::result::Result<(), String> {
        let outcome = self.compiled.validate(instance);
        match outcome {
            Ok(()) => Ok(()),
            Err(errors) => {
                let messages: Vec<String> = errors.map(|err| err.to_string()).collect();
                if messages.is_empty() {
                    Err("Schema validation failed".to_string())
                } else {
                    Err(messages.join("; "))
                }
            }
        }
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.compiled.is_valid(instance)
    }

    /// Keys listed under `required`
    pub fn required_keys(&self) -> Vec<&str> {
        self.source
            .get("required")
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Declared `type` of a property, if it is a single type name
    pub fn property_type(&self, key: &str) -> Option<&str> {
        self.source
            .get("properties")
            .and_then(|props| props.get(key))
            .and_then(|prop| prop.get("type"))
            .and_then(Value::as_str)
    }

    pub fn as_value(&self) -> &Value {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math_answer_accepts_strings() {
        let schema = OutputSchema::math_answer();
        assert!(schema
            .validate(&json!({"problem": "2+2", "answer": "4"}))
            .is_ok());
        assert_eq!(schema.required_keys(), vec!["problem", "answer"]);
        assert_eq!(schema.property_type("answer"), Some("string"));
    }

    #[test]
    fn test_missing_key_is_named() {
        let schema = OutputSchema::object(&[
            ("a", PrimitiveType::String),
            ("b", PrimitiveType::String),
        ])
        .unwrap();

        let err = schema.validate(&json!({"a": "x"})).unwrap_err();
        assert!(err.contains("\"b\""), "unexpected message: {}", err);
        assert!(err.contains("required"));
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let schema = OutputSchema::math_answer();
        let err = schema
            .validate(&json!({"problem": "2+2", "answer": 4}))
            .unwrap_err();
        assert!(err.contains("string"), "unexpected message: {}", err);
        assert!(!schema.is_valid(&json!({"problem": "2+2", "answer": 4})));
    }

    #[test]
    fn test_empty_object_fails_required() {
        let schema = OutputSchema::math_answer();
        assert!(schema.validate(&json!({})).is_err());
    }

    #[test]
    fn test_rejects_non_object_schema() {
        assert!(OutputSchema::from_value(json!("string")).is_err());
        assert!(OutputSchema::from_value(json!(["problem"])).is_err());
    }
}
