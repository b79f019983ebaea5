//! Argument validation against declared tool schemas

use serde_json::Value;
use thiserror::Error;

/// Validation failure, with one message per violation
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", .violations.join("; "))]
pub struct SchemaError {
    pub violations: Vec<String>,
}

impl SchemaError {
    pub fn new(violation: impl Into<String>) -> Self {
        Self {
            violations: vec![violation.into()],
        }
    }
}

/// Pluggable validation collaborator.
///
/// Returns the arguments the tool should receive, or the reasons they were
/// rejected.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, schema: &Value, args: Value) -> Result<Value, SchemaError>;
}

/// JSON Schema validation backed by the `jsonschema` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSchemaValidator;

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, schema: &Value, args: Value) -> Result<Value, SchemaError> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| SchemaError::new(format!("invalid schema: {e}")))?;

        let violations: Vec<String> = validator
            .iter_errors(&args)
            .map(|e| {
                let path = e.instance_path().to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{path}: {e}")
                }
            })
            .collect();

        if violations.is_empty() {
            Ok(args)
        } else {
            Err(SchemaError { violations })
        }
    }
}
