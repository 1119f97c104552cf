//! Validation functions for environment state files
//!
//! Every load validates the raw JSON document against a JSON Schema before it
//! is deserialized, so a structurally invalid file is reported with the exact
//! offending paths instead of a generic parse failure.

use crate::error::{Error, Result};
use jsonschema::{ValidationError, Validator};
use serde_json::{json, Value};

/// Validate a state document, returning every violation found.
///
/// An empty vector means the document is valid.
pub fn validate_state_document(value: &Value) -> Result<Vec<String>> {
    let schema = get_state_schema();
    let compiled = Validator::new(&schema)
        .map_err(|e| Error::Schema(format!("Failed to compile schema: {}", e)))?;

    let violations = match compiled.validate(value) {
        Ok(()) => Vec::new(),
        Err(errors) => errors.map(|e| format_validation_error(&e)).collect(),
    };

    Ok(violations)
}

/// Format a validation error into a readable string
fn format_validation_error(error: &ValidationError) -> String {
    let path = error.instance_path.to_string();
    if path.is_empty() {
        format!("(root): {}", error)
    } else {
        format!("{}: {}", path, error)
    }
}

/// Get the environment state JSON Schema
fn get_state_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["satellites"],
        "properties": {
            "satellites": {
                "type": "object",
                "propertyNames": { "minLength": 1 },
                "additionalProperties": {
                    "$ref": "#/$defs/satellite"
                }
            }
        },
        "$defs": {
            "satellite": {
                "type": "object",
                "required": ["contractAddress"],
                "properties": {
                    "contractAddress": {
                        "type": "string"
                    },
                    "connections": {
                        "type": "object",
                        "propertyNames": { "minLength": 1 },
                        "additionalProperties": {
                            "type": "object"
                        }
                    }
                }
            }
        }
    })
}
