//! JSON-Schema argument validation for tool calls. Unknown fields are
//! ignored by the schema itself (callers decide whether to use
//! `additionalProperties: false`); only declared required fields are
//! enforced here.

use serde_json::Value;

/// A compiled schema for one tool's `arguments`.
pub struct ArgumentSchema {
    validator: jsonschema::Validator,
}

/// Raised when `arguments` fails schema validation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("argument schema violation: {}", errors.join("; "))]
pub struct SchemaViolation {
    /// One message per failed constraint, in encounter order.
    pub errors: Vec<String>,
}

impl ArgumentSchema {
    /// Compile `schema` (a JSON Schema document) once, for reuse across
    /// every call to the tool it belongs to.
    pub fn compile(schema: &Value) -> Result<Self, String> {
        let validator = jsonschema::validator_for(schema).map_err(|e| e.to_string())?;
        Ok(Self { validator })
    }

    /// Validate `arguments` against the compiled schema, collecting every
    /// violation rather than stopping at the first.
    pub fn validate(&self, arguments: &Value) -> Result<(), SchemaViolation> {
        let errors: Vec<String> = self.validator.iter_errors(arguments).map(|e| e.to_string()).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaViolation { errors })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn navigate_schema() -> Value {
        json!({
            "type": "object",
            "required": ["sessionId", "url"],
            "properties": {
                "sessionId": {"type": "string"},
                "url": {"type": "string"}
            }
        })
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let schema = ArgumentSchema::compile(&navigate_schema()).unwrap();
        let err = schema.validate(&json!({"sessionId": "s1"})).unwrap_err();
        assert!(!err.errors.is_empty());
    }

    #[test]
    fn valid_arguments_pass() {
        let schema = ArgumentSchema::compile(&navigate_schema()).unwrap();
        assert!(schema.validate(&json!({"sessionId": "s1", "url": "https://example.com"})).is_ok());
    }

    #[test]
    fn unknown_fields_are_ignored_without_additional_properties_false() {
        let schema = ArgumentSchema::compile(&navigate_schema()).unwrap();
        let instance = json!({"sessionId": "s1", "url": "https://example.com", "extra": 1});
        assert!(schema.validate(&instance).is_ok());
    }
}
