//! Pluggable schema check for configuration writes.
//!
//! Writers run every incoming file through the validator before a
//! transaction opens. Schemas are registered by name; regex rules route a
//! file name to the schema that governs it. Files no rule matches are
//! accepted unchanged.

use jsonschema::Validator;
use regex::Regex;
use thiserror::Error;

/// error surfaced to the write path when a file fails its schema
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// the schema document itself failed to compile
    #[error("invalid schema '{name}': {message}")]
    InvalidSchema { name: String, message: String },

    /// a routing rule references a schema that was never registered
    #[error("rule '{pattern}' references unknown schema '{name}'")]
    UnknownSchema { pattern: String, name: String },

    /// the routing pattern is not a valid regex
    #[error("invalid rule pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// the file content failed validation; one diagnostic per violation
    #[error("validation of '{file}' failed:\n{}", .diagnostics.join("\n"))]
    ValidationFailed {
        file: String,
        diagnostics: Vec<String>,
    },
}

pub type ValidatorResult<T> = Result<T, ValidatorError>;

struct Rule {
    pattern: Regex,
    schema_index: usize,
}

/// Validates configuration files against registered JSON Schemas.
///
/// Built once at startup and shared read-only across requests.
#[derive(Default)]
pub struct SchemaValidator {
    names: Vec<String>,
    schemas: Vec<Validator>,
    rules: Vec<Rule>,
}

impl SchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema document under `name`.
    pub fn add_schema(&mut self, name: &str, schema: &serde_json::Value) -> ValidatorResult<()> {
        let compiled =
            jsonschema::validator_for(schema).map_err(|e| ValidatorError::InvalidSchema {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        self.names.push(name.to_string());
        self.schemas.push(compiled);
        Ok(())
    }

    /// Associate file names matching `pattern` with the schema `name`.
    ///
    /// Rules are consulted in registration order; the first match wins.
    pub fn add_rule(&mut self, pattern: &str, name: &str) -> ValidatorResult<()> {
        let schema_index = self.names.iter().position(|n| n == name).ok_or_else(|| {
            ValidatorError::UnknownSchema {
                pattern: pattern.to_string(),
                name: name.to_string(),
            }
        })?;
        let pattern = Regex::new(pattern).map_err(|e| ValidatorError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        self.rules.push(Rule {
            pattern,
            schema_index,
        });
        Ok(())
    }

    /// Check `bytes` against the schema governing `file_name`.
    ///
    /// Files without a matching rule are accepted. Content that is not
    /// valid JSON is rejected with the parser diagnostic; schema
    /// violations are accumulated, one line per violation.
    pub fn validate(&self, file_name: &str, bytes: &[u8]) -> ValidatorResult<()> {
        let Some(rule) = self.rules.iter().find(|r| r.pattern.is_match(file_name)) else {
            return Ok(());
        };

        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| ValidatorError::ValidationFailed {
                file: file_name.to_string(),
                diagnostics: vec![format!("not valid JSON: {}", e)],
            })?;

        let schema = &self.schemas[rule.schema_index];
        let diagnostics: Vec<String> = schema
            .iter_errors(&value)
            .map(|err| format!("{}: {}", err.instance_path, err))
            .collect();

        if diagnostics.is_empty() {
            Ok(())
        } else {
            Err(ValidatorError::ValidationFailed {
                file: file_name.to_string(),
                diagnostics,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gateway_validator() -> SchemaValidator {
        let mut v = SchemaValidator::new();
        v.add_schema(
            "gateway",
            &json!({
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": {"type": "string"},
                    "port": {"type": "integer", "minimum": 1}
                }
            }),
        )
        .unwrap();
        v.add_rule(r"^gateways/", "gateway").unwrap();
        v
    }

    #[test]
    fn test_unmatched_files_are_accepted() {
        let v = gateway_validator();
        assert!(v.validate("notes/readme", b"anything at all").is_ok());
    }

    #[test]
    fn test_valid_document_passes() {
        let v = gateway_validator();
        let doc = br#"{"name": "edge", "port": 8080}"#;
        assert!(v.validate("gateways/edge", doc).is_ok());
    }

    #[test]
    fn test_syntax_error_is_rejected_with_diagnostic() {
        let v = gateway_validator();
        let err = v.validate("gateways/edge", b"{nope").unwrap_err();
        match err {
            ValidatorError::ValidationFailed { diagnostics, .. } => {
                assert_eq!(diagnostics.len(), 1);
                assert!(diagnostics[0].contains("not valid JSON"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_violations_are_accumulated() {
        let v = gateway_validator();
        // missing required "name", bad "port" type
        let err = v
            .validate("gateways/edge", br#"{"port": "eighty"}"#)
            .unwrap_err();
        match err {
            ValidatorError::ValidationFailed { diagnostics, .. } => {
                assert!(diagnostics.len() >= 2, "got: {diagnostics:?}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let mut v = SchemaValidator::new();
        v.add_schema("strict", &json!({"type": "object"})).unwrap();
        v.add_schema("loose", &json!(true)).unwrap();
        v.add_rule(r"^conf/", "strict").unwrap();
        v.add_rule(r"conf", "loose").unwrap();

        // matches both rules; the first (strict) applies
        assert!(v.validate("conf/a", b"[1, 2]").is_err());
    }

    #[test]
    fn test_rule_for_unknown_schema() {
        let mut v = SchemaValidator::new();
        let result = v.add_rule(r".*", "ghost");
        assert!(matches!(result, Err(ValidatorError::UnknownSchema { .. })));
    }

    #[test]
    fn test_bad_pattern() {
        let mut v = SchemaValidator::new();
        v.add_schema("any", &json!(true)).unwrap();
        let result = v.add_rule(r"([unclosed", "any");
        assert!(matches!(result, Err(ValidatorError::InvalidPattern { .. })));
    }
}
