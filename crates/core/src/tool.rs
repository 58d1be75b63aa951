//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what let the agent act: translate text, detect a language,
//! remember facts about the user. Every tool declares a JSON schema for its
//! input, and that schema doubles as the default argument validator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// The normalized failure classes a tool call can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Arguments could not be parsed or failed validation; the tool never ran.
    InvalidArguments,
    /// The tool ran and failed, panicked, or timed out.
    ExecutionFailed,
    /// No tool is registered under the requested name.
    NotFound,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArguments => "invalid_arguments",
            Self::ExecutionFailed => "execution_failed",
            Self::NotFound => "not_found",
        }
    }
}

/// Error details attached to a failed [`ToolResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: ToolErrorKind,
    pub message: String,
}

/// The result of a tool execution.
///
/// Produced only by the registry/executor; a tool's own error or panic is
/// always folded into one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub ok: bool,

    /// Structured output (`null` on failure)
    #[serde(default)]
    pub value: Value,

    /// Failure details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolFailure>,
}

impl ToolResult {
    pub fn success(value: Value) -> Self {
        Self { ok: true, value, error: None }
    }

    pub fn failure(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            value: Value::Null,
            error: Some(ToolFailure { kind, message: message.into() }),
        }
    }

    pub fn from_error(err: &ToolError) -> Self {
        Self::failure(err.kind(), err.to_string())
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Render as the content of a `tool` message.
    ///
    /// Successful object values are sent as-is; scalars and arrays are
    /// wrapped as `{"result": ...}`. Failures become `{"error": {...}}`.
    /// Object keys serialize in sorted order, so equal results always render
    /// to equal strings.
    pub fn to_content(&self) -> String {
        let payload = if self.ok {
            match &self.value {
                Value::Object(_) => self.value.clone(),
                other => serde_json::json!({ "result": other }),
            }
        } else {
            serde_json::json!({ "error": self.error })
        };
        payload.to_string()
    }
}

/// The core Tool trait.
///
/// Each tool (adaptive_translation, detect_language, memory, ...)
/// implements this trait. Tools are registered in the
/// [`ToolRegistry`](crate::registry::ToolRegistry) and made available to the
/// tool loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "adaptive_translation").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Disabled tools stay registered but are not advertised to the model.
    fn enabled(&self) -> bool {
        true
    }

    /// Check arguments before invocation.
    ///
    /// Default implementation validates against [`Tool::parameters_schema`].
    fn validate(&self, arguments: &Value) -> std::result::Result<(), ToolError> {
        validate_arguments(&self.parameters_schema(), arguments).map_err(ToolError::InvalidArguments)
    }

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, arguments: Value) -> std::result::Result<Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Validate a JSON value against the subset of JSON Schema tools use:
/// top-level `type`, `required`, per-property `type` and `enum`.
///
/// Properties not declared in the schema are accepted.
pub fn validate_arguments(schema: &Value, arguments: &Value) -> std::result::Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !matches_type(expected, arguments) {
            return Err(format!("expected {expected}, got {}", type_name(arguments)));
        }
    }

    let Some(object) = arguments.as_object() else {
        return Ok(());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            match object.get(field) {
                None | Some(Value::Null) => return Err(format!("missing required field '{field}'")),
                _ => {}
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (key, value) in object {
        let Some(prop) = properties.get(key) else { continue };
        if value.is_null() {
            continue;
        }
        if let Some(expected) = prop.get("type").and_then(Value::as_str) {
            if !matches_type(expected, value) {
                return Err(format!(
                    "field '{key}' must be {expected}, got {}",
                    type_name(value)
                ));
            }
        }
        if let Some(allowed) = prop.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                return Err(format!("field '{key}' must be one of {}", Value::Array(allowed.clone())));
            }
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" },
                "action": { "type": "string", "enum": ["add", "get"] },
                "limit": { "type": "integer" }
            },
            "required": ["text"]
        })
    }

    #[test]
    fn validation_accepts_well_formed_arguments() {
        assert!(validate_arguments(&schema(), &json!({"text": "dog", "action": "add", "limit": 3})).is_ok());
        assert!(validate_arguments(&schema(), &json!({"text": "dog", "extra": true})).is_ok());
    }

    #[test]
    fn validation_reports_missing_and_mistyped_fields() {
        let err = validate_arguments(&schema(), &json!({})).unwrap_err();
        assert!(err.contains("text"));

        let err = validate_arguments(&schema(), &json!({"text": 5})).unwrap_err();
        assert!(err.contains("must be string"));

        let err = validate_arguments(&schema(), &json!({"text": "x", "action": "drop"})).unwrap_err();
        assert!(err.contains("one of"));

        let err = validate_arguments(&schema(), &json!({"text": "x", "limit": 1.5})).unwrap_err();
        assert!(err.contains("integer"));

        let err = validate_arguments(&schema(), &json!(["text"])).unwrap_err();
        assert!(err.contains("expected object"));
    }

    #[test]
    fn result_content_is_stable_json() {
        let ok = ToolResult::success(json!({"translated": "собака", "dataset": "d"}));
        assert_eq!(ok.to_content(), r#"{"dataset":"d","translated":"собака"}"#);

        let scalar = ToolResult::success(json!(42));
        assert_eq!(scalar.to_content(), r#"{"result":42}"#);

        let failed = ToolResult::failure(ToolErrorKind::ExecutionFailed, "boom");
        assert_eq!(
            failed.to_content(),
            r#"{"error":{"kind":"execution_failed","message":"boom"}}"#
        );
        assert_eq!(failed.error_kind(), Some(ToolErrorKind::ExecutionFailed));
    }

    #[test]
    fn result_from_tool_error() {
        let result = ToolResult::from_error(&ToolError::InvalidArguments("bad".into()));
        assert!(!result.ok);
        assert_eq!(result.error_kind(), Some(ToolErrorKind::InvalidArguments));
        assert!(result.value.is_null());
    }
}
