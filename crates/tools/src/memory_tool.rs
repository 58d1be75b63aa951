//! Memory tool: lets the agent manage its notes about the user.

use async_trait::async_trait;
use dekomposit_core::error::ToolError;
use dekomposit_core::memory::MemoryStore;
use dekomposit_core::tool::{Tool, validate_arguments};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

pub struct MemoryTool {
    memory: Arc<dyn MemoryStore>,
}

impl MemoryTool {
    pub fn new(memory: Arc<dyn MemoryStore>) -> Self {
        Self { memory }
    }

    async fn snapshot(&self, status: &str, message: Option<String>) -> Value {
        let notes: Vec<Value> = self
            .memory
            .notes()
            .await
            .into_iter()
            .map(|n| json!({ "id": n.id, "text": n.text }))
            .collect();
        let history_size = self.memory.history().await.len();
        let mut out = json!({
            "status": status,
            "notes": notes,
            "history_size": history_size,
        });
        if let Some(message) = message {
            out["message"] = json!(message);
        }
        out
    }
}

fn text_arg(arguments: &Value, key: &str) -> Option<String> {
    arguments[key]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn invalid(message: impl Into<String>) -> ToolError {
    ToolError::InvalidArguments(message.into())
}

fn storage_failure(e: impl std::fmt::Display) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: "memory".into(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl Tool for MemoryTool {
    fn name(&self) -> &str {
        "memory"
    }

    fn description(&self) -> &str {
        "Manage free-form memory notes about the user. Use add/get/remove/clear actions."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "description": "One of: add, get, remove, clear",
                    "enum": ["add", "get", "remove", "clear"]
                },
                "note": {
                    "type": "string",
                    "description": "Free-form note to store when action=add"
                },
                "remove_note": {
                    "type": "string",
                    "description": "Id or exact text of the note to remove when action=remove"
                }
            },
            "required": ["action"]
        })
    }

    fn validate(&self, arguments: &Value) -> Result<(), ToolError> {
        validate_arguments(&self.parameters_schema(), arguments).map_err(ToolError::InvalidArguments)?;
        match arguments["action"].as_str() {
            Some("add") if text_arg(arguments, "note").is_none() => Err(invalid("'note' is required for add")),
            Some("remove") if text_arg(arguments, "remove_note").is_none() => {
                Err(invalid("'remove_note' is required for remove"))
            }
            _ => Ok(()),
        }
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let action = arguments["action"].as_str().unwrap_or_default();

        match action {
            "get" => Ok(self.snapshot("success", None).await),
            "add" => {
                let note = text_arg(&arguments, "note").ok_or_else(|| invalid("'note' is required for add"))?;
                let duplicate = self
                    .memory
                    .notes()
                    .await
                    .iter()
                    .any(|n| n.text.to_lowercase() == note.to_lowercase());
                if duplicate {
                    debug!(note = %note, "Note already remembered");
                } else {
                    self.memory
                        .add_note(&note, serde_json::Map::new())
                        .await
                        .map_err(storage_failure)?;
                }
                Ok(self.snapshot("success", Some("Memory updated: add".into())).await)
            }
            "remove" => {
                let target =
                    text_arg(&arguments, "remove_note").ok_or_else(|| invalid("'remove_note' is required for remove"))?;
                let removed = self.memory.remove_note(&target).await.map_err(storage_failure)?;
                if removed {
                    Ok(self.snapshot("success", Some("Memory updated: remove".into())).await)
                } else {
                    Ok(self.snapshot("error", Some("Note not found".into())).await)
                }
            }
            "clear" => {
                self.memory.clear_notes().await.map_err(storage_failure)?;
                Ok(self.snapshot("success", Some("Memory updated: clear".into())).await)
            }
            other => Err(invalid(format!("Unsupported action: {other}"))),
        }
    }
}
