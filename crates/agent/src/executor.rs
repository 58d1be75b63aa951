//! Tool executor: turns a model's tool call request into a `ToolResult`.
//!
//! Arguments are parsed strictly: an empty payload means `{}`, anything
//! else must be a JSON object. Invocation goes through the registry (which
//! validates and catches panics) under a timeout. Nothing that happens here
//! escapes as an error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dekomposit_core::error::ToolError;
use dekomposit_core::event::{DomainEvent, EventBus};
use dekomposit_core::message::{Message, ToolCallRequest};
use dekomposit_core::registry::ToolRegistry;
use dekomposit_core::tool::{ToolErrorKind, ToolResult};
use serde_json::Value;
use tracing::{info, warn};

/// One executed tool call.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub call_id: String,
    pub tool_name: String,
    pub result: ToolResult,
    pub duration: Duration,
}

impl ToolCallRecord {
    /// The `tool` message answering this call.
    pub fn to_message(&self) -> Message {
        Message::tool_result(&self.call_id, self.result.to_content())
            .with_metadata("tool_name", self.tool_name.clone())
    }
}

/// Parse raw tool arguments into a JSON object.
pub fn parse_arguments(raw: &str) -> Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(other) => Err(format!("arguments must be a JSON object, got: {other}")),
        Err(e) => Err(format!("arguments are not valid JSON: {e}")),
    }
}

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
    event_bus: Arc<EventBus>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration, event_bus: Arc<EventBus>) -> Self {
        Self {
            registry,
            timeout,
            event_bus,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a single call. Always yields a record.
    pub async fn execute(&self, call: &ToolCallRequest) -> ToolCallRecord {
        let start = Instant::now();
        let result = self.run(call).await;
        let duration = start.elapsed();

        info!(
            tool = %call.name,
            call_id = %call.id,
            ok = result.ok,
            duration_ms = duration.as_millis() as u64,
            "Tool dispatched"
        );
        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            call_id: call.id.clone(),
            success: result.ok,
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        });

        ToolCallRecord {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result,
            duration,
        }
    }

    async fn run(&self, call: &ToolCallRequest) -> ToolResult {
        let arguments = match parse_arguments(&call.arguments) {
            Ok(args) => args,
            Err(reason) => {
                warn!(tool = %call.name, call_id = %call.id, %reason, "Rejected tool arguments");
                return ToolResult::failure(ToolErrorKind::InvalidArguments, reason);
            }
        };

        match tokio::time::timeout(self.timeout, self.registry.execute(&call.name, arguments)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(tool = %call.name, timeout_secs = self.timeout.as_secs(), "Tool timed out");
                ToolResult::from_error(&ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        }
    }
}
