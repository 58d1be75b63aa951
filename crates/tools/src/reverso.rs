//! Reverso Context tool: registered but disabled until the integration exists.
//!
//! It is never advertised to the model; direct execution reports the
//! service as unavailable.

use async_trait::async_trait;
use dekomposit_core::error::ToolError;
use dekomposit_core::tool::Tool;
use serde_json::{Value, json};
use tracing::info;

pub struct ReversoTool;

#[async_trait]
impl Tool for ReversoTool {
    fn name(&self) -> &str {
        "reverso_api"
    }

    fn description(&self) -> &str {
        "Get translations and context examples from Reverso Context"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to look up" },
                "source_lang": { "type": "string", "description": "Source language code" },
                "target_lang": { "type": "string", "description": "Target language code" }
            },
            "required": ["text", "source_lang", "target_lang"]
        })
    }

    fn enabled(&self) -> bool {
        false
    }

    fn validate(&self, arguments: &Value) -> Result<(), ToolError> {
        dekomposit_core::tool::validate_arguments(&self.parameters_schema(), arguments)
            .map_err(ToolError::InvalidArguments)?;

        let text = arguments["text"].as_str().unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ToolError::InvalidArguments("text is empty".into()));
        }
        if text.starts_with("http://") || text.starts_with("https://") {
            return Err(ToolError::InvalidArguments("URLs are not supported input".into()));
        }
        let blank = |key: &str| arguments[key].as_str().is_none_or(|s| s.trim().is_empty());
        if blank("source_lang") || blank("target_lang") {
            return Err(ToolError::InvalidArguments("language codes are required".into()));
        }
        Ok(())
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        info!(
            source = arguments["source_lang"].as_str().unwrap_or_default(),
            target = arguments["target_lang"].as_str().unwrap_or_default(),
            "Reverso lookup attempted"
        );
        Ok(json!({
            "status": "unavailable",
            "message": "reverso_api is disabled until the integration is implemented"
        }))
    }
}
