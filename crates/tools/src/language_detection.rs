//! Language detection tool.
//!
//! Asks the LLM for a structured `{language, confidence}` answer. When no
//! provider is available or the call fails, falls back to the script
//! heuristic and reports the failure in an `error` field.

use async_trait::async_trait;
use dekomposit_core::error::ToolError;
use dekomposit_core::language::{self, Language};
use dekomposit_core::message::Message;
use dekomposit_core::prompts::{self, PromptLibrary};
use dekomposit_core::provider::{Provider, ProviderRequest, ResponseSchema};
use dekomposit_core::tool::Tool;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct LanguageDetectionTool {
    provider: Option<Arc<dyn Provider>>,
    model: String,
    prompts: Arc<PromptLibrary>,
}

impl LanguageDetectionTool {
    pub fn new(provider: Option<Arc<dyn Provider>>, model: impl Into<String>, prompts: Arc<PromptLibrary>) -> Self {
        Self {
            provider,
            model: model.into(),
            prompts,
        }
    }

    fn response_schema() -> ResponseSchema {
        let mut codes = Language::codes();
        codes.push("other");
        ResponseSchema::new(
            "language_detection",
            json!({
                "type": "object",
                "properties": {
                    "language": { "type": "string", "enum": codes },
                    "confidence": { "type": "string", "enum": ["high", "medium", "low"] }
                },
                "required": ["language", "confidence"],
                "additionalProperties": false
            }),
        )
    }

    async fn ask_model(&self, provider: &dyn Provider, text: &str) -> Result<Value, String> {
        let messages = vec![
            Message::system(self.prompts.get_or_empty(prompts::DETECTION)),
            Message::user(text),
        ];
        let mut request = ProviderRequest::new(self.model.clone(), messages);
        request.temperature = 0.0;

        let parsed = provider
            .complete_structured(request, Self::response_schema())
            .await
            .map_err(|e| e.to_string())?;

        let language = parsed["language"]
            .as_str()
            .ok_or_else(|| "detection response has no language".to_string())?;
        let language = Language::parse(language)
            .map(|l| l.code().to_string())
            .unwrap_or_else(|| "other".into());
        let confidence = parsed["confidence"].as_str().unwrap_or("low");

        Ok(json!({ "language": language, "confidence": confidence }))
    }
}

fn heuristic(text: &str, error: String) -> Value {
    match language::detect_heuristic(text) {
        Some(lang) => json!({ "language": lang.code(), "confidence": "low", "error": error }),
        None => json!({ "language": "unknown", "confidence": "none", "error": error }),
    }
}

#[async_trait]
impl Tool for LanguageDetectionTool {
    fn name(&self) -> &str {
        "detect_language"
    }

    fn description(&self) -> &str {
        "Detect language of text. Returns language code and confidence."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text to detect language for"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let text = arguments["text"].as_str().unwrap_or_default();
        if text.trim().is_empty() {
            return Ok(json!({ "language": "unknown", "confidence": "none", "error": "Empty text" }));
        }

        let Some(provider) = self.provider.as_deref() else {
            return Ok(heuristic(text, "No LLM provider available".into()));
        };

        match self.ask_model(provider, text).await {
            Ok(detected) => {
                debug!(language = %detected["language"], confidence = %detected["confidence"], "Detected language");
                Ok(detected)
            }
            Err(e) => {
                warn!(error = %e, "Language detection failed, using heuristic");
                Ok(heuristic(text, e))
            }
        }
    }
}
