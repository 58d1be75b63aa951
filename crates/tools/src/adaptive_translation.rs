//! Adaptive MT translation tool: Cloud Translation with custom datasets.
//!
//! Calls `projects/{p}/locations/{l}:adaptiveMtTranslate`. The dataset is
//! picked, in order, from the call's `dataset_name`, the call's
//! `dataset_id`, the configured name, the configured id, and finally
//! derived from the language pair as `adaptive-{src}-{tgt}`.
//!
//! OAuth tokens come from configuration, `GOOGLE_OAUTH_ACCESS_TOKEN`, or
//! `gcloud auth print-access-token`. A 401 triggers one retry with a token
//! fetched from gcloud.

use async_trait::async_trait;
use dekomposit_config::TranslationConfig;
use dekomposit_core::error::ToolError;
use dekomposit_core::language::Language;
use dekomposit_core::registry::ToolDescriptor;
use dekomposit_core::tool::Tool;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const TOOL_NAME: &str = "adaptive_translation";
const DESCRIPTION: &str = "Translate text using Cloud Translation Adaptive MT datasets. \
     Provide the text plus source_lang and target_lang language codes.";
const ENDPOINT: &str = "https://translation.googleapis.com/v3";

pub struct AdaptiveTranslationTool {
    settings: TranslationConfig,
    client: reqwest::Client,
}

impl AdaptiveTranslationTool {
    pub fn new(settings: TranslationConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| failed(format!("HTTP client: {e}")))?;
        Ok(Self { settings, client })
    }

    /// Descriptor for lazy registration; the HTTP client is only built on first use.
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new(TOOL_NAME, DESCRIPTION, schema())
    }

    /// Full dataset resource name for a call, if one can be determined.
    fn resolve_dataset(&self, project: &str, args: &Value, source: Option<Language>, target: Option<Language>) -> Option<String> {
        let arg = |key: &str| {
            args.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        // A full dataset name, from the call or configuration, beats any id.
        if let Some(name) = arg("dataset_name").or_else(|| self.settings.dataset_name.clone().filter(|n| !n.is_empty())) {
            return Some(name);
        }
        let dataset_id = arg("dataset_id")
            .or_else(|| self.settings.dataset_id.clone().filter(|id| !id.is_empty()))
            .or_else(|| match (source, target) {
                (Some(s), Some(t)) => Some(format!("adaptive-{s}-{t}")),
                _ => None,
            })?;

        Some(format!(
            "projects/{project}/locations/{}/adaptiveMtDatasets/{dataset_id}",
            self.settings.location
        ))
    }

    async fn access_token(&self, args: &Value, allow_env: bool) -> Result<String, ToolError> {
        if let Some(token) = args.get("access_token").and_then(Value::as_str).filter(|t| !t.is_empty()) {
            return Ok(token.to_string());
        }
        if allow_env {
            if let Some(token) = self.settings.access_token.clone().filter(|t| !t.is_empty()) {
                return Ok(token);
            }
            if let Ok(token) = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
                if !token.trim().is_empty() {
                    return Ok(token.trim().to_string());
                }
            }
        }
        gcloud_token().await
    }

    async fn post(&self, url: &str, project: &str, token: &str, payload: &Value) -> Result<reqwest::Response, ToolError> {
        self.client
            .post(url)
            .bearer_auth(token)
            .header("x-goog-user-project", project)
            .header("Content-Type", "application/json; charset=utf-8")
            .json(payload)
            .send()
            .await
            .map_err(|e| failed(format!("request failed: {e}")))
    }
}

fn failed(reason: impl Into<String>) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: TOOL_NAME.into(),
        reason: reason.into(),
    }
}

fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "text": {
                "type": "string",
                "description": "Text to translate"
            },
            "source_lang": {
                "type": "string",
                "description": "Source language code",
                "enum": Language::codes()
            },
            "target_lang": {
                "type": "string",
                "description": "Target language code",
                "enum": Language::codes()
            },
            "dataset_id": {
                "type": "string",
                "description": "Adaptive MT dataset id (optional)"
            },
            "dataset_name": {
                "type": "string",
                "description": "Full dataset resource name (optional)"
            },
            "mime_type": {
                "type": "string",
                "description": "Content MIME type, e.g. text/plain (optional)"
            }
        },
        "required": ["text"]
    })
}

async fn gcloud_token() -> Result<String, ToolError> {
    let output = Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .output()
        .await
        .map_err(|e| failed(format!("gcloud CLI not available ({e}); set GOOGLE_OAUTH_ACCESS_TOKEN")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(failed(format!("gcloud auth print-access-token failed: {stderr}")));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(failed("gcloud returned an empty access token"));
    }
    debug!("Obtained access token from gcloud");
    Ok(token)
}

/// Pull the translated strings out of an `adaptiveMtTranslate` response.
fn extract_translations(response: &Value) -> Vec<String> {
    response["translations"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|t| t["translatedText"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Tool for AdaptiveTranslationTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters_schema(&self) -> Value {
        schema()
    }

    fn validate(&self, arguments: &Value) -> Result<(), ToolError> {
        dekomposit_core::tool::validate_arguments(&schema(), arguments)
            .map_err(ToolError::InvalidArguments)?;
        if arguments["text"].as_str().is_some_and(|t| t.trim().is_empty()) {
            return Err(ToolError::InvalidArguments("text is empty".into()));
        }
        Ok(())
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let text = arguments["text"].as_str().unwrap_or_default().to_string();
        let source = arguments["source_lang"].as_str().and_then(Language::parse);
        let target = arguments["target_lang"].as_str().and_then(Language::parse);

        let project = self
            .settings
            .project_id
            .clone()
            .ok_or_else(|| failed("no Google Cloud project configured (GOOGLE_CLOUD_PROJECT)"))?;

        let dataset = self
            .resolve_dataset(&project, &arguments, source, target)
            .ok_or_else(|| failed("dataset name or dataset id is required"))?;

        let mut payload = json!({
            "dataset": dataset,
            "content": [text],
        });
        if let Some(mime) = arguments["mime_type"].as_str() {
            payload["mimeType"] = json!(mime);
        }

        let url = format!(
            "{ENDPOINT}/projects/{project}/locations/{}:adaptiveMtTranslate",
            self.settings.location
        );

        let token = self.access_token(&arguments, true).await?;
        let mut response = self.post(&url, &project, &token, &payload).await?;

        if response.status().as_u16() == 401 {
            warn!("Adaptive MT returned 401, refreshing token and retrying");
            let token = self.access_token(&arguments, false).await?;
            response = self.post(&url, &project, &token, &payload).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("Adaptive MT returned {status}: {body}")));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| failed(format!("unreadable response: {e}")))?;

        let translations = extract_translations(&data);
        let Some(first) = translations.first().cloned() else {
            return Err(failed("response contained no translations"));
        };

        info!(
            dataset = %dataset,
            source = source.map(|l| l.code()).unwrap_or("dataset"),
            target = target.map(|l| l.code()).unwrap_or("dataset"),
            "Adaptive MT translate"
        );

        Ok(json!({
            "translated": first,
            "translations": translations,
            "dataset": dataset,
            "source_lang": source.map(|l| l.code()),
            "target_lang": target.map(|l| l.code()),
        }))
    }
}
