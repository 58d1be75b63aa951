//! Routing decision: classify a user turn before the tool loop runs.
//!
//! One structured LLM call per turn, constrained to
//! `action ∈ {translate, respond}` and, for translations, language codes
//! from the supported set. The call never carries tools.
//!
//! Languages the model leaves out are filled in locally: the source from
//! the script heuristic, the target from the session's preference. If
//! either is still unknown the turn becomes a clarification question.

use std::sync::Arc;
use std::time::Duration;

use dekomposit_core::error::{ProviderError, RoutingError};
use dekomposit_core::language::{self, Language};
use dekomposit_core::message::Message;
use dekomposit_core::prompts::{self, PromptLibrary};
use dekomposit_core::provider::{Provider, ProviderRequest, ResponseSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteAction {
    Translate,
    Respond,
}

/// The model's raw classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub action: RouteAction,
    pub text: String,
    #[serde(default)]
    pub source_lang: Option<Language>,
    #[serde(default)]
    pub target_lang: Option<Language>,
}

impl RoutingDecision {
    /// Read a decision out of the structured reply. Anything unrecognised
    /// degrades to `respond` with the user's own text.
    pub fn from_value(value: &Value, original_text: &str) -> Self {
        let action = match value["action"].as_str().map(str::trim) {
            Some(a) if a.eq_ignore_ascii_case("translate") => RouteAction::Translate,
            _ => RouteAction::Respond,
        };
        let text = value["text"]
            .as_str()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(original_text)
            .to_string();
        let lang = |key: &str| value[key].as_str().and_then(Language::parse);

        Self {
            action,
            text,
            source_lang: lang("source_lang"),
            target_lang: lang("target_lang"),
        }
    }
}

/// A decision with every language resolved, ready for the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingOutcome {
    Respond { text: String },
    Translate { text: String, source: Language, target: Language },
    NeedsClarification { message: String },
}

impl RoutingOutcome {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Respond { .. } => "respond",
            Self::Translate { .. } => "translate",
            Self::NeedsClarification { .. } => "clarify",
        }
    }
}

/// Fill in missing languages for a translate decision.
pub fn resolve_languages(
    decision: &RoutingDecision,
    target_preference: Option<Language>,
) -> Result<(Language, Language), RoutingError> {
    let source = decision
        .source_lang
        .or_else(|| language::detect_heuristic(&decision.text))
        .ok_or_else(|| RoutingError::UnresolvedLanguage {
            which: "source",
            text: decision.text.clone(),
        })?;
    let target = decision
        .target_lang
        .or(target_preference)
        .ok_or_else(|| RoutingError::UnresolvedLanguage {
            which: "target",
            text: decision.text.clone(),
        })?;
    Ok((source, target))
}

fn clarification(err: &RoutingError) -> String {
    let RoutingError::UnresolvedLanguage { which, text } = err;
    let supported = Language::ALL
        .iter()
        .map(|l| l.english_name())
        .collect::<Vec<_>>()
        .join(", ");
    match *which {
        "source" => format!("Which language is \"{text}\" in? I can work with {supported}."),
        _ => format!("Which language should I translate \"{text}\" into? I can work with {supported}."),
    }
}

pub fn routing_schema() -> ResponseSchema {
    let mut codes: Vec<Value> = Language::codes().into_iter().map(Value::from).collect();
    codes.push(Value::Null);
    ResponseSchema::new(
        "routing_decision",
        json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["translate", "respond"] },
                "text": { "type": "string" },
                "source_lang": { "type": ["string", "null"], "enum": codes.clone() },
                "target_lang": { "type": ["string", "null"], "enum": codes }
            },
            "required": ["action", "text", "source_lang", "target_lang"],
            "additionalProperties": false
        }),
    )
}

pub struct Router {
    provider: Arc<dyn Provider>,
    model: String,
    prompts: Arc<PromptLibrary>,
    timeout: Duration,
}

impl Router {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, prompts: Arc<PromptLibrary>) -> Self {
        Self {
            provider,
            model: model.into(),
            prompts,
            timeout: Duration::from_secs(30),
        }
    }

    /// Bound the routing call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Classify `text`. `history` gives the classifier recent context.
    ///
    /// Only provider failures are errors; unresolved languages come back as
    /// [`RoutingOutcome::NeedsClarification`].
    pub async fn route(
        &self,
        text: &str,
        history: &[Message],
        target_preference: Option<Language>,
    ) -> Result<RoutingOutcome, ProviderError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.prompts.get_or_empty(prompts::ROUTING)));
        messages.extend(history.iter().cloned());
        messages.push(Message::user(text));

        let mut request = ProviderRequest::new(self.model.clone(), messages);
        request.temperature = 0.0;

        let value = tokio::time::timeout(self.timeout, self.provider.complete_structured(request, routing_schema()))
            .await
            .map_err(|_| ProviderError::Timeout(format!("routing call exceeded {}s", self.timeout.as_secs_f32())))??;
        let decision = RoutingDecision::from_value(&value, text);
        debug!(?decision, "Routing decision");

        let outcome = match decision.action {
            RouteAction::Respond => RoutingOutcome::Respond { text: text.to_string() },
            RouteAction::Translate => match resolve_languages(&decision, target_preference) {
                Ok((source, target)) => RoutingOutcome::Translate {
                    text: decision.text,
                    source,
                    target,
                },
                Err(e) => {
                    info!(error = %e, "Translation languages unresolved, asking user");
                    RoutingOutcome::NeedsClarification { message: clarification(&e) }
                }
            },
        };
        Ok(outcome)
    }
}
