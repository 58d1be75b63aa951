//! The agent façade: one user turn, end to end.
//!
//! inbound text → memory → prompt composition → routing → tool loop →
//! final text → memory.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use dekomposit_config::AppConfig;
use dekomposit_core::error::{Error, ProviderError};
use dekomposit_core::event::{DomainEvent, EventBus};
use dekomposit_core::language::Language;
use dekomposit_core::memory::{HistoryTurn, MemoryLimits, MemoryStore};
use dekomposit_core::message::Message;
use dekomposit_core::prompts::{self, PromptLibrary};
use dekomposit_core::provider::Provider;
use dekomposit_core::registry::ToolRegistry;
use dekomposit_memory::InMemoryStore;
use dekomposit_tools::ToolContext;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::composer::PromptComposer;
use crate::executor::{ToolCallRecord, ToolExecutor};
use crate::loop_runner::{LoopSettings, LoopStatus, ToolLoopRunner};
use crate::router::{Router, RoutingOutcome};

/// Outcome of one handled user turn.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub route: RoutingOutcome,
    /// `Done` or `Failed`; clarifications are `Done` without a loop
    pub status: LoopStatus,
    pub text: String,
    /// Model calls made by the tool loop
    pub iterations: u32,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Routed turn, ready for the loop.
struct PreparedTurn {
    outcome: RoutingOutcome,
    system_prompt: String,
    history: Vec<Message>,
}

pub struct Agent {
    model: String,
    memory: Arc<dyn MemoryStore>,
    prompts: Arc<PromptLibrary>,
    composer: PromptComposer,
    router: Router,
    runner: ToolLoopRunner,
    event_bus: Arc<EventBus>,
    error_message: String,
    target_language: RwLock<Option<Language>>,
}

impl Agent {
    /// Assemble an agent from explicit parts.
    pub fn new(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        memory: Arc<dyn MemoryStore>,
        prompts: Arc<PromptLibrary>,
        registry: ToolRegistry,
    ) -> Self {
        let event_bus = Arc::new(EventBus::default());
        let executor = ToolExecutor::new(
            Arc::new(registry),
            Duration::from_secs(config.agent.tool_timeout_secs),
            event_bus.clone(),
        );
        let settings = LoopSettings {
            max_iterations: config.agent.max_iterations,
            llm_timeout: Duration::from_secs(config.llm.request_timeout_secs),
            concurrent_dispatch: config.agent.concurrent_tool_dispatch,
            fallback_message: config.agent.fallback_message.clone(),
            temperature: config.llm.temperature,
            max_tokens: Some(config.llm.max_tokens),
        };
        let runner = ToolLoopRunner::new(
            provider.clone(),
            config.llm.model.clone(),
            executor,
            settings,
            event_bus.clone(),
        );
        let target_language = config.agent.target_language.as_deref().and_then(Language::parse);

        Self {
            router: Router::new(provider, config.llm.model.clone(), prompts.clone())
                .with_timeout(Duration::from_secs(config.llm.request_timeout_secs)),
            composer: PromptComposer::new(prompts.clone()),
            model: config.llm.model.clone(),
            memory,
            prompts,
            runner,
            event_bus,
            error_message: config.agent.error_message.clone(),
            target_language: RwLock::new(target_language),
        }
    }

    /// Build the full stack from configuration: provider, prompts, memory
    /// and the built-in tools.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let provider = dekomposit_providers::default_from_config(config)?;
        let prompts = Arc::new(PromptLibrary::load(&config.prompts.resolved_dir()));
        let memory: Arc<dyn MemoryStore> = Arc::new(InMemoryStore::new(MemoryLimits {
            max_notes: config.memory.max_notes,
            max_history: config.memory.max_history,
        }));
        let registry = dekomposit_tools::default_registry(&ToolContext {
            memory: memory.clone(),
            provider: Some(provider.clone()),
            model: config.llm.model.clone(),
            prompts: prompts.clone(),
            translation: config.translation.clone(),
        });
        info!(model = %config.llm.model, tools = registry.len(), "Agent initialized");
        Ok(Self::new(config, provider, memory, prompts, registry))
    }

    pub fn with_custom_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.composer = self.composer.with_custom_instructions(instructions);
        self
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.event_bus.clone()
    }

    pub fn memory(&self) -> Arc<dyn MemoryStore> {
        self.memory.clone()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn target_language(&self) -> Option<Language> {
        *self.target_language.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_target_language(&self, language: Option<Language>) {
        *self.target_language.write().unwrap_or_else(|e| e.into_inner()) = language;
    }

    /// Handle one user message.
    ///
    /// Errors only on provider failure; tool failures and the iteration
    /// cap are folded into the result.
    pub async fn handle_message(&self, text: &str) -> Result<TurnResult, Error> {
        let turn = self.prepare(text).await?;
        self.finish(turn).await
    }

    /// Handle one user message and return the text to show.
    pub async fn chat(&self, text: &str) -> String {
        match self.handle_message(text).await {
            Ok(result) => result.text,
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Turn failed");
                self.error_message.clone()
            }
        }
    }

    /// Like [`Agent::handle_message`], but the reply is delivered over
    /// `chunks`.
    ///
    /// Every route runs the full tool loop first, so tool calls the model
    /// makes are executed; the final text is then forwarded and returned.
    pub async fn stream_reply(&self, text: &str, chunks: mpsc::Sender<String>) -> Result<String, Error> {
        let result = self.handle_message(text).await?;
        if !result.text.is_empty() {
            // The caller may have stopped listening.
            let _ = chunks.send(result.text.clone()).await;
        }
        Ok(result.text)
    }

    async fn prepare(&self, text: &str) -> Result<PreparedTurn, Error> {
        self.event_bus.publish(DomainEvent::TurnReceived {
            content_preview: text.chars().take(80).collect(),
            timestamp: Utc::now(),
        });

        // Prior turns only; the current message is added by the loop itself.
        let history: Vec<Message> = self.memory.history().await.iter().map(HistoryTurn::to_message).collect();
        self.memory.add_history(HistoryTurn::user(text)).await?;

        let notes = self.memory.notes().await;
        let system_prompt = self.composer.compose(&notes);

        let outcome = match self.router.route(text, &history, self.target_language()).await {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.provider_failure("routing", e)),
        };

        let (source, target) = match &outcome {
            RoutingOutcome::Translate { source, target, .. } => (Some(source.code().to_string()), Some(target.code().to_string())),
            _ => (None, None),
        };
        info!(action = outcome.action(), source = ?source, target = ?target, "Turn routed");
        self.event_bus.publish(DomainEvent::RouteDecided {
            action: outcome.action().to_string(),
            source_lang: source,
            target_lang: target,
            timestamp: Utc::now(),
        });

        Ok(PreparedTurn {
            outcome,
            system_prompt,
            history,
        })
    }

    async fn finish(&self, turn: PreparedTurn) -> Result<TurnResult, Error> {
        let user_text = match &turn.outcome {
            RoutingOutcome::NeedsClarification { message } => {
                self.memory.add_history(HistoryTurn::assistant(message.clone())).await?;
                return Ok(TurnResult {
                    text: message.clone(),
                    route: turn.outcome,
                    status: LoopStatus::Done,
                    iterations: 0,
                    tool_calls: Vec::new(),
                });
            }
            RoutingOutcome::Respond { text } => text.clone(),
            RoutingOutcome::Translate { text, source, target } => {
                if self.target_language().is_none() {
                    debug!(target = %target, "Remembering target language preference");
                    self.set_target_language(Some(*target));
                }
                self.prompts.render(
                    prompts::TRANSLATION_REQUEST,
                    &[
                        ("source", &format!("{} ({})", source.english_name(), source.code())),
                        ("target", &format!("{} ({})", target.english_name(), target.code())),
                        ("text", text),
                    ],
                )
            }
        };

        let mut messages = Vec::with_capacity(turn.history.len() + 2);
        messages.push(Message::system(turn.system_prompt));
        messages.extend(turn.history);
        messages.push(Message::user(user_text));

        let outcome = match self.runner.run(messages).await {
            Ok(outcome) => outcome,
            Err(e) => return Err(Error::Provider(e)),
        };

        if outcome.status == LoopStatus::Done && !outcome.text.trim().is_empty() {
            self.memory.add_history(HistoryTurn::assistant(outcome.text.clone())).await?;
        }

        Ok(TurnResult {
            route: turn.outcome,
            status: outcome.status,
            text: outcome.text,
            iterations: outcome.iterations,
            tool_calls: outcome.tool_calls,
        })
    }

    fn provider_failure(&self, context: &str, e: ProviderError) -> Error {
        warn!(context, error = %e, "Provider failure");
        self.event_bus.publish(DomainEvent::ErrorOccurred {
            context: context.to_string(),
            error_message: e.to_string(),
            timestamp: Utc::now(),
        });
        Error::Provider(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        SequentialMockProvider, make_text_response, make_tool_call, make_tool_call_response,
    };
    use dekomposit_core::message::Role;
    use serde_json::json;

    const RESPOND: &str = r#"{"action": "respond", "text": "", "source_lang": null, "target_lang": null}"#;

    fn agent(provider: Arc<SequentialMockProvider>) -> Agent {
        let memory: Arc<dyn MemoryStore> = Arc::new(InMemoryStore::default());
        let prompts = Arc::new(PromptLibrary::builtin());
        let registry = dekomposit_tools::default_registry(&ToolContext {
            memory: memory.clone(),
            provider: None,
            model: "mock-model".into(),
            prompts: prompts.clone(),
            translation: Default::default(),
        });
        Agent::new(&AppConfig::default(), provider, memory, prompts, registry)
    }

    #[tokio::test]
    async fn respond_route_records_both_turns() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_text_response(RESPOND),
            make_text_response("Mám sa dobre!"),
        ]));
        let agent = agent(provider.clone());
        let result = agent.handle_message("Ahoj, ako sa máš?").await.unwrap();

        assert_eq!(result.status, LoopStatus::Done);
        assert_eq!(result.text, "Mám sa dobre!");
        assert_eq!(result.iterations, 1);
        assert!(result.tool_calls.is_empty());

        let history = agent.memory().history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn loop_sees_prior_history_once() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_text_response(RESPOND),
            make_text_response("first"),
            make_text_response(RESPOND),
            make_text_response("second"),
        ]));
        let agent = agent(provider.clone());
        agent.handle_message("one").await.unwrap();
        agent.handle_message("two").await.unwrap();

        let loop_request = &provider.requests()[3];
        let roles: Vec<Role> = loop_request.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(loop_request.messages[3].content, "two");
    }

    #[tokio::test]
    async fn memory_notes_reach_the_system_prompt() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_text_response(RESPOND),
            make_tool_call_response(vec![make_tool_call(
                "call_m",
                "memory",
                json!({"action": "add", "note": "learning Slovak"}),
            )]),
            make_text_response("Noted!"),
            make_text_response(RESPOND),
            make_text_response("Sure"),
        ]));
        let agent = agent(provider.clone());
        agent.handle_message("remember I'm learning Slovak").await.unwrap();
        agent.handle_message("hello again").await.unwrap();

        let system = &provider.requests()[4].messages[0];
        assert_eq!(system.role, Role::System);
        assert!(system.content.contains("- learning Slovak"));
    }

    #[tokio::test]
    async fn clarification_skips_the_loop() {
        let provider = Arc::new(SequentialMockProvider::new(vec![make_text_response(
            r#"{"action": "translate", "text": "dog", "source_lang": "en", "target_lang": null}"#,
        )]));
        let agent = agent(provider.clone());
        let result = agent.handle_message("translate dog").await.unwrap();

        assert!(matches!(result.route, RoutingOutcome::NeedsClarification { .. }));
        assert_eq!(result.iterations, 0);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn translate_route_feeds_rendered_request() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_text_response(r#"{"action": "translate", "text": "dog", "source_lang": "en", "target_lang": "ru"}"#),
            make_text_response("собака"),
        ]));
        let agent = agent(provider.clone());
        agent.handle_message("translate 'dog' to Russian").await.unwrap();

        let user = provider.requests()[1].messages.last().cloned().unwrap();
        assert!(user.content.contains("English (en)"));
        assert!(user.content.contains("Russian (ru)"));
        assert!(user.content.ends_with("Text: dog"));
        assert_eq!(agent.target_language(), Some(Language::Ru));
    }

    #[tokio::test]
    async fn chat_maps_provider_errors_to_generic_text() {
        let provider = Arc::new(SequentialMockProvider::failing(ProviderError::Network("down".into())));
        let agent = agent(provider);
        assert_eq!(agent.chat("hi").await, AppConfig::default().agent.error_message);
    }

    #[tokio::test]
    async fn stream_reply_forwards_final_text_and_records_history() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_text_response(RESPOND),
            make_text_response("Ahoj!"),
        ]));
        let agent = agent(provider.clone());
        let (tx, mut rx) = mpsc::channel(8);

        let full = agent.stream_reply("Ahoj", tx).await.unwrap();
        assert_eq!(full, "Ahoj!");
        assert_eq!(rx.recv().await.as_deref(), Some("Ahoj!"));
        assert_eq!(agent.memory().history().await.len(), 2);
    }

    #[tokio::test]
    async fn stream_reply_runs_tools_on_respond_turns() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_text_response(RESPOND),
            make_tool_call_response(vec![make_tool_call(
                "call_m",
                "memory",
                json!({"action": "add", "note": "learning Slovak"}),
            )]),
            make_text_response("Noted!"),
        ]));
        let agent = agent(provider.clone());
        let (tx, mut rx) = mpsc::channel(8);

        let full = agent.stream_reply("remember I'm learning Slovak", tx).await.unwrap();

        assert_eq!(full, "Noted!");
        assert_eq!(rx.recv().await.as_deref(), Some("Noted!"));
        assert!(!provider.requests()[1].tools.is_empty());
        let notes = agent.memory().notes().await;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].text, "learning Slovak");

        let history = agent.memory().history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "Noted!");
    }

    #[tokio::test]
    async fn empty_final_text_is_not_recorded() {
        let provider = Arc::new(SequentialMockProvider::new(vec![
            make_text_response(RESPOND),
            make_text_response(""),
        ]));
        let agent = agent(provider);
        let (tx, _rx) = mpsc::channel(8);

        assert_eq!(agent.stream_reply("hi", tx).await.unwrap(), "");
        let history = agent.memory().history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
    }
}
