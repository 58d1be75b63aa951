//! The tool loop: model call, tool dispatch, repeat.
//!
//! ```text
//! INIT → MODEL_CALL → (TOOL_DISPATCH → MODEL_CALL)* → DONE
//!                                                   → FAILED  (iteration cap)
//!                                                   → ERROR   (provider failure)
//! ```
//!
//! At most `max_iterations` model calls are made per run. Hitting the cap
//! is not an error: the run ends `FAILED` with the configured fallback text.
//! Provider failures (including LLM call timeouts) are the only errors that
//! leave the loop.
//!
//! Tool calls of one model turn may run concurrently, but their `tool`
//! messages are always appended in request order, so the message list is
//! the same whichever way they were dispatched.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dekomposit_core::error::ProviderError;
use dekomposit_core::event::{DomainEvent, EventBus};
use dekomposit_core::message::{Message, ToolCallRequest};
use dekomposit_core::provider::{Provider, ProviderRequest, ProviderResponse};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::executor::{ToolCallRecord, ToolExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopStatus {
    Init,
    ModelCall,
    ToolDispatch,
    Done,
    Failed,
    Error,
}

/// Transient state of one loop run.
#[derive(Debug, Clone)]
pub struct LoopState {
    pub messages: Vec<Message>,
    pub iteration: u32,
    pub status: LoopStatus,
}

impl LoopState {
    fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            iteration: 0,
            status: LoopStatus::Init,
        }
    }

    fn transition(&mut self, status: LoopStatus) {
        debug!(from = ?self.status, to = ?status, iteration = self.iteration, "Loop transition");
        self.status = status;
    }
}

/// How a run ended.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// `Done` or `Failed`
    pub status: LoopStatus,
    /// Final assistant text, or the fallback message
    pub text: String,
    pub messages: Vec<Message>,
    /// Model calls made
    pub iterations: u32,
    pub tool_calls: Vec<ToolCallRecord>,
}

#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub max_iterations: u32,
    pub llm_timeout: Duration,
    pub concurrent_dispatch: bool,
    pub fallback_message: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            llm_timeout: Duration::from_secs(30),
            concurrent_dispatch: true,
            fallback_message: "Sorry, I couldn't finish that request. Please try rephrasing it.".into(),
            temperature: 1.0,
            max_tokens: None,
        }
    }
}

pub struct ToolLoopRunner {
    provider: Arc<dyn Provider>,
    model: String,
    executor: ToolExecutor,
    settings: LoopSettings,
    event_bus: Arc<EventBus>,
}

impl ToolLoopRunner {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        executor: ToolExecutor,
        settings: LoopSettings,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            executor,
            settings,
            event_bus,
        }
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Run the loop over an initial message list (system + history + user).
    pub async fn run(&self, initial: Vec<Message>) -> Result<LoopOutcome, ProviderError> {
        let mut state = LoopState::new(initial);
        let mut records: Vec<ToolCallRecord> = Vec::new();
        let mut answered: HashSet<String> = HashSet::new();
        let mut tokens_used = 0u32;

        while state.iteration < self.settings.max_iterations {
            state.iteration += 1;
            state.transition(LoopStatus::ModelCall);

            let mut request = ProviderRequest::new(self.model.clone(), state.messages.clone());
            request.temperature = self.settings.temperature;
            request.max_tokens = self.settings.max_tokens;
            // Schemas are read every turn so they always match the registry.
            request.tools = self.executor.registry().schemas();

            let response = match self.call_model(request).await {
                Ok(response) => response,
                Err(e) => {
                    state.transition(LoopStatus::Error);
                    warn!(iteration = state.iteration, error = %e, "Model call failed");
                    self.event_bus.publish(DomainEvent::ErrorOccurred {
                        context: "tool_loop".into(),
                        error_message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    return Err(e);
                }
            };
            if let Some(usage) = &response.usage {
                tokens_used = tokens_used.saturating_add(usage.total_tokens);
            }

            let mut message = response.message;
            if !message.has_tool_calls() {
                state.transition(LoopStatus::Done);
                let text = message.content.clone();
                state.messages.push(message);
                self.event_bus.publish(DomainEvent::ResponseGenerated {
                    model: response.model,
                    iterations: state.iteration,
                    tokens_used,
                    timestamp: Utc::now(),
                });
                return Ok(LoopOutcome {
                    status: LoopStatus::Done,
                    text,
                    messages: state.messages,
                    iterations: state.iteration,
                    tool_calls: records,
                });
            }

            state.transition(LoopStatus::ToolDispatch);
            assign_call_ids(&mut message.tool_calls, state.iteration, &mut answered);
            let calls = message.tool_calls.clone();
            info!(iteration = state.iteration, count = calls.len(), "Model requested tool calls");
            state.messages.push(message);

            let batch = self.dispatch(&calls).await;
            for record in batch {
                state.messages.push(record.to_message());
                records.push(record);
            }
        }

        warn!(
            iterations = state.iteration,
            max = self.settings.max_iterations,
            "Iteration cap reached without a final answer"
        );
        state.transition(LoopStatus::Failed);
        self.event_bus.publish(DomainEvent::LoopFailed {
            iterations: state.iteration,
            timestamp: Utc::now(),
        });

        Ok(LoopOutcome {
            status: LoopStatus::Failed,
            text: self.settings.fallback_message.clone(),
            messages: state.messages,
            iterations: state.iteration,
            tool_calls: records,
        })
    }

    async fn call_model(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match tokio::time::timeout(self.settings.llm_timeout, self.provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "model call exceeded {}s",
                self.settings.llm_timeout.as_secs_f32()
            ))),
        }
    }

    /// Execute one turn's calls; results come back in request order.
    async fn dispatch(&self, calls: &[ToolCallRequest]) -> Vec<ToolCallRecord> {
        if self.settings.concurrent_dispatch && calls.len() > 1 {
            join_all(calls.iter().map(|call| self.executor.execute(call))).await
        } else {
            let mut out = Vec::with_capacity(calls.len());
            for call in calls {
                out.push(self.executor.execute(call).await);
            }
            out
        }
    }
}

/// Give every call an id that has not been answered before in this run.
///
/// Empty or repeated ids are replaced with `call_{iteration}_{index}`,
/// before the assistant message is recorded, so each `tool` message still
/// points at a request in the transcript.
fn assign_call_ids(calls: &mut [ToolCallRequest], iteration: u32, seen: &mut HashSet<String>) {
    for (index, call) in calls.iter_mut().enumerate() {
        if call.id.trim().is_empty() || seen.contains(&call.id) {
            let mut candidate = format!("call_{iteration}_{index}");
            let mut suffix = 1;
            while seen.contains(&candidate) {
                candidate = format!("call_{iteration}_{index}_{suffix}");
                suffix += 1;
            }
            debug!(original = %call.id, assigned = %candidate, "Reassigned tool call id");
            call.id = candidate;
        }
        seen.insert(call.id.clone());
    }
}
