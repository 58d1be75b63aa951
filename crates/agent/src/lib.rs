//! The dekomposit agent: routing, the tool loop and the turn pipeline.
//!
//! A user turn flows through:
//!
//! 1. **Memory**: the message is appended to history
//! 2. **Prompt composition**: personality + custom instructions + notes
//! 3. **Routing**: a structured LLM call picks `translate` or `respond`
//! 4. **Tool loop**: model call → tool dispatch → repeat, bounded by
//!    `max_iterations`
//! 5. **Memory**: the final answer is appended to history

pub mod agent;
pub mod composer;
pub mod executor;
pub mod loop_runner;
pub mod router;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use agent::{Agent, TurnResult};
pub use composer::PromptComposer;
pub use executor::{ToolCallRecord, ToolExecutor};
pub use loop_runner::{LoopOutcome, LoopSettings, LoopState, LoopStatus, ToolLoopRunner};
pub use router::{RouteAction, Router, RoutingDecision, RoutingOutcome};
