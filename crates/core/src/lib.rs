//! # dekomposit Core
//!
//! Domain types, traits, and error definitions for the dekomposit language
//! agent. This crate has no I/O of its own beyond prompt-file loading; it
//! defines the model every other crate implements against.
//!
//! ## Layout
//!
//! - [`tool`] and [`registry`]: the tool contract and the registry that owns tools
//! - [`provider`]: the LLM client boundary
//! - [`memory`]: bounded notes and history
//! - [`language`] and [`prompts`]: supported languages and named prompt texts
//! - [`event`]: broadcast domain events

pub mod error;
pub mod event;
pub mod language;
pub mod memory;
pub mod message;
pub mod prompts;
pub mod provider;
pub mod registry;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use language::Language;
pub use memory::{HistoryTurn, MemoryLimits, MemoryNote, MemoryStore};
pub use message::{Message, Role, ToolCallRequest};
pub use prompts::PromptLibrary;
pub use provider::{Provider, ProviderRequest, ProviderResponse, ResponseSchema, StreamChunk, ToolDefinition};
pub use registry::{CatalogEntry, ToolDescriptor, ToolRegistry};
pub use tool::{Tool, ToolErrorKind, ToolFailure, ToolResult};
