//! Built-in tools for dekomposit.
//!
//! - `adaptive_translation`: Cloud Translation Adaptive MT (built lazily)
//! - `detect_language`: LLM-backed language identification
//! - `memory`: manage notes about the user
//! - `reverso_api`: registered, disabled
//!
//! Each tool also answers to the legacy class-style alias it was known by
//! (`adaptivetranslationtool`, `languagedetectiontool`, ...).

pub mod adaptive_translation;
pub mod language_detection;
pub mod memory_tool;
pub mod reverso;

use std::sync::Arc;

use dekomposit_config::TranslationConfig;
use dekomposit_core::memory::MemoryStore;
use dekomposit_core::prompts::PromptLibrary;
use dekomposit_core::provider::Provider;
use dekomposit_core::registry::{CatalogEntry, ToolRegistry};
use dekomposit_core::tool::Tool;

pub use adaptive_translation::AdaptiveTranslationTool;
pub use language_detection::LanguageDetectionTool;
pub use memory_tool::MemoryTool;
pub use reverso::ReversoTool;

/// What the built-in tools need from the agent that owns them.
#[derive(Clone)]
pub struct ToolContext {
    pub memory: Arc<dyn MemoryStore>,
    pub provider: Option<Arc<dyn Provider>>,
    pub model: String,
    pub prompts: Arc<PromptLibrary>,
    pub translation: TranslationConfig,
}

/// The discovery catalog of built-in tools, in advertisement order.
pub fn builtin_catalog(ctx: &ToolContext) -> Vec<CatalogEntry> {
    let settings = ctx.translation.clone();
    let translation = CatalogEntry::lazy(
        AdaptiveTranslationTool::descriptor(),
        Box::new(move || {
            let tool: Arc<dyn Tool> = Arc::new(AdaptiveTranslationTool::new(settings.clone())?);
            Ok(tool)
        }),
    )
    .with_alias("adaptivetranslationtool");

    let detection = CatalogEntry::eager(Arc::new(LanguageDetectionTool::new(
        ctx.provider.clone(),
        ctx.model.clone(),
        ctx.prompts.clone(),
    )))
    .with_alias("languagedetectiontool");

    let memory = CatalogEntry::eager(Arc::new(MemoryTool::new(ctx.memory.clone())))
        .with_alias("memorytool");

    let reverso = CatalogEntry::eager(Arc::new(ReversoTool)).with_alias("reversoapi");

    vec![translation, detection, memory, reverso]
}

/// Create a registry with every built-in tool discovered.
pub fn default_registry(ctx: &ToolContext) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.discover(builtin_catalog(ctx));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use dekomposit_core::tool::ToolErrorKind;
    use dekomposit_memory::InMemoryStore;
    use serde_json::json;

    fn context() -> ToolContext {
        ToolContext {
            memory: Arc::new(InMemoryStore::default()),
            provider: None,
            model: "test-model".into(),
            prompts: Arc::new(PromptLibrary::builtin()),
            translation: TranslationConfig::default(),
        }
    }

    #[test]
    fn default_registry_advertises_enabled_tools_in_order() {
        let registry = default_registry(&context());
        assert_eq!(registry.len(), 4);
        let advertised: Vec<String> = registry.schemas().into_iter().map(|d| d.name).collect();
        assert_eq!(advertised, vec!["adaptive_translation", "detect_language", "memory"]);
        assert!(registry.contains("reverso_api"));
        assert!(!registry.is_enabled("reverso_api"));
    }

    #[test]
    fn aliases_resolve_to_builtins() {
        let registry = default_registry(&context());
        assert_eq!(registry.get("MemoryTool").unwrap().name(), "memory");
        assert_eq!(registry.get("languagedetectiontool").unwrap().name(), "detect_language");
        assert_eq!(
            registry.get("AdaptiveTranslationTool").unwrap().name(),
            "adaptive_translation"
        );
    }

    #[test]
    fn rediscovery_adds_nothing() {
        let ctx = context();
        let mut registry = default_registry(&ctx);
        assert_eq!(registry.discover(builtin_catalog(&ctx)), 0);
        assert_eq!(registry.len(), 4);
    }

    #[tokio::test]
    async fn memory_tool_reachable_through_registry() {
        let ctx = context();
        let registry = default_registry(&ctx);
        let result = registry
            .execute("memory", json!({"action": "add", "note": "learning Slovak"}))
            .await;
        assert!(result.ok);
        assert_eq!(ctx.memory.notes().await.len(), 1);
    }

    #[tokio::test]
    async fn blank_memory_note_is_invalid_arguments() {
        let ctx = context();
        let registry = default_registry(&ctx);
        let result = registry.execute("memory", json!({"action": "add", "note": " "})).await;
        assert_eq!(result.error_kind(), Some(ToolErrorKind::InvalidArguments));
        assert!(ctx.memory.notes().await.is_empty());
    }
}
