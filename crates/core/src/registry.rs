//! Tool registry: the single source of truth for which tools exist.
//!
//! Tools are keyed by a normalized (trimmed, lowercased) name and kept in
//! registration order, so the schemas sent to the model are stable across
//! turns. Expensive tools can be registered as lazy factories: their
//! descriptor is advertised immediately and the instance is built on first
//! use, then cached.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::tool::{Tool, ToolErrorKind, ToolResult};

/// Builds a tool on first use.
pub type ToolFactory = Box<dyn Fn() -> std::result::Result<Arc<dyn Tool>, ToolError> + Send + Sync>;

/// What the registry knows about a lazily constructed tool before it exists.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub enabled: bool,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            enabled: true,
        }
    }

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// One entry of a discovery catalog.
pub struct CatalogEntry {
    source: Source,
    aliases: Vec<String>,
}

impl CatalogEntry {
    pub fn eager(tool: Arc<dyn Tool>) -> Self {
        Self { source: Source::Ready(tool), aliases: Vec::new() }
    }

    pub fn lazy(descriptor: ToolDescriptor, factory: ToolFactory) -> Self {
        Self {
            source: Source::Lazy { descriptor, factory, instance: RwLock::new(None) },
            aliases: Vec::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    fn name(&self) -> &str {
        match &self.source {
            Source::Ready(tool) => tool.name(),
            Source::Lazy { descriptor, .. } => &descriptor.name,
        }
    }
}

enum Source {
    Ready(Arc<dyn Tool>),
    Lazy {
        descriptor: ToolDescriptor,
        factory: ToolFactory,
        instance: RwLock<Option<Arc<dyn Tool>>>,
    },
}

impl Source {
    fn definition(&self) -> ToolDefinition {
        match self {
            Self::Ready(tool) => tool.to_definition(),
            Self::Lazy { descriptor, .. } => descriptor.to_definition(),
        }
    }

    fn enabled(&self) -> bool {
        match self {
            Self::Ready(tool) => tool.enabled(),
            Self::Lazy { descriptor, .. } => descriptor.enabled,
        }
    }

    fn resolve(&self) -> std::result::Result<Arc<dyn Tool>, ToolError> {
        match self {
            Self::Ready(tool) => Ok(Arc::clone(tool)),
            Self::Lazy { descriptor, factory, instance } => {
                if let Some(tool) = instance.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
                    return Ok(Arc::clone(tool));
                }
                let mut slot = instance.write().unwrap_or_else(|e| e.into_inner());
                if let Some(tool) = slot.as_ref() {
                    return Ok(Arc::clone(tool));
                }
                debug!(tool = %descriptor.name, "Constructing lazily registered tool");
                let tool = factory()?;
                *slot = Some(Arc::clone(&tool));
                Ok(tool)
            }
        }
    }
}

struct Entry {
    name: String,
    source: Source,
}

/// A registry of available tools.
///
/// The tool loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up and execute tools when the LLM requests them
///
/// Registration is administrative and needs `&mut self`; lookups and
/// execution take `&self`, so a built registry can be shared behind an `Arc`.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    aliases: HashMap<String, String>,
}

/// Canonical form used for every name and alias lookup.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name,
    /// keeping the original registration position.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = normalize_name(tool.name());
        self.insert(name, Source::Ready(tool));
    }

    /// Register a tool that is constructed on first use.
    pub fn register_factory(&mut self, descriptor: ToolDescriptor, factory: ToolFactory) {
        let name = normalize_name(&descriptor.name);
        self.insert(name, Source::Lazy { descriptor, factory, instance: RwLock::new(None) });
    }

    /// Make `alias` resolve to `target`. Aliases never shadow real names.
    pub fn register_alias(&mut self, alias: &str, target: &str) {
        let alias = normalize_name(alias);
        if self.index.contains_key(&alias) {
            warn!(alias = %alias, "Alias collides with a registered tool name, ignoring");
            return;
        }
        self.aliases.insert(alias, normalize_name(target));
    }

    fn insert(&mut self, name: String, source: Source) {
        if let Some(&slot) = self.index.get(&name) {
            warn!(tool = %name, "Tool already registered, replacing previous definition");
            self.entries[slot].source = source;
            return;
        }
        debug!(tool = %name, "Registered tool");
        self.aliases.remove(&name);
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(Entry { name, source });
    }

    /// Register every catalog entry whose name is not registered yet.
    ///
    /// Running discovery again over the same catalog changes nothing, and a
    /// tool registered explicitly beforehand is left in place. Returns the
    /// number of newly registered tools.
    pub fn discover(&mut self, catalog: impl IntoIterator<Item = CatalogEntry>) -> usize {
        let mut added = 0;
        for entry in catalog {
            let name = normalize_name(entry.name());
            if !self.index.contains_key(&name) {
                self.insert(name.clone(), entry.source);
                added += 1;
            }
            for alias in &entry.aliases {
                self.register_alias(alias, &name);
            }
        }
        debug!(added, total = self.entries.len(), "Tool discovery complete");
        added
    }

    fn lookup(&self, name: &str) -> Option<&Entry> {
        let key = normalize_name(name);
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => *self.index.get(self.aliases.get(&key)?)?,
        };
        self.entries.get(slot)
    }

    /// Resolve a tool by name or alias, constructing lazy tools on demand.
    pub fn resolve(&self, name: &str) -> std::result::Result<Arc<dyn Tool>, ToolError> {
        self.lookup(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?
            .source
            .resolve()
    }

    /// Get a tool by name or alias. `None` if unknown or if construction failed.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        match self.resolve(name) {
            Ok(tool) => Some(tool),
            Err(ToolError::NotFound(_)) => None,
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool construction failed");
                None
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Whether the named tool is advertised to the model.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.lookup(name).is_some_and(|e| e.source.enabled())
    }

    /// Tool definitions for every enabled tool, in registration order.
    pub fn schemas(&self) -> Vec<ToolDefinition> {
        self.entries
            .iter()
            .filter(|e| e.source.enabled())
            .map(|e| e.source.definition())
            .collect()
    }

    /// Tool definitions including disabled tools.
    pub fn all_schemas(&self) -> Vec<ToolDefinition> {
        self.entries.iter().map(|e| e.source.definition()).collect()
    }

    /// Registered tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every tool and alias.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.aliases.clear();
    }

    /// Resolve, validate and invoke a tool.
    ///
    /// Never fails: unknown names, rejected arguments, tool errors and
    /// panics all come back as `ToolResult { ok: false, .. }`.
    pub async fn execute(&self, name: &str, arguments: Value) -> ToolResult {
        let tool = match self.resolve(name) {
            Ok(tool) => tool,
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool unavailable");
                return ToolResult::from_error(&e);
            }
        };

        if let Err(e) = tool.validate(&arguments) {
            debug!(tool = %name, error = %e, "Tool arguments rejected");
            return ToolResult::from_error(&e);
        }

        match AssertUnwindSafe(tool.execute(arguments)).catch_unwind().await {
            Ok(Ok(value)) => ToolResult::success(value),
            Ok(Err(e)) => {
                warn!(tool = %name, error = %e, "Tool execution failed");
                ToolResult::from_error(&e)
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!(tool = %name, reason = %reason, "Tool panicked");
                ToolResult::failure(
                    ToolErrorKind::ExecutionFailed,
                    format!("Tool execution failed: {name}: panicked: {reason}"),
                )
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: Value) -> std::result::Result<Value, ToolError> {
            Ok(json!({ "echo": arguments["text"] }))
        }
    }

    struct NamedTool {
        name: &'static str,
        description: &'static str,
        enabled: bool,
    }

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str { self.name }
        fn description(&self) -> &str { self.description }
        fn parameters_schema(&self) -> Value { json!({"type": "object"}) }
        fn enabled(&self) -> bool { self.enabled }
        async fn execute(&self, _arguments: Value) -> std::result::Result<Value, ToolError> {
            Ok(json!({ "from": self.description }))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str { "failing" }
        fn description(&self) -> &str { "Always fails" }
        fn parameters_schema(&self) -> Value { json!({"type": "object"}) }
        async fn execute(&self, _arguments: Value) -> std::result::Result<Value, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "failing".into(),
                reason: "dataset missing".into(),
            })
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn name(&self) -> &str { "panicking" }
        fn description(&self) -> &str { "Always panics" }
        fn parameters_schema(&self) -> Value { json!({"type": "object"}) }
        async fn execute(&self, _arguments: Value) -> std::result::Result<Value, ToolError> {
            panic!("index out of range");
        }
    }

    fn named(name: &'static str, description: &'static str) -> Arc<dyn Tool> {
        Arc::new(NamedTool { name, description, enabled: true })
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("  ECHO ").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn registry_schemas_follow_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(named("zeta", "z"));
        registry.register(named("alpha", "a"));
        registry.register(named("mid", "m"));
        let names: Vec<String> = registry.schemas().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn registry_last_write_wins_in_place() {
        let mut registry = ToolRegistry::new();
        registry.register(named("first", "old"));
        registry.register(named("second", "2"));
        registry.register(named("FIRST", "new"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["first", "second"]);
        let result = registry.execute("first", json!({})).await;
        assert_eq!(result.value["from"], "new");
    }

    #[test]
    fn disabled_tools_are_not_advertised() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(NamedTool { name: "hidden", description: "h", enabled: false }));
        registry.register(named("shown", "s"));
        assert_eq!(registry.schemas().len(), 1);
        assert_eq!(registry.all_schemas().len(), 2);
        assert!(!registry.is_enabled("hidden"));
        assert!(registry.contains("hidden"));
    }

    #[test]
    fn discovery_is_idempotent() {
        let catalog = || {
            vec![
                CatalogEntry::eager(Arc::new(EchoTool)).with_alias("EchoTool"),
                CatalogEntry::eager(named("memory", "m")),
            ]
        };
        let mut registry = ToolRegistry::new();
        assert_eq!(registry.discover(catalog()), 2);
        assert_eq!(registry.discover(catalog()), 0);
        assert_eq!(registry.names(), vec!["echo", "memory"]);
        assert!(registry.get("echotool").is_some());
    }

    #[tokio::test]
    async fn lazy_factory_builds_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let mut registry = ToolRegistry::new();
        registry.register_factory(
            ToolDescriptor::new("echo", "Echoes back the input", json!({"type": "object"})),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(EchoTool) as Arc<dyn Tool>)
            }),
        );

        assert_eq!(registry.schemas()[0].name, "echo");
        assert_eq!(builds.load(Ordering::SeqCst), 0);

        registry.execute("echo", json!({"text": "a"})).await;
        registry.execute("echo", json!({"text": "b"})).await;
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn lazy_factory_failure_is_execution_failure() {
        let mut registry = ToolRegistry::new();
        registry.register_factory(
            ToolDescriptor::new("broken", "never builds", json!({"type": "object"})),
            Box::new(|| {
                Err(ToolError::ExecutionFailed {
                    tool_name: "broken".into(),
                    reason: "no credentials".into(),
                })
            }),
        );
        assert!(registry.get("broken").is_none());
        let result = registry.execute("broken", json!({})).await;
        assert_eq!(result.error_kind(), Some(ToolErrorKind::ExecutionFailed));
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let result = registry.execute("echo", json!({"text": "hello world"})).await;
        assert!(result.ok);
        assert_eq!(result.value["echo"], "hello world");
    }

    #[tokio::test]
    async fn registry_execute_failures_are_normalized() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(FailingTool));
        registry.register(Arc::new(PanickingTool));

        let missing = registry.execute("nonexistent", json!({})).await;
        assert_eq!(missing.error_kind(), Some(ToolErrorKind::NotFound));

        let invalid = registry.execute("echo", json!({"text": 7})).await;
        assert_eq!(invalid.error_kind(), Some(ToolErrorKind::InvalidArguments));

        let failed = registry.execute("failing", json!({})).await;
        assert_eq!(failed.error_kind(), Some(ToolErrorKind::ExecutionFailed));
        assert!(failed.to_content().contains("dataset missing"));

        let panicked = registry.execute("panicking", json!({})).await;
        assert_eq!(panicked.error_kind(), Some(ToolErrorKind::ExecutionFailed));
        assert!(panicked.to_content().contains("index out of range"));
    }

    #[test]
    fn clear_removes_everything() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register_alias("repeat", "echo");
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.get("repeat").is_none());
    }
}
