//! `dekomposit tools`: list registered tools.

use std::sync::Arc;

use dekomposit_config::AppConfig;
use dekomposit_core::prompts::PromptLibrary;
use dekomposit_memory::InMemoryStore;
use dekomposit_tools::ToolContext;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Listing needs no provider; nothing here calls a tool.
    let registry = dekomposit_tools::default_registry(&ToolContext {
        memory: Arc::new(InMemoryStore::default()),
        provider: None,
        model: config.llm.model.clone(),
        prompts: Arc::new(PromptLibrary::load(&config.prompts.resolved_dir())),
        translation: config.translation.clone(),
    });

    println!("  {:<22} {:<8} DESCRIPTION", "TOOL", "EXPOSED");
    for def in registry.all_schemas() {
        let exposed = if registry.is_enabled(&def.name) { "yes" } else { "no" };
        println!("  {:<22} {:<8} {}", def.name, exposed, def.description);
    }
    Ok(())
}
