//! System prompt assembly.
//!
//! The system prompt is rebuilt from scratch every turn, in a fixed order:
//! the personality text (`SOUL`) with custom instructions substituted into
//! `{custom_instructions}`, then the `MEMORY` block with the current notes in
//! `{memory_notes}`. Nothing else goes in. Empty sections are skipped.

use std::sync::Arc;

use dekomposit_core::memory::MemoryNote;
use dekomposit_core::prompts::{self, PromptLibrary};

const NO_NOTES: &str = "No memory notes yet";

#[derive(Debug, Clone)]
pub struct PromptComposer {
    prompts: Arc<PromptLibrary>,
    custom_instructions: String,
}

impl PromptComposer {
    pub fn new(prompts: Arc<PromptLibrary>) -> Self {
        Self {
            prompts,
            custom_instructions: String::new(),
        }
    }

    pub fn with_custom_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.custom_instructions = instructions.into();
        self
    }

    pub fn prompts(&self) -> &PromptLibrary {
        &self.prompts
    }

    /// Build the system prompt for the given notes.
    pub fn compose(&self, notes: &[MemoryNote]) -> String {
        compose_system_prompt(&self.prompts, &self.custom_instructions, notes)
    }
}

/// Render notes as a compact bullet list.
pub fn render_notes(notes: &[MemoryNote]) -> String {
    if notes.is_empty() {
        return NO_NOTES.to_string();
    }
    notes
        .iter()
        .map(|n| format!("- {}", n.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn compose_system_prompt(library: &PromptLibrary, custom_instructions: &str, notes: &[MemoryNote]) -> String {
    let mut sections = Vec::with_capacity(2);

    let soul = library.render(prompts::SOUL, &[("custom_instructions", custom_instructions.trim())]);
    if !soul.trim().is_empty() {
        sections.push(soul.trim().to_string());
    }

    let rendered_notes = render_notes(notes);
    let memory = library.render(prompts::MEMORY, &[("memory_notes", &rendered_notes)]);
    if !memory.trim().is_empty() {
        sections.push(memory.trim().to_string());
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notes(texts: &[&str]) -> Vec<MemoryNote> {
        texts
            .iter()
            .map(|t| MemoryNote::new(*t, serde_json::Map::new()))
            .collect()
    }

    fn library() -> PromptLibrary {
        let mut lib = PromptLibrary::empty();
        lib.insert(prompts::SOUL, "You are a tutor.\n{custom_instructions}");
        lib.insert(prompts::MEMORY, "## Notes\n{memory_notes}");
        lib
    }

    #[test]
    fn sections_in_fixed_order() {
        let out = compose_system_prompt(&library(), "Be brief.", &notes(&["learning Slovak", "prefers Ukrainian"]));
        assert_eq!(
            out,
            "You are a tutor.\nBe brief.\n\n## Notes\n- learning Slovak\n- prefers Ukrainian"
        );
    }

    #[test]
    fn identical_inputs_identical_output() {
        let lib = library();
        let n = notes(&["a", "b"]);
        let first = compose_system_prompt(&lib, "x", &n);
        let second = compose_system_prompt(&lib, "x", &n.clone());
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn empty_notes_placeholder() {
        let out = compose_system_prompt(&library(), "", &[]);
        assert!(out.ends_with("## Notes\nNo memory notes yet"));
        assert!(out.starts_with("You are a tutor."));
    }

    #[test]
    fn missing_sections_are_skipped() {
        let mut lib = PromptLibrary::empty();
        lib.insert(prompts::MEMORY, "{memory_notes}");
        assert_eq!(compose_system_prompt(&lib, "ignored", &notes(&["x"])), "- x");
    }

    #[test]
    fn builtin_library_composes() {
        let composer = PromptComposer::new(Arc::new(PromptLibrary::builtin()))
            .with_custom_instructions("Answer in Slovak.");
        let out = composer.compose(&notes(&["likes cats"]));
        assert!(out.contains("Answer in Slovak."));
        assert!(out.contains("- likes cats"));
        assert!(!out.contains("{custom_instructions}"));
    }
}
