//! Prompt library: named instruction texts loaded from markdown files.
//!
//! Every `*.md` file under the prompt directory becomes one entry, keyed by
//! its path relative to that directory with separators turned into dots and
//! the extension dropped:
//!
//! ```text
//! prompts/SOUL.md          -> "SOUL"
//! prompts/routing.md       -> "routing"
//! prompts/tools/detect.md  -> "tools.detect"
//! ```
//!
//! Files override the built-in defaults of the same name. A missing
//! directory is not an error; the defaults are used on their own.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Personality prompt. `{custom_instructions}` receives user-specific text.
pub const SOUL: &str = "SOUL";
/// Memory block template. `{memory_notes}` receives the rendered notes.
pub const MEMORY: &str = "MEMORY";
/// Routing classifier instructions.
pub const ROUTING: &str = "routing";
/// Language detection instructions.
pub const DETECTION: &str = "detection";
/// User turn fed to the tool loop for translate-routed requests.
/// Placeholders: `{source}`, `{target}`, `{text}`.
pub const TRANSLATION_REQUEST: &str = "translation_request";

const DEFAULT_SOUL: &str = "\
You are dekomposit, a friendly language-learning companion.
You help people understand and translate words and phrases between languages.
Answer in the language the user writes in unless they ask otherwise.
Keep answers short and concrete, and explain nuances when they matter.

{custom_instructions}";

const DEFAULT_MEMORY: &str = "\
## Memory Notes

{memory_notes}";

const DEFAULT_ROUTING: &str = "\
Decide how to handle the user's latest message.
Use action \"translate\" only when the user explicitly asks for a translation,
and fill source_lang and target_lang with language codes when they are known.
Use action \"respond\" for everything else.
Put the exact text that should be translated (or the user's message) in \"text\".";

const DEFAULT_DETECTION: &str = "\
Identify the language of the user's text.
Reply with the language code and your confidence (high, medium or low).";

const DEFAULT_TRANSLATION_REQUEST: &str = "\
Translate the following text from {source} to {target} using the translation tool, \
then present the result to the user.

Text: {text}";

/// A set of named prompt texts.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptLibrary {
    prompts: BTreeMap<String, String>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptLibrary {
    /// A library without any entries.
    pub fn empty() -> Self {
        Self { prompts: BTreeMap::new() }
    }

    /// The built-in defaults only.
    pub fn builtin() -> Self {
        let mut library = Self::empty();
        library.insert(SOUL, DEFAULT_SOUL);
        library.insert(MEMORY, DEFAULT_MEMORY);
        library.insert(ROUTING, DEFAULT_ROUTING);
        library.insert(DETECTION, DEFAULT_DETECTION);
        library.insert(TRANSLATION_REQUEST, DEFAULT_TRANSLATION_REQUEST);
        library
    }

    /// Built-in defaults overlaid with every `*.md` file under `dir`.
    pub fn load(dir: &Path) -> Self {
        let mut library = Self::builtin();
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "Prompt directory not found, using built-in prompts");
            return library;
        }
        let mut loaded = 0;
        Self::load_recursive(dir, dir, &mut library, &mut loaded);
        debug!(dir = %dir.display(), loaded, "Prompt files loaded");
        library
    }

    fn load_recursive(root: &Path, dir: &Path, library: &mut Self, loaded: &mut usize) {
        let mut entries: Vec<_> = match std::fs::read_dir(dir) {
            Ok(rd) => rd.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to read prompt directory");
                return;
            }
        };
        // Sort for deterministic ordering
        entries.sort();

        for path in entries {
            if path.is_dir() {
                Self::load_recursive(root, &path, library, loaded);
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
                continue;
            }
            let Some(key) = Self::key_for(root, &path) else { continue };
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    debug!(file = %path.display(), key = %key, "Loaded prompt file");
                    library.insert(&key, content.trim());
                    *loaded += 1;
                }
                Err(e) => warn!(file = %path.display(), error = %e, "Failed to read prompt file"),
            }
        }
    }

    fn key_for(root: &Path, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(root).ok()?.with_extension("");
        let parts: Vec<&str> = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect();
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("."))
    }

    pub fn insert(&mut self, name: &str, text: impl Into<String>) {
        self.prompts.insert(name.to_string(), text.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.prompts.get(name).map(String::as_str)
    }

    /// The named prompt, or an empty string.
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or_default()
    }

    /// Prompt names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.prompts.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Render the named prompt with `{key}` placeholders substituted.
    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> String {
        render_template(self.get_or_empty(name), vars)
    }
}

/// Substitute `{key}` placeholders. Unknown placeholders are left untouched.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn builtin_prompts_cover_known_names() {
        let library = PromptLibrary::builtin();
        for name in [SOUL, MEMORY, ROUTING, DETECTION, TRANSLATION_REQUEST] {
            assert!(library.get(name).is_some(), "missing {name}");
        }
        assert!(library.get_or_empty(SOUL).contains("{custom_instructions}"));
        assert!(library.get_or_empty(MEMORY).contains("{memory_notes}"));
    }

    #[test]
    fn missing_directory_falls_back_to_builtin() {
        let library = PromptLibrary::load(Path::new("/nonexistent/prompts/dir"));
        assert_eq!(library, PromptLibrary::builtin());
    }

    #[test]
    fn files_are_keyed_by_dotted_relative_path() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("SOUL.md"), "  Custom soul {custom_instructions}\n").unwrap();
        fs::create_dir(tmp.path().join("tools")).unwrap();
        fs::write(tmp.path().join("tools").join("detect.md"), "Detect it").unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let library = PromptLibrary::load(tmp.path());
        assert_eq!(library.get(SOUL), Some("Custom soul {custom_instructions}"));
        assert_eq!(library.get("tools.detect"), Some("Detect it"));
        assert!(library.get("notes").is_none());
        assert!(library.get(ROUTING).is_some());
    }

    #[test]
    fn render_substitutes_placeholders() {
        let library = PromptLibrary::builtin();
        let text = library.render(
            TRANSLATION_REQUEST,
            &[("source", "English"), ("target", "Russian"), ("text", "dog")],
        );
        assert!(text.contains("from English to Russian"));
        assert!(text.ends_with("Text: dog"));
        assert_eq!(render_template("{a} and {b}", &[("a", "x")]), "x and {b}");
    }
}
