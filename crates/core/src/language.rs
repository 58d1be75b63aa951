//! Supported languages and script-based language guessing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Languages the agent can route translations between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Es,
    Fr,
    De,
    It,
    Pt,
    Pl,
    Uk,
    Sk,
    Ru,
    Cs,
    Zh,
    Ja,
}

impl Language {
    pub const ALL: [Language; 13] = [
        Self::En, Self::Es, Self::Fr, Self::De, Self::It, Self::Pt, Self::Pl,
        Self::Uk, Self::Sk, Self::Ru, Self::Cs, Self::Zh, Self::Ja,
    ];

    /// ISO 639-1 code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
            Self::Fr => "fr",
            Self::De => "de",
            Self::It => "it",
            Self::Pt => "pt",
            Self::Pl => "pl",
            Self::Uk => "uk",
            Self::Sk => "sk",
            Self::Ru => "ru",
            Self::Cs => "cs",
            Self::Zh => "zh",
            Self::Ja => "ja",
        }
    }

    /// English display name.
    pub fn english_name(&self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Es => "Spanish",
            Self::Fr => "French",
            Self::De => "German",
            Self::It => "Italian",
            Self::Pt => "Portuguese",
            Self::Pl => "Polish",
            Self::Uk => "Ukrainian",
            Self::Sk => "Slovak",
            Self::Ru => "Russian",
            Self::Cs => "Czech",
            Self::Zh => "Chinese",
            Self::Ja => "Japanese",
        }
    }

    /// Parse a code ("ru"), a regional tag ("pt-BR") or an English name
    /// ("Russian"), case-insensitively.
    pub fn parse(input: &str) -> Option<Self> {
        let needle = input.trim().to_lowercase();
        let primary = needle.split(['-', '_']).next().unwrap_or_default();
        Self::ALL.into_iter().find(|lang| {
            lang.code() == primary || lang.english_name().eq_ignore_ascii_case(&needle)
        })
    }

    /// All codes, for use as a JSON schema `enum`.
    pub fn codes() -> Vec<&'static str> {
        Self::ALL.iter().map(Language::code).collect()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unsupported language: {s}"))
    }
}

const UKRAINIAN_MARKERS: &[char] = &['і', 'ї', 'є', 'ґ'];
const RUSSIAN_MARKERS: &[char] = &['ъ', 'ы', 'э', 'ё'];
const SLOVAK_MARKERS: &[char] = &[
    'á', 'ä', 'č', 'ď', 'é', 'í', 'ĺ', 'ľ', 'ň', 'ó', 'ô', 'ŕ', 'š', 'ť', 'ú', 'ý', 'ž',
];

/// Guess a language from the characters used.
///
/// Only distinguishes the scripts the agent sees most: Cyrillic text is
/// Ukrainian or Russian by their unique letters (Ukrainian when neither
/// appears), Latin text with Slovak diacritics is Slovak, other Latin text
/// is English.
pub fn detect_heuristic(text: &str) -> Option<Language> {
    let lower = text.to_lowercase();

    if lower.chars().any(|c| ('\u{0400}'..='\u{04FF}').contains(&c)) {
        if lower.chars().any(|c| UKRAINIAN_MARKERS.contains(&c)) {
            return Some(Language::Uk);
        }
        if lower.chars().any(|c| RUSSIAN_MARKERS.contains(&c)) {
            return Some(Language::Ru);
        }
        return Some(Language::Uk);
    }

    if lower.chars().any(|c| SLOVAK_MARKERS.contains(&c)) {
        return Some(Language::Sk);
    }

    if lower.chars().any(|c| c.is_ascii_alphabetic()) {
        return Some(Language::En);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_codes_tags_and_names() {
        assert_eq!(Language::parse("ru"), Some(Language::Ru));
        assert_eq!(Language::parse(" SK "), Some(Language::Sk));
        assert_eq!(Language::parse("pt-BR"), Some(Language::Pt));
        assert_eq!(Language::parse("Russian"), Some(Language::Ru));
        assert_eq!(Language::parse("klingon"), None);
        assert!("xx".parse::<Language>().is_err());
    }

    #[test]
    fn serde_uses_codes() {
        let json = serde_json::to_string(&Language::Uk).unwrap();
        assert_eq!(json, "\"uk\"");
        assert_eq!(Language::Zh.to_string(), "zh");
        assert_eq!(Language::codes().len(), 13);
    }

    #[test]
    fn heuristic_detection() {
        assert_eq!(detect_heuristic("Ahoj, ako sa máš?"), Some(Language::Sk));
        assert_eq!(detect_heuristic("Привіт, як справи?"), Some(Language::Uk));
        assert_eq!(detect_heuristic("Это хорошо"), Some(Language::Ru));
        assert_eq!(detect_heuristic("Привет"), Some(Language::Uk));
        assert_eq!(detect_heuristic("translate 'dog' to Russian"), Some(Language::En));
        assert_eq!(detect_heuristic("12345 !?"), None);
    }
}
