//! Script detection for the translate operation.
//!
//! Translation is a fixed Japanese <-> English pair: text containing any
//! Japanese script goes to English, everything else goes to Japanese.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Japanese,
    English,
}

impl Language {
    /// Name used inside the translate prompt.
    pub fn name(&self) -> &'static str {
        match self {
            Language::Japanese => "Japanese",
            Language::English => "English",
        }
    }

    pub fn counterpart(&self) -> Language {
        match self {
            Language::Japanese => Language::English,
            Language::English => Language::Japanese,
        }
    }
}

fn japanese_script() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[\p{Hiragana}\p{Katakana}\p{Han}]").expect("static pattern is valid")
    })
}

pub fn detect_language(text: &str) -> Language {
    if japanese_script().is_match(text) {
        Language::Japanese
    } else {
        Language::English
    }
}

/// Language the text should be translated into.
pub fn translation_target(text: &str) -> Language {
    detect_language(text).counterpart()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kana_and_kanji_are_japanese() {
        assert_eq!(detect_language("こんにちは"), Language::Japanese);
        assert_eq!(detect_language("カタカナ"), Language::Japanese);
        assert_eq!(detect_language("漢字"), Language::Japanese);
    }

    #[test]
    fn a_single_japanese_character_is_enough() {
        assert_eq!(detect_language("Error: ファイル not found"), Language::Japanese);
    }

    #[test]
    fn latin_text_is_english() {
        assert_eq!(detect_language("Hello, world"), Language::English);
        assert_eq!(detect_language(""), Language::English);
    }

    #[test]
    fn target_swaps_the_pair() {
        assert_eq!(translation_target("日本語のテキスト"), Language::English);
        assert_eq!(translation_target("plain text"), Language::Japanese);
    }
}
