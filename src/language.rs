/*!
 * Supported languages and language-aware unit counting.
 *
 * Every size computation in the pipeline (split budgets, overlap buffers,
 * quality ratios) is expressed in *units*: characters for logographic
 * scripts and words for space-delimited ones. Each language carries the
 * character-class pattern used to count them.
 */

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A language the aligner knows how to measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Chinese,
    English,
    Spanish,
    Portuguese,
    Japanese,
    Russian,
    Korean,
    Arabic,
    French,
    Polish,
    Italian,
    German,
}

struct LanguageSpec {
    language: Language,
    code: &'static str,
    name: &'static str,
    native_name: &'static str,
    pattern: &'static str,
    word_based: bool,
}

static SPECS: &[LanguageSpec] = &[
    LanguageSpec { language: Language::Chinese, code: "zh", name: "Chinese", native_name: "中文", pattern: r"[\x{4e00}-\x{9fa5}]", word_based: false },
    LanguageSpec { language: Language::English, code: "en", name: "English", native_name: "English", pattern: r"\b[a-zA-Z]+\b", word_based: true },
    LanguageSpec { language: Language::Spanish, code: "es", name: "Spanish", native_name: "Español", pattern: r"\b[a-zA-ZáéíóúüñÁÉÍÓÚÜÑ]+\b", word_based: true },
    LanguageSpec { language: Language::Portuguese, code: "pt", name: "Portuguese", native_name: "Português", pattern: r"\b[a-zA-ZáéíóúâêôãõçÁÉÍÓÚÂÊÔÃÕÇ]+\b", word_based: true },
    LanguageSpec { language: Language::Japanese, code: "ja", name: "Japanese", native_name: "日本語", pattern: r"[\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{4E00}-\x{9FAF}]", word_based: false },
    LanguageSpec { language: Language::Russian, code: "ru", name: "Russian", native_name: "Русский", pattern: r"\b[а-яА-ЯёЁ]+\b", word_based: true },
    LanguageSpec { language: Language::Korean, code: "ko", name: "Korean", native_name: "한국어", pattern: r"[\x{AC00}-\x{D7AF}\x{1100}-\x{11FF}]", word_based: false },
    LanguageSpec { language: Language::Arabic, code: "ar", name: "Arabic", native_name: "العربية", pattern: r"[\x{0600}-\x{06FF}\x{0750}-\x{077F}]+", word_based: true },
    LanguageSpec { language: Language::French, code: "fr", name: "French", native_name: "Français", pattern: r"\b[a-zA-ZàâäéèêëïîôùûüÿœæçÀÂÄÉÈÊËÏÎÔÙÛÜŸŒÆÇ]+\b", word_based: true },
    LanguageSpec { language: Language::Polish, code: "pl", name: "Polish", native_name: "Polski", pattern: r"\b[a-zA-ZąćęłńóśźżĄĆĘŁŃÓŚŹŻ]+\b", word_based: true },
    LanguageSpec { language: Language::Italian, code: "it", name: "Italian", native_name: "Italiano", pattern: r"\b[a-zA-ZàèéìíîòóùúÀÈÉÌÍÎÒÓÙÚ]+\b", word_based: true },
    LanguageSpec { language: Language::German, code: "de", name: "German", native_name: "Deutsch", pattern: r"\b[a-zA-ZäöüßÄÖÜ]+\b", word_based: true },
];

// Compiled in the same order as SPECS
static PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    SPECS
        .iter()
        .map(|spec| Regex::new(spec.pattern).expect("language pattern must compile"))
        .collect()
});

impl Language {
    /// All supported languages, in display order
    pub fn all() -> impl Iterator<Item = Language> {
        SPECS.iter().map(|s| s.language)
    }

    fn index(self) -> usize {
        SPECS.iter().position(|s| s.language == self).unwrap_or(0)
    }

    fn spec(self) -> &'static LanguageSpec {
        &SPECS[self.index()]
    }

    /// ISO 639-1 code
    pub fn code(self) -> &'static str {
        self.spec().code
    }

    /// English name
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn native_name(self) -> &'static str {
        self.spec().native_name
    }

    /// Logographic scripts are measured in characters and never post-split
    pub fn is_logographic(self) -> bool {
        !self.spec().word_based
    }

    /// Character-class pattern for this language
    pub fn char_class(self) -> &'static Regex {
        &PATTERNS[self.index()]
    }

    /// Count units (characters or words) in `text`
    pub fn count_units(self, text: &str) -> usize {
        self.char_class().find_iter(text).count()
    }

    /// Fraction of the characters of `text` covered by this language's class
    pub fn char_ratio(self, text: &str) -> f64 {
        let total = text.chars().count();
        if total == 0 {
            return 0.0;
        }
        let matched: usize = self
            .char_class()
            .find_iter(text)
            .map(|m| m.as_str().chars().count())
            .sum();
        matched as f64 / total as f64
    }

    /// Sentence-ending punctuation the oracle should segment on
    pub fn sentence_terminators(self) -> &'static str {
        if self.is_logographic() { "。！？" } else { ". ! ?" }
    }

    /// Resolve a language from an English or native name, or an ISO 639-1 / 639-2 code
    pub fn resolve(input: &str) -> Result<Language> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return Err(anyhow!("Empty language identifier"));
        }

        if let Some(spec) = SPECS.iter().find(|s| {
            s.code == needle
                || s.name.to_lowercase() == needle
                || s.native_name.to_lowercase() == needle
        }) {
            return Ok(spec.language);
        }

        let part1 = normalize_to_part1(&needle)?;
        SPECS
            .iter()
            .find(|s| s.code == part1)
            .map(|s| s.language)
            .ok_or_else(|| anyhow!("Unsupported language: {}", input))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Language::resolve(s)
    }
}

/// Map ISO 639-2/B codes onto their 639-2/T equivalents
fn part2b_to_part2t(code: &str) -> &str {
    match code {
        "fre" => "fra",
        "ger" => "deu",
        "chi" => "zho",
        "dut" => "nld",
        "gre" => "ell",
        "cze" => "ces",
        "per" => "fas",
        "rum" => "ron",
        _ => code,
    }
}

/// Normalize a 2- or 3-letter code to ISO 639-1
pub fn normalize_to_part1(code: &str) -> Result<String> {
    let normalized = code.trim().to_lowercase();

    match normalized.len() {
        2 => isolang::Language::from_639_1(&normalized)
            .map(|_| normalized.clone())
            .ok_or_else(|| anyhow!("Invalid language code: {}", code)),
        3 => {
            let part2t = part2b_to_part2t(&normalized);
            isolang::Language::from_639_3(part2t)
                .and_then(|lang| lang.to_639_1())
                .map(|c| c.to_string())
                .ok_or_else(|| anyhow!("No ISO 639-1 code for: {}", code))
        }
        _ => Err(anyhow!("Invalid language code: {}", code)),
    }
}
