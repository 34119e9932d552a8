/*!
 * Advisory quality checks over aligned rows.
 *
 * Issues annotate rows for review; they never drop or alter a row.
 */

use std::fmt;

use serde::{Deserialize, Serialize};

use super::parser::AlignmentRow;
use crate::language::Language;

/// Below this own-language ratio a fragment does not look like its language
pub const LOW_RATIO: f64 = 0.2;

/// Above this ratio a fragment looks like the given language
pub const HIGH_RATIO: f64 = 0.4;

/// Longer side over shorter side, in characters
pub const MAX_LENGTH_RATIO: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    LanguageMismatch,
    LengthAnomaly,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LanguageMismatch => write!(f, "language-mismatch"),
            Self::LengthAnomaly => write!(f, "length-anomaly"),
        }
    }
}

/// One flagged row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// 0-based index into the checked rows
    pub row_index: usize,
    pub kind: IssueKind,
    pub detail: String,
    pub source: String,
    pub target: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} [{}]: {}", self.row_index + 1, self.kind, self.detail)
    }
}

/// Flags language swaps and length anomalies for a language pair
#[derive(Debug, Clone, Copy)]
pub struct QualityChecker {
    source_language: Language,
    target_language: Language,
}

impl QualityChecker {
    pub fn new(source_language: Language, target_language: Language) -> Self {
        Self {
            source_language,
            target_language,
        }
    }

    pub fn source_language(&self) -> Language {
        self.source_language
    }

    pub fn target_language(&self) -> Language {
        self.target_language
    }

    /// Check every row; issues come back in row order
    pub fn check(&self, rows: &[AlignmentRow]) -> Vec<Issue> {
        let mut issues = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            // Unmatched rows have nothing to compare against
            if row.source.is_empty() || row.target.is_empty() {
                continue;
            }
            if let Some(detail) = self.language_mismatch(row) {
                issues.push(Self::issue(index, IssueKind::LanguageMismatch, detail, row));
            }
            if let Some(detail) = length_anomaly(row) {
                issues.push(Self::issue(index, IssueKind::LengthAnomaly, detail, row));
            }
        }
        issues
    }

    fn issue(row_index: usize, kind: IssueKind, detail: String, row: &AlignmentRow) -> Issue {
        Issue {
            row_index,
            kind,
            detail,
            source: row.source.clone(),
            target: row.target.clone(),
        }
    }

    fn language_mismatch(&self, row: &AlignmentRow) -> Option<String> {
        let (src, tgt) = (self.source_language, self.target_language);

        let src_in_source = src.char_ratio(&row.source);
        let src_in_target = src.char_ratio(&row.target);
        if src_in_source < LOW_RATIO && src_in_target > HIGH_RATIO {
            return Some(format!(
                "source fragment looks like target language ({} ratio {:.2} in source, {:.2} in target)",
                src.name(),
                src_in_source,
                src_in_target
            ));
        }

        let tgt_in_target = tgt.char_ratio(&row.target);
        let tgt_in_source = tgt.char_ratio(&row.source);
        if tgt_in_target < LOW_RATIO && tgt_in_source > HIGH_RATIO {
            return Some(format!(
                "target fragment looks like source language ({} ratio {:.2} in target, {:.2} in source)",
                tgt.name(),
                tgt_in_target,
                tgt_in_source
            ));
        }

        // Same-script pairs share a character class; an untranslated copy is
        // still on the wrong side for one of the languages
        if src != tgt
            && row.source.trim() == row.target.trim()
            && row.source.chars().any(char::is_alphabetic)
            && !looks_like_name_or_code(&row.source)
        {
            return Some("source fragment looks like target language (identical text on both sides)".to_string());
        }

        None
    }
}

/// Lower-case words allowed inside a multi-word proper name
const NAME_CONNECTORS: &[&str] = &["of", "and", "the", "for", "de", "du", "des", "la", "le", "von", "van", "y"];

/// Codes, acronyms and multi-word proper names legitimately stay the same in a translation
fn looks_like_name_or_code(text: &str) -> bool {
    if text.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }

    let words: Vec<&str> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect();
    let is_acronym = |w: &&str| w.chars().count() >= 2 && w.chars().all(|c| c.is_uppercase() || c == '.' || c == '-');
    if !words.is_empty() && words.iter().all(is_acronym) {
        return true;
    }

    let capitalized = |w: &&str| w.chars().next().is_some_and(char::is_uppercase);
    words.len() >= 2
        && words.first().is_some_and(capitalized)
        && words
            .iter()
            .all(|w| capitalized(w) || NAME_CONNECTORS.contains(&w.to_lowercase().as_str()))
}

fn length_anomaly(row: &AlignmentRow) -> Option<String> {
    let source_len = row.source.chars().count();
    let target_len = row.target.chars().count();
    let (longer, shorter) = (source_len.max(target_len), source_len.min(target_len));
    if shorter == 0 {
        return None;
    }

    let ratio = longer as f64 / shorter as f64;
    (ratio > MAX_LENGTH_RATIO).then(|| {
        format!(
            "length ratio {:.1} (source {} chars, target {} chars)",
            ratio, source_len, target_len
        )
    })
}
