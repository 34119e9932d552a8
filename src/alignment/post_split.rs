/*!
 * Sentence-level refinement of aligned rows.
 *
 * The oracle sometimes returns several source sentences, or a whole
 * enumerated list, as one row. For space-delimited source languages those
 * rows are sent back to the oracle with a narrower "split this pair"
 * instruction. A split is only kept when the oracle confirms it and the
 * pieces reproduce the original source text.
 */

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::parser::{self, AlignmentRow};
use super::prompts;
use crate::language::Language;
use crate::providers::{Oracle, OracleRequest};
use crate::tracker::ProgressSink;

static ABBREVIATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "etc", "e.g", "i.e", "vs", "cf", "ibid", "op", "cit", "mr", "mrs", "ms", "dr", "prof",
        "jr", "sr", "st", "inc", "ltd", "co", "corp", "llc", "l.l.c", "u.s", "u.k", "u.n", "e.u",
        "u.s.a", "a.m", "p.m", "no", "vol", "fig", "ch", "sec", "pp", "approx", "est", "max",
        "min", "avg",
    ]
    .into_iter()
    .collect()
});

// The regex crate has no lookbehind, so "not preceded by a letter" is spelled
// as an explicit start-or-non-letter group.
static ENUMERATION_MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?:^|\s)\d+\.\s",
        r"(?:^|[^A-Za-z.])[A-Za-z]\.\s",
        r"\([0-9]+\)\s",
        r"\([A-Za-z]\)\s",
        r"(?:^|[^A-Za-z])[IVXivx]+\.\s",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// True if the text contains a list marker such as `1. `, `b. `, `(3) ` or `IV. `
pub fn has_enumeration_marker(text: &str) -> bool {
    ENUMERATION_MARKERS.iter().any(|re| re.is_match(text))
}

/// Whether the period at byte offset `pos` belongs to an abbreviation or
/// continued numbering rather than ending a sentence
fn is_abbreviation_period(text: &str, pos: usize) -> bool {
    if pos == 0 {
        return false;
    }

    if let Some(next) = text[pos + 1..].chars().next() {
        if next.is_alphanumeric() {
            return true;
        }
    }

    let mut tokens = text[..pos].split_whitespace().rev();
    let Some(last) = tokens.next() else {
        return false;
    };

    let lowered = last.to_lowercase();
    let key = lowered.trim_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | '(' | '"' | '\''));
    if ABBREVIATIONS.contains(key) {
        return true;
    }
    if key == "al" && tokens.next().is_some_and(|prev| prev.eq_ignore_ascii_case("et")) {
        return true;
    }

    // Initials: "J. K. Rowling"
    if key.chars().count() == 1 && key.chars().all(char::is_alphabetic) {
        let after_initial = tokens.next().is_some_and(is_initial);
        let before_initial = text[pos + 1..].split_whitespace().next().is_some_and(is_initial);
        return after_initial || before_initial;
    }

    last.contains('.')
}

/// A single letter followed by a period, like `J.`
fn is_initial(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(c), Some('.'), None) if c.is_alphabetic()
    )
}

/// Count sentence-ending marks, ignoring abbreviation periods; at least 1
pub fn count_real_sentences(text: &str) -> usize {
    let count = text
        .char_indices()
        .filter(|&(pos, c)| match c {
            '!' | '?' => true,
            '.' => !is_abbreviation_period(text, pos),
            _ => false,
        })
        .count();
    count.max(1)
}

/// Whether a source fragment holds more than one sentence or list item
pub fn needs_splitting(fragment: &str) -> bool {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return false;
    }
    has_enumeration_marker(fragment) || count_real_sentences(fragment) > 1
}

fn without_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Pieces are accepted only if their sources concatenate back to the original
fn reconstructs_source(original: &str, pieces: &[AlignmentRow]) -> bool {
    let joined: String = pieces.iter().map(|p| p.source.as_str()).collect();
    without_whitespace(&joined) == without_whitespace(original)
}

/// Splits multi-sentence rows through the oracle
#[derive(Debug, Clone, Copy)]
pub struct SentencePostSplitter {
    enabled: bool,
    temperature: f32,
}

impl Default for SentencePostSplitter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SentencePostSplitter {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            temperature: 0.1,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Return `row` split into sentence-level rows, or unchanged
    pub async fn maybe_split(
        &self,
        row: AlignmentRow,
        source_language: Language,
        oracle: &dyn Oracle,
        sink: &dyn ProgressSink,
    ) -> Vec<AlignmentRow> {
        if !self.enabled || source_language.is_logographic() || !needs_splitting(&row.source) {
            return vec![row];
        }

        let request = OracleRequest::new(
            prompts::split_row_system_prompt(source_language),
            prompts::split_row_payload(&row),
        )
        .temperature(self.temperature);

        let response = match oracle.invoke(request).await {
            Ok(response) => response,
            Err(e) => {
                sink.warn(&format!("Sentence split request failed, keeping row: {}", e));
                return vec![row];
            }
        };

        let pieces = parser::parse(&response.text);
        if pieces.len() <= 1 {
            return vec![row];
        }
        if !reconstructs_source(&row.source, &pieces) {
            sink.debug(&format!(
                "Discarded split of \"{}\": pieces do not reproduce the source",
                preview(&row.source)
            ));
            return vec![row];
        }

        sink.debug(&format!("Split row into {} pieces: \"{}\"", pieces.len(), preview(&row.source)));
        pieces
    }

    /// Apply [`Self::maybe_split`] to every row, in order
    pub async fn split_rows(
        &self,
        rows: Vec<AlignmentRow>,
        source_language: Language,
        oracle: &dyn Oracle,
        sink: &dyn ProgressSink,
    ) -> Vec<AlignmentRow> {
        if !self.enabled || source_language.is_logographic() {
            return rows;
        }

        let before = rows.len();
        let mut out = Vec::with_capacity(before);
        for row in rows {
            out.extend(self.maybe_split(row, source_language, oracle, sink).await);
        }
        if out.len() > before {
            sink.debug(&format!("Sentence splitting: {} -> {} rows", before, out.len()));
        }
        out
    }
}

fn preview(text: &str) -> String {
    let mut short: String = text.chars().take(40).collect();
    if text.chars().count() > 40 {
        short.push('…');
    }
    short
}
