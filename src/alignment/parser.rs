/*!
 * Parsing of oracle responses into aligned rows.
 *
 * The oracle is asked for one `source ||| target` pair per line, but real
 * responses carry code fences, commentary, soft-wrapped lines and section
 * delimiters. The parser never fails: malformed input yields fewer rows,
 * and zero rows is the caller's failure signal.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Token separating the source fragment from the target fragment
pub const ROW_SEPARATOR: &str = "|||";

/// Lines shorter than this (in characters) without a separator are treated as soft-wrapped
pub const SHORT_LINE_CHARS: usize = 50;

static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static DELIMITER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-{2,}\s*(.*?)\s*-{2,}$").unwrap());

/// One aligned pair. Either side may be empty, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlignmentRow {
    pub source: String,
    pub target: String,
}

impl AlignmentRow {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn is_unmatched(&self) -> bool {
        self.source.is_empty() || self.target.is_empty()
    }
}

/// A parsed response line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Row(AlignmentRow),
    /// A section delimiter such as `---- Slide 3 ----`, carrying its label
    Section(String),
}

/// Label of a delimiter line (`---- Slide 3 ----` -> `Slide 3`), if it is one
pub fn delimiter_label(line: &str) -> Option<&str> {
    if line.contains(ROW_SEPARATOR) {
        return None;
    }
    DELIMITER
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|label| !label.is_empty() && !label.chars().all(|c| c == '-'))
}

fn clean_fragment(fragment: &str) -> String {
    fragment
        .trim_matches(|c: char| c.is_whitespace() || c == '|')
        .to_string()
}

/// Parse a response into rows and section markers, in input order
pub fn parse_lines(raw: &str) -> Vec<ParsedLine> {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let normalized = BLANK_RUNS.replace_all(&normalized, "\n\n");

    let mut parsed = Vec::new();
    let mut pending = String::new();

    for line in normalized.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("```") {
            continue;
        }

        if let Some(label) = delimiter_label(line) {
            pending.clear();
            parsed.push(ParsedLine::Section(label.to_string()));
            continue;
        }

        let line = if pending.is_empty() {
            line.to_string()
        } else {
            format!("{} {}", std::mem::take(&mut pending), line)
        };

        if let Some((source, target)) = line.split_once(ROW_SEPARATOR) {
            let source = clean_fragment(source);
            let target = clean_fragment(target);
            if !source.is_empty() || !target.is_empty() {
                parsed.push(ParsedLine::Row(AlignmentRow { source, target }));
            }
        } else if line.chars().count() < SHORT_LINE_CHARS {
            pending = line;
        }
    }

    parsed
}

/// Parse a response into aligned rows
pub fn parse(raw: &str) -> Vec<AlignmentRow> {
    parse_lines(raw)
        .into_iter()
        .filter_map(|line| match line {
            ParsedLine::Row(row) => Some(row),
            ParsedLine::Section(_) => None,
        })
        .collect()
}

/// Render rows in the separator convention, one per line
pub fn render(rows: &[AlignmentRow]) -> String {
    rows.iter()
        .map(|row| format!("{} {} {}\n", row.source, ROW_SEPARATOR, row.target))
        .collect()
}

/// True when the tail of a response carries no separator, which usually means
/// the oracle stopped mid-output
pub fn looks_truncated(raw: &str) -> bool {
    let tail_start = raw
        .char_indices()
        .rev()
        .nth(499)
        .map(|(i, _)| i)
        .unwrap_or(0);
    !raw.trim().is_empty() && !raw[tail_start..].contains(ROW_SEPARATOR)
}
