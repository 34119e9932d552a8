/*!
 * Cell-by-cell alignment of two workbooks.
 *
 * Sheets are paired by name, or by position when the workbooks share no
 * sheet name, and cells by grid position. A cell pair whose source holds
 * several sentences, line breaks or list numbering is split through the
 * oracle; every other pair becomes one row as it stands.
 */

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::parser::{self, AlignmentRow};
use super::prompts;
use crate::document::Document;
use crate::document::xlsx::cell_ref;
use crate::language::Language;
use crate::providers::{Oracle, OracleRequest};
use crate::tracker::ProgressSink;

// `\d+\.` must not be followed by a digit, so decimals do not count as numbering
static NUMBERED_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"（[一二三四五六七八九十\d]+）|[（(]\d+[）)]|[①②③④⑤⑥⑦⑧⑨⑩]|\d+\.(?:\s+\S|[^\d\s])|\d+、\s*\S|\d+[）)]\s*\S|^[一二三四五六七八九十]+[、．.]",
    )
    .unwrap()
});

/// Whether a source cell holds more than one sentence, line or list item
pub fn needs_table_cell_split(text: &str, language: Language) -> bool {
    if text.trim().is_empty() {
        return false;
    }

    let has_line_break = text.contains('\n') || text.contains('\r');
    let has_double_space = text.contains("  ");

    let (period, exclamation, question) = if language.is_logographic() {
        ('。', '！', '？')
    } else {
        ('.', '!', '?')
    };
    let count = |mark: char| text.chars().filter(|&c| c == mark).count();
    let exclamations = count(exclamation);
    let questions = count(question);
    let terminators = count(period) + exclamations + questions;

    terminators > 1
        || exclamations > 0
        || questions > 0
        || has_line_break
        || has_double_space
        || NUMBERED_LIST.is_match(text)
}

/// Source and target text found at the same cell position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellPair {
    /// Cell reference such as `B3`
    pub reference: String,
    pub source: String,
    pub target: String,
}

/// The non-empty cell pairs of two matched sheets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetPair {
    pub name: String,
    pub cells: Vec<CellPair>,
}

/// Match the sheets of two workbooks and pair their cells
pub fn pair_sheets(source: &Document, target: &Document) -> Vec<SheetPair> {
    let source_sheets = source.sheets();
    let target_sheets = target.sheets();

    let source_names: BTreeSet<&str> = source_sheets.iter().map(|(n, _)| n.as_str()).collect();
    let common: Vec<&str> = target_sheets
        .iter()
        .map(|(n, _)| n.as_str())
        .filter(|n| source_names.contains(n))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if common.is_empty() {
        return source_sheets
            .iter()
            .zip(target_sheets.iter())
            .map(|((name, s), (_, t))| SheetPair {
                name: name.clone(),
                cells: pair_cells(s, t),
            })
            .collect();
    }

    common
        .into_iter()
        .map(|name| SheetPair {
            name: name.to_string(),
            cells: pair_cells(sheet_rows(&source_sheets, name), sheet_rows(&target_sheets, name)),
        })
        .collect()
}

fn sheet_rows<'a>(sheets: &[(String, &'a [Vec<String>])], name: &str) -> &'a [Vec<String>] {
    sheets
        .iter()
        .find(|(n, _)| n == name)
        .map_or(&[] as &[Vec<String>], |(_, rows)| *rows)
}

fn cell_text(rows: &[Vec<String>], r: usize, c: usize) -> &str {
    rows.get(r).and_then(|row| row.get(c)).map_or("", |cell| cell.trim())
}

/// Pair cells by grid position, row by row; positions empty on both sides are skipped
pub fn pair_cells(source: &[Vec<String>], target: &[Vec<String>]) -> Vec<CellPair> {
    let height = source.len().max(target.len());
    let width = source
        .iter()
        .chain(target.iter())
        .map(Vec::len)
        .max()
        .unwrap_or(0);

    let mut pairs = Vec::new();
    for r in 0..height {
        for c in 0..width {
            let (s, t) = (cell_text(source, r, c), cell_text(target, r, c));
            if s.is_empty() && t.is_empty() {
                continue;
            }
            pairs.push(CellPair {
                reference: cell_ref(r, c),
                source: s.to_string(),
                target: t.to_string(),
            });
        }
    }
    pairs
}

/// Turns cell pairs into aligned rows, splitting dense cells through the oracle
#[derive(Debug, Clone, Copy)]
pub struct TableCellAligner {
    temperature: f32,
}

impl Default for TableCellAligner {
    fn default() -> Self {
        Self { temperature: 0.1 }
    }
}

impl TableCellAligner {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Rows for one cell pair; the pair itself when no split applies or the split fails
    pub async fn align(
        &self,
        pair: &CellPair,
        source_language: Language,
        oracle: &dyn Oracle,
        sink: &dyn ProgressSink,
    ) -> Vec<AlignmentRow> {
        let whole = || vec![AlignmentRow::new(pair.source.clone(), pair.target.clone())];
        if pair.source.is_empty()
            || pair.target.is_empty()
            || !needs_table_cell_split(&pair.source, source_language)
        {
            return whole();
        }

        let request = OracleRequest::new(
            prompts::table_cell_system_prompt(source_language),
            prompts::table_cell_payload(&pair.source, &pair.target),
        )
        .temperature(self.temperature);

        match oracle.invoke(request).await {
            Ok(response) => {
                let rows = parser::parse(&response.text);
                if rows.is_empty() {
                    sink.debug(&format!("Cell {} reply had no rows, keeping the pair", pair.reference));
                    return whole();
                }
                rows
            }
            Err(e) => {
                sink.warn(&format!("Cell {} split failed, keeping the pair: {}", pair.reference, e));
                whole()
            }
        }
    }
}
