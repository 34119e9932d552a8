/*!
 * Reconciliation of chunk outputs into one aligned table.
 *
 * Overlap buffers make adjacent chunks re-align the same sentences. Rows
 * identical in both fields are dropped. Rows that repeat only one field
 * are kept and flagged for review, since either alignment may be the
 * better one.
 */

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::parser::{AlignmentRow, ParsedLine};
use super::quality::{Issue, QualityChecker};

/// Rows produced by one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkOutput {
    /// 0-based chunk index
    pub chunk_index: usize,
    pub rows: Vec<SectionedRow>,
}

/// A row with the section delimiter it appeared under, if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionedRow {
    #[serde(flatten)]
    pub row: AlignmentRow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl ChunkOutput {
    pub fn new(chunk_index: usize, rows: Vec<AlignmentRow>) -> Self {
        Self {
            chunk_index,
            rows: rows
                .into_iter()
                .map(|row| SectionedRow { row, section: None })
                .collect(),
        }
    }

    /// Build from parsed lines, attaching each row to the last delimiter seen
    pub fn from_parsed(chunk_index: usize, lines: Vec<ParsedLine>) -> Self {
        let mut section = None;
        let mut rows = Vec::new();
        for line in lines {
            match line {
                ParsedLine::Section(label) => section = Some(label),
                ParsedLine::Row(row) => rows.push(SectionedRow {
                    row,
                    section: section.clone(),
                }),
            }
        }
        Self { chunk_index, rows }
    }

    pub fn plain_rows(&self) -> Vec<AlignmentRow> {
        self.rows.iter().map(|r| r.row.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Which field of a flagged row repeats another row's field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateField {
    Source,
    Target,
    Both,
}

impl fmt::Display for DuplicateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "duplicate-source"),
            Self::Target => write!(f, "duplicate-target"),
            Self::Both => write!(f, "duplicate-both"),
        }
    }
}

/// A final row with its provenance and review flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    #[serde(flatten)]
    pub row: AlignmentRow,
    pub chunk_index: usize,
    pub section: Option<String>,
    pub duplicate: Option<DuplicateField>,
}

impl MergedRow {
    pub fn is_flagged(&self) -> bool {
        self.duplicate.is_some()
    }

    /// Provenance column text: 1-based chunk number, plus section when known
    pub fn provenance(&self) -> String {
        match &self.section {
            Some(section) => format!("part {} / {}", self.chunk_index + 1, section),
            None => format!("part {}", self.chunk_index + 1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub rows: Vec<MergedRow>,
    pub issues: Vec<Issue>,
    /// Exact duplicates removed
    pub dropped_duplicates: usize,
}

impl MergeOutcome {
    pub fn flagged_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_flagged()).count()
    }

    pub fn plain_rows(&self) -> Vec<AlignmentRow> {
        self.rows.iter().map(|r| r.row.clone()).collect()
    }
}

/// Merges chunk outputs and runs the quality checker over the result
#[derive(Debug, Clone, Copy)]
pub struct ReconciliationMerger {
    checker: QualityChecker,
}

impl ReconciliationMerger {
    pub fn new(checker: QualityChecker) -> Self {
        Self { checker }
    }

    pub fn merge(&self, mut outputs: Vec<ChunkOutput>) -> MergeOutcome {
        outputs.sort_by_key(|o| o.chunk_index);

        // Exact duplicates: keep the first occurrence in chunk order
        let mut seen: HashSet<AlignmentRow> = HashSet::new();
        let mut rows = Vec::new();
        let mut dropped = 0;
        for output in outputs {
            for sectioned in output.rows {
                if seen.contains(&sectioned.row) {
                    dropped += 1;
                    continue;
                }
                seen.insert(sectioned.row.clone());
                rows.push(MergedRow {
                    row: sectioned.row,
                    chunk_index: output.chunk_index,
                    section: sectioned.section,
                    duplicate: None,
                });
            }
        }

        flag_partial_duplicates(&mut rows);

        let plain: Vec<AlignmentRow> = rows.iter().map(|r| r.row.clone()).collect();
        let issues = self.checker.check(&plain);

        if dropped > 0 {
            log::debug!("Merge dropped {} exact duplicate row(s)", dropped);
        }

        MergeOutcome {
            rows,
            issues,
            dropped_duplicates: dropped,
        }
    }
}

fn field_counts<'a>(values: impl Iterator<Item = &'a str>) -> HashMap<&'a str, usize> {
    let mut counts = HashMap::new();
    for value in values.filter(|v| !v.is_empty()) {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
}

fn flag_partial_duplicates(rows: &mut [MergedRow]) {
    let sources = field_counts(rows.iter().map(|r| r.row.source.as_str()));
    let targets = field_counts(rows.iter().map(|r| r.row.target.as_str()));

    let flags: Vec<Option<DuplicateField>> = rows
        .iter()
        .map(|r| {
            let source_dup = sources.get(r.row.source.as_str()).is_some_and(|&n| n > 1);
            let target_dup = targets.get(r.row.target.as_str()).is_some_and(|&n| n > 1);
            match (source_dup, target_dup) {
                (true, true) => Some(DuplicateField::Both),
                (true, false) => Some(DuplicateField::Source),
                (false, true) => Some(DuplicateField::Target),
                (false, false) => None,
            }
        })
        .collect();

    for (row, flag) in rows.iter_mut().zip(flags) {
        row.duplicate = flag;
    }
}
