/*!
 * Tests for chunk reconciliation
 */

use docalign::alignment::merger::{ChunkOutput, DuplicateField, ReconciliationMerger};
use docalign::alignment::parser::{self, AlignmentRow};
use docalign::alignment::quality::{IssueKind, QualityChecker};
use docalign::language::Language;

fn merger() -> ReconciliationMerger {
    ReconciliationMerger::new(QualityChecker::new(Language::English, Language::French))
}

#[test]
fn test_merge_withRepeatedRowInOneChunk_shouldKeepSingleRow() {
    let a = AlignmentRow::new("The meeting starts at nine.", "La réunion commence à neuf heures.");
    let outcome = merger().merge(vec![ChunkOutput::new(0, vec![a.clone(), a.clone()])]);

    assert_eq!(outcome.plain_rows(), vec![a]);
    assert_eq!(outcome.dropped_duplicates, 1);
}

#[test]
fn test_merge_withOverlappingChunks_shouldDropRepeatedOverlap() {
    let first = parser::parse(
        "Opening remarks. ||| Remarques liminaires.\nBudget review. ||| Examen du budget.\nNext steps. ||| Prochaines étapes.\n",
    );
    let second = parser::parse(
        "Budget review. ||| Examen du budget.\nNext steps. ||| Prochaines étapes.\nClosing. ||| Clôture.\n",
    );
    let outcome = merger().merge(vec![ChunkOutput::new(0, first), ChunkOutput::new(1, second)]);

    let sources: Vec<&str> = outcome.rows.iter().map(|r| r.row.source.as_str()).collect();
    assert_eq!(sources, vec!["Opening remarks.", "Budget review.", "Next steps.", "Closing."]);
    assert_eq!(outcome.dropped_duplicates, 2);
    assert_eq!(outcome.flagged_count(), 0);
    assert_eq!(outcome.rows[3].chunk_index, 1);
}

#[test]
fn test_merge_withConflictingAlignments_shouldKeepAndFlagBoth() {
    let outcome = merger().merge(vec![
        ChunkOutput::new(0, vec![AlignmentRow::new("Budget review.", "Examen du budget.")]),
        ChunkOutput::new(
            1,
            vec![AlignmentRow::new("Budget review and next steps.", "Examen du budget.")],
        ),
    ]);

    assert_eq!(outcome.rows.len(), 2);
    assert!(outcome.rows.iter().all(|r| r.duplicate == Some(DuplicateField::Target)));
    assert_eq!(outcome.rows[0].duplicate.map(|d| d.to_string()).as_deref(), Some("duplicate-target"));
}

#[test]
fn test_merge_shouldAttachQualityIssuesByFinalRowIndex() {
    let outcome = merger().merge(vec![
        ChunkOutput::new(0, vec![AlignmentRow::new("Good morning everyone.", "Bonjour à tous.")]),
        ChunkOutput::new(1, vec![AlignmentRow::new("Bonjour", "Bonjour")]),
    ]);

    assert_eq!(outcome.issues.len(), 1);
    assert_eq!(outcome.issues[0].row_index, 1);
    assert_eq!(outcome.issues[0].kind, IssueKind::LanguageMismatch);
    // Issues annotate; the row itself stays in the table
    assert_eq!(outcome.rows.len(), 2);
}

#[test]
fn test_mergedRow_provenance_shouldIncludeSectionWhenKnown() {
    let output = ChunkOutput::from_parsed(2, parser::parse_lines("---- Slide 4 ----\nChart ||| Graphique\n"));
    let outcome = merger().merge(vec![output]);

    assert_eq!(outcome.rows[0].provenance(), "part 3 / Slide 4");
    let plain = merger().merge(vec![ChunkOutput::new(0, vec![AlignmentRow::new("A", "B")])]);
    assert_eq!(plain.rows[0].provenance(), "part 1");
}

#[test]
fn test_merge_withNoChunks_shouldReturnEmptyOutcome() {
    let outcome = merger().merge(Vec::new());
    assert!(outcome.rows.is_empty());
    assert!(outcome.issues.is_empty());
    assert_eq!(outcome.dropped_duplicates, 0);
}
