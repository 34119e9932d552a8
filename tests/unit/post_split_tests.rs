/*!
 * Tests for oracle-assisted sentence splitting
 */

use docalign::alignment::parser::AlignmentRow;
use docalign::alignment::post_split::{SentencePostSplitter, count_real_sentences, needs_splitting};
use docalign::language::Language;
use docalign::providers::mock::MockOracle;

use crate::common::RecordingSink;

fn two_sentence_row() -> AlignmentRow {
    AlignmentRow::new("The board met on Monday. It approved the budget.", "Le conseil s'est réuni lundi. Il a approuvé le budget.")
}

#[tokio::test]
async fn test_maybeSplit_withConfirmedSplit_shouldReplaceRow() {
    let oracle = MockOracle::fixed(
        "The board met on Monday. ||| Le conseil s'est réuni lundi.\nIt approved the budget. ||| Il a approuvé le budget.\n",
    );
    let sink = RecordingSink::default();
    let rows = SentencePostSplitter::new(true)
        .maybe_split(two_sentence_row(), Language::English, &oracle, &sink)
        .await;

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].source, "The board met on Monday.");
    assert_eq!(rows[1].target, "Il a approuvé le budget.");
    assert_eq!(oracle.request_count(), 1);
}

#[tokio::test]
async fn test_maybeSplit_withLogographicSource_shouldNotCallOracle() {
    let oracle = MockOracle::working();
    let sink = RecordingSink::default();
    let row = AlignmentRow::new("董事会周一开会。它批准了预算。", "The board met on Monday. It approved the budget.");
    let rows = SentencePostSplitter::new(true)
        .maybe_split(row.clone(), Language::Chinese, &oracle, &sink)
        .await;

    assert_eq!(rows, vec![row]);
    assert_eq!(oracle.request_count(), 0);
}

#[tokio::test]
async fn test_maybeSplit_withSingleSentence_shouldNotCallOracle() {
    let oracle = MockOracle::working();
    let sink = RecordingSink::default();
    let row = AlignmentRow::new("Dr. Smith arrived at 10 a.m. on Monday.", "Le Dr Smith est arrivé lundi à 10 h.");
    let rows = SentencePostSplitter::new(true)
        .maybe_split(row.clone(), Language::English, &oracle, &sink)
        .await;

    assert_eq!(rows, vec![row]);
    assert_eq!(oracle.request_count(), 0);
}

#[tokio::test]
async fn test_maybeSplit_withUnsplitReply_shouldKeepOriginal() {
    // The working mock echoes a split request back as a single row
    let oracle = MockOracle::working();
    let sink = RecordingSink::default();
    let rows = SentencePostSplitter::new(true)
        .maybe_split(two_sentence_row(), Language::English, &oracle, &sink)
        .await;

    assert_eq!(rows, vec![two_sentence_row()]);
    assert_eq!(oracle.request_count(), 1);
}

#[tokio::test]
async fn test_maybeSplit_withAlteredSourceText_shouldKeepOriginal() {
    let oracle = MockOracle::fixed(
        "The board met Monday. ||| Le conseil s'est réuni lundi.\nIt approved the budget. ||| Il a approuvé le budget.\n",
    );
    let sink = RecordingSink::default();
    let rows = SentencePostSplitter::new(true)
        .maybe_split(two_sentence_row(), Language::English, &oracle, &sink)
        .await;

    assert_eq!(rows, vec![two_sentence_row()]);
}

#[tokio::test]
async fn test_maybeSplit_withOracleFailure_shouldKeepRowAndWarn() {
    let oracle = MockOracle::failing();
    let sink = RecordingSink::default();
    let rows = SentencePostSplitter::new(true)
        .maybe_split(two_sentence_row(), Language::English, &oracle, &sink)
        .await;

    assert_eq!(rows, vec![two_sentence_row()]);
    assert_eq!(sink.warnings().len(), 1);
}

#[tokio::test]
async fn test_maybeSplit_whenDisabled_shouldNotCallOracle() {
    let oracle = MockOracle::failing();
    let sink = RecordingSink::default();
    let rows = SentencePostSplitter::new(false)
        .maybe_split(two_sentence_row(), Language::English, &oracle, &sink)
        .await;

    assert_eq!(rows.len(), 1);
    assert_eq!(oracle.request_count(), 0);
}

#[tokio::test]
async fn test_splitRows_shouldNeverReduceRowCountOrChangeSourceText() {
    let oracle = MockOracle::fixed(
        "1. Scope. ||| 1. Portée.\n2. Terms. ||| 2. Conditions.\n",
    );
    let sink = RecordingSink::default();
    let input = vec![
        AlignmentRow::new("Introduction", "Introduction"),
        AlignmentRow::new("1. Scope. 2. Terms.", "1. Portée. 2. Conditions."),
        AlignmentRow::new("", "Note du traducteur"),
    ];
    let output = SentencePostSplitter::new(true)
        .split_rows(input.clone(), Language::English, &oracle, &sink)
        .await;

    assert!(output.len() >= input.len());
    assert_eq!(output.len(), 4);
    let strip = |s: String| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
    let before: String = input.iter().map(|r| r.source.clone()).collect();
    let after: String = output.iter().map(|r| r.source.clone()).collect();
    assert_eq!(strip(before), strip(after));
}

#[test]
fn test_needsSplitting_withOutlineNumbering_shouldNotCountContinuedPeriods() {
    assert_eq!(count_real_sentences("See section 4.2.1 for details."), 1);
    assert!(!needs_splitting("See section 4.2.1 for details."));
    assert!(needs_splitting("(a) first item (b) second item"));
    assert!(needs_splitting("Stop! Who goes there?"));
}
