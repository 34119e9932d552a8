/*!
 * Tests for oracle response parsing
 */

use docalign::alignment::parser::{self, AlignmentRow, ParsedLine};

#[test]
fn test_parse_withSlideDelimiter_shouldSkipDelimiterRow() {
    let rows = parser::parse("Hello ||| Bonjour\n---- Slide 1 ----\nWorld ||| Monde\n");
    assert_eq!(
        rows,
        vec![AlignmentRow::new("Hello", "Bonjour"), AlignmentRow::new("World", "Monde")]
    );
}

#[test]
fn test_parse_withRenderedRows_shouldRoundTrip() {
    let rows = vec![
        AlignmentRow::new("First sentence.", "Première phrase."),
        AlignmentRow::new("Only in the original.", ""),
        AlignmentRow::new("", "Seulement dans la traduction."),
        AlignmentRow::new("第一句。", "Erste Satz."),
        AlignmentRow::new("Price: 3 | 4 units", "Prix : 3 | 4 unités"),
    ];
    assert_eq!(parser::parse(&parser::render(&rows)), rows);
}

#[test]
fn test_parse_withDegenerateInput_shouldReturnNoRows() {
    assert!(parser::parse("").is_empty());
    assert!(parser::parse("no separators here\nat all").is_empty());
    assert!(parser::parse("|||\n||| |||\n|||||||||\n").is_empty());
    assert!(parser::parse("\n\n\n\n").is_empty());
}

#[test]
fn test_parse_withOnlyFirstSeparator_shouldSplitOnce() {
    let rows = parser::parse("a ||| b ||| c");
    assert_eq!(rows, vec![AlignmentRow::new("a", "b ||| c")]);
}

#[test]
fn test_parse_withDelimiterAfterShortLine_shouldDropPendingPrefix() {
    let rows = parser::parse("dangling\n---- Slide 2 ----\nA ||| B");
    assert_eq!(rows, vec![AlignmentRow::new("A", "B")]);
}

#[test]
fn test_parseLines_shouldKeepSectionOrder() {
    let lines = parser::parse_lines("---- Slide 1 ----\nA ||| B\n---- Slide 2 ----\nC ||| D");
    assert_eq!(
        lines,
        vec![
            ParsedLine::Section("Slide 1".into()),
            ParsedLine::Row(AlignmentRow::new("A", "B")),
            ParsedLine::Section("Slide 2".into()),
            ParsedLine::Row(AlignmentRow::new("C", "D")),
        ]
    );
}

#[test]
fn test_alignmentRow_isUnmatched_shouldDetectEmptySide() {
    assert!(AlignmentRow::new("a", "").is_unmatched());
    assert!(!AlignmentRow::new("a", "b").is_unmatched());
}
