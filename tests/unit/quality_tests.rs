/*!
 * Tests for the advisory quality checks
 */

use docalign::alignment::parser::AlignmentRow;
use docalign::alignment::quality::{IssueKind, QualityChecker};
use docalign::language::Language;

#[test]
fn test_check_withUntranslatedRow_shouldFlagSourceLooksLikeTarget() {
    let checker = QualityChecker::new(Language::English, Language::French);
    let issues = checker.check(&[AlignmentRow::new("Bonjour", "Bonjour")]);

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, IssueKind::LanguageMismatch);
    assert!(issues[0].detail.contains("source fragment looks like target language"));
    assert_eq!(issues[0].source, "Bonjour");
}

#[test]
fn test_check_withSwappedRow_shouldFlagOnlyThatRow() {
    let checker = QualityChecker::new(Language::Chinese, Language::English);
    let rows = vec![
        AlignmentRow::new("合同自签署之日起生效。", "The contract takes effect on signing."),
        AlignmentRow::new("The parties agree.", "双方同意。"),
    ];
    let issues = checker.check(&rows);

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].row_index, 1);
    assert_eq!(issues[0].kind, IssueKind::LanguageMismatch);
    assert!(issues[0].detail.starts_with("source fragment looks like target language"));
}

#[test]
fn test_check_withLengthRatioAboveFive_shouldFlagAnomaly() {
    let checker = QualityChecker::new(Language::English, Language::German);
    let rows = vec![
        AlignmentRow::new("Ok.", "Einverstanden, das machen wir genau so."),
        AlignmentRow::new("Thank you very much.", "Vielen Dank."),
    ];
    let issues = checker.check(&rows);

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, IssueKind::LengthAnomaly);
    assert_eq!(issues[0].row_index, 0);
}

#[test]
fn test_check_shouldNeverDropRows() {
    let checker = QualityChecker::new(Language::English, Language::French);
    let rows = vec![AlignmentRow::new("Bonjour", "Bonjour"), AlignmentRow::new("", "Seul")];
    let before = rows.clone();
    let _ = checker.check(&rows);
    assert_eq!(rows, before);
}

#[test]
fn test_issue_display_shouldUseOneBasedRow() {
    let checker = QualityChecker::new(Language::English, Language::French);
    let issues = checker.check(&[AlignmentRow::new("Bonjour", "Bonjour")]);
    assert!(issues[0].to_string().starts_with("row 1 [language-mismatch]"));
}

#[test]
fn test_check_withIdenticalNamesAndCodes_shouldNotFlag() {
    let checker = QualityChecker::new(Language::English, Language::French);
    let rows = vec![
        AlignmentRow::new("Geneva", "Genève"),
        AlignmentRow::new("ISO 9001", "ISO 9001"),
        AlignmentRow::new("World Health Organization", "World Health Organization"),
        AlignmentRow::new("NATO", "NATO"),
        AlignmentRow::new("Bonjour", "Bonjour"),
    ];
    let issues = checker.check(&rows);

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].row_index, 4);
    assert_eq!(issues[0].kind, IssueKind::LanguageMismatch);
}
