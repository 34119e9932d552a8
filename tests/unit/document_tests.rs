/*!
 * Tests for the file-backed document readers
 */

use docalign::document::{DocumentKind, DocumentReader, Element, FileDocumentReader};
use docalign::errors::DocumentError;
use docalign::language::Language;

use crate::common;

#[test]
fn test_read_withDocx_shouldReturnParagraphsInOrder() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_docx(
        dir.path(),
        "report.docx",
        &["Annual report", "Revenue grew by 4 & 5 percent.", "Outlook <stable>"],
    )
    .unwrap();

    let doc = FileDocumentReader.read(&path).unwrap();
    assert_eq!(doc.kind, DocumentKind::Docx);
    assert_eq!(
        doc.elements,
        vec![
            Element::paragraph("Annual report"),
            Element::paragraph("Revenue grew by 4 & 5 percent."),
            Element::paragraph("Outlook <stable>"),
        ]
    );
    assert_eq!(doc.stem(), "report");
}

#[test]
fn test_read_withDocxFooterAndFootnote_shouldAppendThemAfterBody() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_docx_with_parts(
        dir.path(),
        "policy.docx",
        &["Travel policy", "Economy class is the default."],
        &[
            ("word/footer1.xml", &["Internal use only"][..]),
            ("word/footnotes.xml", &["Exceptions need written approval."][..]),
            ("word/header1.xml", &["Finance department", ""][..]),
            ("word/footer2.xml", &["Internal use only"][..]),
        ],
    )
    .unwrap();

    let doc = FileDocumentReader.read(&path).unwrap();
    assert_eq!(
        doc.elements,
        vec![
            Element::paragraph("Travel policy"),
            Element::paragraph("Economy class is the default."),
            Element::paragraph("Finance department"),
            Element::paragraph("Internal use only"),
            Element::paragraph("Exceptions need written approval."),
        ]
    );
}

#[test]
fn test_read_withXlsx_shouldEmitOneTablePerSheet() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_xlsx(
        dir.path(),
        "book.xlsx",
        &[
            ("Summary", &[&["Total", "", "Q1 & Q2"][..]][..]),
            ("Notes", &[&[""][..], &["", "Draft"][..]][..]),
        ],
    )
    .unwrap();

    let doc = FileDocumentReader.read(&path).unwrap();
    assert_eq!(doc.kind, DocumentKind::Xlsx);
    assert_eq!(
        doc.elements,
        vec![
            Element::Section("Summary".into()),
            Element::Table(vec![vec!["Total".into(), String::new(), "Q1 & Q2".into()]]),
            Element::Section("Notes".into()),
            Element::Table(vec![
                vec![String::new(), String::new()],
                vec![String::new(), "Draft".into()],
            ]),
        ]
    );
    let sheets = doc.sheets();
    assert_eq!(sheets.len(), 2);
    assert_eq!(sheets[1].0, "Notes");
}

#[test]
fn test_read_withPptx_shouldEmitSlideSections() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_pptx(
        dir.path(),
        "deck.pptx",
        &[&["Welcome", "Agenda for today"], &["Results"]],
    )
    .unwrap();

    let doc = FileDocumentReader.read(&path).unwrap();
    assert_eq!(doc.kind, DocumentKind::Pptx);
    assert_eq!(
        doc.elements,
        vec![
            Element::Section("Slide 1".into()),
            Element::paragraph("Welcome"),
            Element::paragraph("Agenda for today"),
            Element::Section("Slide 2".into()),
            Element::paragraph("Results"),
        ]
    );
    assert_eq!(doc.render_range(3..5), "---- Slide 2 ----\nResults");
}

#[test]
fn test_read_withTextFile_shouldSplitOnBlankLines() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "notes.md", "First line.\n\n\nSecond line.\n").unwrap();

    let doc = FileDocumentReader.read(&path).unwrap();
    assert_eq!(doc.kind, DocumentKind::Text);
    assert_eq!(doc.len(), 2);
    assert_eq!(doc.unit_counts(Language::English), vec![2, 2]);
    assert_eq!(doc.render(), "First line.\nSecond line.");
}

#[test]
fn test_read_withUnsupportedExtension_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "sheet.xls", "not really").unwrap();
    let result = FileDocumentReader.read(&path);
    assert!(matches!(result, Err(DocumentError::UnsupportedFormat(ext)) if ext == ".xls"));
}

#[test]
fn test_read_withCorruptArchive_shouldReportArchiveError() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "broken.docx", "plain text, not a zip").unwrap();
    assert!(matches!(FileDocumentReader.read(&path), Err(DocumentError::Archive { .. })));
}

#[test]
fn test_read_withMissingFile_shouldReportIo() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("absent.txt");
    assert!(matches!(FileDocumentReader.read(&path), Err(DocumentError::Io { .. })));
}

#[test]
fn test_renderRange_shouldKeepOnlyRequestedElements() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_docx(dir.path(), "a.docx", &["one", "two", "three", "four"]).unwrap();
    let doc = FileDocumentReader.read(&path).unwrap();

    assert_eq!(doc.render_range(1..3), "two\nthree");
    assert_eq!(doc.kind, DocumentKind::Docx);
    assert!(doc.render_range(9..12).is_empty());

    let anchors = doc.anchors(1..3);
    assert_eq!(anchors.first, "two three");
    assert_eq!(anchors.last, "two three");
}
