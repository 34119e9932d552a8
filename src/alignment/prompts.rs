/*!
 * Instructions and payloads sent to the alignment oracle.
 */

use crate::alignment::parser::{AlignmentRow, ROW_SEPARATOR};
use crate::document::Anchors;
use crate::language::Language;

pub const SOURCE_STREAM_TAG: &str = "Stream_A_Original";
pub const TARGET_STREAM_TAG: &str = "Stream_B_Translation";
pub const ROW_SOURCE_TAG: &str = "Row_Source";
pub const ROW_TARGET_TAG: &str = "Row_Target";

/// Characters of each anchor quoted in the context hint
pub const HINT_CHARS: usize = 100;

/// Instruction for aligning a document chunk
pub fn document_system_prompt(source: Language, target: Language) -> String {
    format!(
        "You are a dual-stream sentence aligner.\n\
         Stream A is a {source} document; Stream B is its {target} translation.\n\
         Output one aligned pair per line in the form: A-text {sep} B-text\n\
         Rules:\n\
         1. Text left of {sep} must be copied verbatim from Stream A, text right of it verbatim from Stream B. Never translate, paraphrase or correct.\n\
         2. Segment Stream A at its sentence-ending punctuation ({terms}) and at list or outline markers; give each segment its matching B text.\n\
         3. If a segment has no counterpart, leave that side empty (`A-text {sep}` or `{sep} B-text`).\n\
         4. Keep the original order. Do not emit pairs for blank lines, and do not add headings, numbering or commentary.",
        source = source.name(),
        target = target.name(),
        sep = ROW_SEPARATOR,
        terms = source.sentence_terminators(),
    )
}

/// Instruction for aligning a slide deck
pub fn slide_system_prompt(source: Language, target: Language) -> String {
    format!(
        "You are a dual-stream aligner for presentation slides.\n\
         Stream A is a {source} slide deck; Stream B is its {target} translation. Slides are separated by lines such as `---- Slide 3 ----`.\n\
         Output one aligned pair per line in the form: A-text {sep} B-text\n\
         Rules:\n\
         1. Align only within the same slide, and copy each slide delimiter line on its own line before that slide's pairs.\n\
         2. Text on each side must be verbatim from its stream. Titles, bullets and table cells are separate segments.\n\
         3. Content without a counterpart is written as `A-text {sep}` or `{sep} B-text`.\n\
         4. No commentary, no code fences.",
        source = source.name(),
        target = target.name(),
        sep = ROW_SEPARATOR,
    )
}

/// Instruction for splitting one aligned row into sentence-level rows
pub fn split_row_system_prompt(source: Language) -> String {
    format!(
        "You split one aligned {source} sentence pair into finer pairs.\n\
         Split the source at list markers (such as `1. `, `a. `, `(2) `, `IV. `) and at sentence-ending punctuation, \
         but not after abbreviations (e.g. `e.g.`, `Dr.`, `U.S.`, `etc.`) or inside decimal numbers.\n\
         Give each source piece the part of the translation that renders it.\n\
         Output one pair per line as: source-piece {sep} translation-piece\n\
         Both sides must be verbatim substrings of the input, in order, and together must reproduce it completely. \
         If the pair should not be split, output it unchanged on a single line.",
        source = source.name(),
        sep = ROW_SEPARATOR,
    )
}

/// Instruction for splitting the content of one spreadsheet cell pair
pub fn table_cell_system_prompt(source: Language) -> String {
    let terms = source.sentence_terminators();
    format!(
        "You are a precise aligner for the content of one table cell.\n\
         Stream A is the {source} cell; Stream B is the same cell in the translation.\n\
         Split Stream A only at sentence-ending punctuation ({terms}) and at blank or line breaks, \
         and give each piece the part of Stream B that renders it.\n\
         Rules:\n\
         1. List numbering such as `1.`, `2.`, `(1)`, `a.` or `①` is not a sentence end. Keep it at the start of its piece; never emit it alone.\n\
         2. Each side must be copied verbatim from its stream, punctuation and numbering included. Never translate, add or drop text.\n\
         3. When the punctuation of Stream B differs, align by meaning.\n\
         Output one pair per line as: A-piece {sep} B-piece\n\
         Output only the pairs, without commentary.",
        source = source.name(),
        terms = terms,
        sep = ROW_SEPARATOR,
    )
}

/// User payload for one spreadsheet cell pair
pub fn table_cell_payload(source_cell: &str, target_cell: &str) -> String {
    format!(
        "Split the cell at sentence ends and line breaks and align the translation:\n\n{}\n\n{}",
        wrap(SOURCE_STREAM_TAG, source_cell),
        wrap(TARGET_STREAM_TAG, target_cell)
    )
}

fn wrap(tag: &str, body: &str) -> String {
    format!("<{tag}>\n{body}\n</{tag}>")
}

/// User payload carrying both streams, with an optional continuity hint
pub fn alignment_payload(
    source_text: &str,
    target_text: &str,
    source_anchors: Option<&Anchors>,
    target_anchors: Option<&Anchors>,
) -> String {
    let mut payload = String::new();

    if let (Some(s), Some(t)) = (source_anchors, target_anchors) {
        if !s.first.is_empty() && !t.first.is_empty() {
            let head = |text: &str| text.chars().take(HINT_CHARS).collect::<String>();
            payload.push_str(&format!(
                "Context hint: this excerpt starts near \"{}\" in Stream A and near \"{}\" in Stream B. \
                 Earlier text was handled separately.\n\n",
                head(&s.first),
                head(&t.first)
            ));
        }
    }

    payload.push_str(&wrap(SOURCE_STREAM_TAG, source_text));
    payload.push_str("\n\n");
    payload.push_str(&wrap(TARGET_STREAM_TAG, target_text));
    payload
}

/// User payload for re-splitting one row
pub fn split_row_payload(row: &AlignmentRow) -> String {
    format!(
        "Split this pair:\n\n{}\n\n{}",
        wrap(ROW_SOURCE_TAG, &row.source),
        wrap(ROW_TARGET_TAG, &row.target)
    )
}

/// Content between `<tag>` and `</tag>`, trimmed
pub fn extract_stream<'a>(payload: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = payload.find(&open)? + open.len();
    let end = payload[start..].find(&close)? + start;
    Some(payload[start..end].trim())
}

/// Source and target of a split-row payload
pub fn extract_split_row(payload: &str) -> Option<(&str, &str)> {
    Some((
        extract_stream(payload, ROW_SOURCE_TAG)?,
        extract_stream(payload, ROW_TARGET_TAG)?,
    ))
}
