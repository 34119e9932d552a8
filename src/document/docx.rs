/*!
 * Word (DOCX) reader.
 *
 * Body paragraphs and tables come from `word/document.xml` in document
 * order. Headers, footers, footnotes and endnotes follow the body, in that
 * order. Text box content is emitted right after the paragraph that anchors
 * it.
 */

use std::collections::HashSet;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{Element, open_archive, read_zip_part};
use crate::errors::DocumentError;

const DOCUMENT_PART: &str = "word/document.xml";
const FOOTNOTES_PART: &str = "word/footnotes.xml";
const ENDNOTES_PART: &str = "word/endnotes.xml";

/// Read the elements of a DOCX file
pub fn read_elements(path: &Path) -> Result<Vec<Element>, DocumentError> {
    let mut archive = open_archive(path)?;
    let xml = read_zip_part(&mut archive, path, DOCUMENT_PART)?;
    let mut elements = parse_part_xml(DOCUMENT_PART, &xml)?;

    let extra = supplementary_parts(archive.file_names());
    let mut seen = HashSet::new();
    for part in extra {
        let xml = read_zip_part(&mut archive, path, &part)?;
        for element in parse_part_xml(&part, &xml)? {
            if element.flattened_text().trim().is_empty() {
                continue;
            }
            if seen.insert(element.clone()) {
                elements.push(element);
            }
        }
    }
    Ok(elements)
}

/// Header, footer and note parts present in the archive, in reading order
fn supplementary_parts<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut headers = Vec::new();
    let mut footers = Vec::new();
    let mut footnotes = None;
    let mut endnotes = None;
    for name in names {
        if let Some(n) = numbered_part(name, "word/header") {
            headers.push((n, name.to_string()));
        } else if let Some(n) = numbered_part(name, "word/footer") {
            footers.push((n, name.to_string()));
        } else if name == FOOTNOTES_PART {
            footnotes = Some(name.to_string());
        } else if name == ENDNOTES_PART {
            endnotes = Some(name.to_string());
        }
    }
    headers.sort();
    footers.sort();

    headers
        .into_iter()
        .chain(footers)
        .map(|(_, name)| name)
        .chain(footnotes)
        .chain(endnotes)
        .collect()
}

/// `word/footer2.xml` -> 2, `word/header.xml` -> 0
fn numbered_part(name: &str, prefix: &str) -> Option<usize> {
    let digits = name.strip_prefix(prefix)?.strip_suffix(".xml")?;
    if digits.is_empty() {
        return Some(0);
    }
    digits.parse().ok()
}

fn is_separator_note(e: &BytesStart<'_>) -> bool {
    e.attributes().flatten().any(|attr| {
        attr.key.local_name().as_ref() == b"type"
            && matches!(
                attr.value.as_ref(),
                b"separator" | b"continuationSeparator" | b"continuationNotice"
            )
    })
}

#[derive(Default)]
struct PartState {
    elements: Vec<Element>,
    /// Depth inside content that must be ignored (fallback markup, separator notes)
    skip_depth: usize,
    table_depth: usize,
    para_depth: usize,
    in_text: bool,
    para_text: String,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,

    textbox_depth: usize,
    textbox_para: String,
    textbox_lines: Vec<String>,
    pending_boxes: Vec<String>,

    in_note: bool,
    note_parts: Vec<String>,
}

impl PartState {
    fn buffer(&mut self) -> &mut String {
        if self.textbox_depth > 0 {
            &mut self.textbox_para
        } else if self.table_depth > 0 {
            &mut self.cell
        } else {
            &mut self.para_text
        }
    }

    fn flush_boxes(&mut self) {
        let boxes = std::mem::take(&mut self.pending_boxes);
        self.elements.extend(boxes.into_iter().map(Element::Paragraph));
    }

    fn start(&mut self, e: &BytesStart<'_>) {
        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return;
        }
        let local = e.local_name();
        let name = local.as_ref();

        if self.textbox_depth > 0 {
            match name {
                b"txbxContent" => self.textbox_depth += 1,
                b"p" => self.textbox_para.clear(),
                b"t" => self.in_text = true,
                b"Fallback" => self.skip_depth = 1,
                _ => {}
            }
            return;
        }

        match name {
            b"Fallback" => self.skip_depth = 1,
            b"footnote" | b"endnote" if is_separator_note(e) => self.skip_depth = 1,
            b"footnote" | b"endnote" => {
                self.in_note = true;
                self.note_parts.clear();
            }
            b"txbxContent" => {
                self.textbox_depth = 1;
                self.textbox_lines.clear();
            }
            b"tbl" => {
                self.table_depth += 1;
                if self.table_depth == 1 {
                    self.rows.clear();
                }
            }
            b"tr" if self.table_depth == 1 => self.row.clear(),
            b"tc" if self.table_depth == 1 => self.cell.clear(),
            b"p" => {
                self.para_depth += 1;
                if self.para_depth == 1 && self.table_depth == 0 {
                    self.para_text.clear();
                }
            }
            b"t" => self.in_text = true,
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return;
        }

        if self.textbox_depth > 0 {
            match name {
                b"txbxContent" => {
                    self.textbox_depth -= 1;
                    if self.textbox_depth == 0 {
                        let text = std::mem::take(&mut self.textbox_lines).join("\n");
                        if !text.is_empty() {
                            self.pending_boxes.push(text);
                        }
                    }
                }
                b"p" => {
                    let line = std::mem::take(&mut self.textbox_para);
                    let line = line.trim();
                    if !line.is_empty() {
                        self.textbox_lines.push(line.to_string());
                    }
                }
                b"t" => self.in_text = false,
                _ => {}
            }
            return;
        }

        match name {
            b"footnote" | b"endnote" if self.in_note => {
                self.in_note = false;
                let text = std::mem::take(&mut self.note_parts).join(" ");
                if !text.is_empty() {
                    self.elements.push(Element::Paragraph(text));
                }
                self.flush_boxes();
            }
            b"tbl" => {
                self.table_depth = self.table_depth.saturating_sub(1);
                if self.table_depth == 0 {
                    let rows = std::mem::take(&mut self.rows);
                    if rows.iter().flatten().any(|c| !c.is_empty()) {
                        self.elements.push(Element::Table(rows));
                    }
                    self.flush_boxes();
                }
            }
            b"tr" if self.table_depth == 1 => {
                let row = std::mem::take(&mut self.row);
                self.rows.push(row);
            }
            b"tc" if self.table_depth == 1 => {
                let cell = self.cell.split_whitespace().collect::<Vec<_>>().join(" ");
                self.row.push(cell);
            }
            b"p" => {
                self.para_depth = self.para_depth.saturating_sub(1);
                if self.para_depth == 0 {
                    if self.table_depth > 0 {
                        self.cell.push(' ');
                    } else if self.in_note {
                        let text = std::mem::take(&mut self.para_text);
                        let text = text.trim();
                        if !text.is_empty() {
                            self.note_parts.push(text.to_string());
                        }
                    } else {
                        let text = std::mem::take(&mut self.para_text);
                        self.elements.push(Element::Paragraph(text.trim().to_string()));
                        self.flush_boxes();
                    }
                }
            }
            b"t" => self.in_text = false,
            _ => {}
        }
    }

    fn empty(&mut self, name: &[u8]) {
        if self.skip_depth > 0 {
            return;
        }
        let in_paragraph = self.para_depth > 0 || self.textbox_depth > 0;
        match name {
            b"p" if self.textbox_depth == 0 && self.para_depth == 0 && self.table_depth == 0 && !self.in_note => {
                self.elements.push(Element::Paragraph(String::new()));
            }
            b"tab" if in_paragraph => self.buffer().push('\t'),
            b"br" | b"cr" if in_paragraph => self.buffer().push('\n'),
            _ => {}
        }
    }
}

/// Parse the main document part into elements
pub fn parse_document_xml(xml: &[u8]) -> Result<Vec<Element>, DocumentError> {
    parse_part_xml(DOCUMENT_PART, xml)
}

/// Parse any WordprocessingML part (body, header, footer, notes) into elements
pub fn parse_part_xml(part: &str, xml: &[u8]) -> Result<Vec<Element>, DocumentError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let xml_err = |message: String| DocumentError::Xml {
        part: part.to_string(),
        message,
    };

    let mut state = PartState::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).map_err(|e| xml_err(e.to_string()))? {
            Event::Eof => break,
            Event::Start(e) => state.start(&e),
            Event::End(e) => state.end(e.local_name().as_ref()),
            Event::Empty(e) => state.empty(e.local_name().as_ref()),
            Event::Text(t) if state.in_text && state.skip_depth == 0 => {
                let text = t.unescape().map_err(|e| xml_err(e.to_string()))?;
                state.buffer().push_str(&text);
            }
            _ => {}
        }
    }
    state.flush_boxes();

    Ok(state.elements)
}
