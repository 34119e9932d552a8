/*!
 * Plain-text reader. Blank lines separate paragraphs; lines of the form
 * `---- label ----` become section elements.
 */

use std::path::Path;

use super::Element;
use crate::alignment::parser::delimiter_label;
use crate::errors::DocumentError;

pub fn read_elements(path: &Path) -> Result<Vec<Element>, DocumentError> {
    let content = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_text(&content))
}

pub fn parse_text(content: &str) -> Vec<Element> {
    let mut elements = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();

    let flush = |paragraph: &mut Vec<&str>, elements: &mut Vec<Element>| {
        if !paragraph.is_empty() {
            elements.push(Element::Paragraph(paragraph.join("\n")));
            paragraph.clear();
        }
    };

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush(&mut paragraph, &mut elements);
        } else if let Some(label) = delimiter_label(trimmed) {
            flush(&mut paragraph, &mut elements);
            elements.push(Element::Section(label.to_string()));
        } else {
            paragraph.push(trimmed);
        }
    }
    flush(&mut paragraph, &mut elements);
    elements
}
