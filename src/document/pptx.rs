/*!
 * PowerPoint (PPTX) reader.
 *
 * Each slide contributes a `Section` element ("Slide N") followed by one
 * paragraph element per text body, in document order.
 */

use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;

use super::{Element, open_archive, read_zip_part};
use crate::errors::DocumentError;

/// Read every slide of a PPTX file
pub fn read_elements(path: &Path) -> Result<Vec<Element>, DocumentError> {
    let mut archive = open_archive(path)?;

    let mut slides: Vec<(usize, String)> = archive
        .file_names()
        .filter_map(|name| slide_number(name).map(|n| (n, name.to_string())))
        .collect();
    slides.sort_by_key(|(n, _)| *n);

    let mut elements = Vec::new();
    for (number, part) in slides {
        let xml = read_zip_part(&mut archive, path, &part)?;
        elements.push(Element::Section(format!("Slide {}", number)));
        elements.extend(parse_slide_xml(&part, &xml)?);
    }
    Ok(elements)
}

/// `ppt/slides/slide12.xml` -> 12
fn slide_number(name: &str) -> Option<usize> {
    name.strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

/// Parse one slide part into paragraph elements, one per text body
pub fn parse_slide_xml(part: &str, xml: &[u8]) -> Result<Vec<Element>, DocumentError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let xml_err = |message: String| DocumentError::Xml {
        part: part.to_string(),
        message,
    };

    let mut elements = Vec::new();
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    let mut in_body = false;
    let mut in_text = false;

    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).map_err(|e| xml_err(e.to_string()))? {
            Event::Eof => break,
            Event::Start(e) => match e.local_name().as_ref() {
                b"txBody" => {
                    in_body = true;
                    lines.clear();
                }
                b"p" if in_body => line.clear(),
                b"t" if in_body => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"txBody" => {
                    in_body = false;
                    let text = lines
                        .iter()
                        .map(|l| l.trim())
                        .filter(|l| !l.is_empty())
                        .collect::<Vec<_>>()
                        .join("\n");
                    if !text.is_empty() {
                        elements.push(Element::Paragraph(text));
                    }
                }
                b"p" if in_body => lines.push(std::mem::take(&mut line)),
                b"t" => in_text = false,
                _ => {}
            },
            Event::Empty(e) if in_body && e.local_name().as_ref() == b"br" => line.push('\n'),
            Event::Text(t) if in_text => {
                let text = t.unescape().map_err(|e| xml_err(e.to_string()))?;
                line.push_str(&text);
            }
            _ => {}
        }
    }

    Ok(elements)
}
