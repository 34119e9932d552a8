/*!
 * Excel (XLSX) reader.
 *
 * Every worksheet contributes a `Section` element carrying the sheet name,
 * followed by one `Table` element holding the cell grid. Grid positions
 * follow the cell references, so cell `B3` of two workbooks lands at the
 * same row and column in both tables.
 */

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{Element, open_archive, read_zip_part};
use crate::errors::DocumentError;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// Largest cell grid (rows x columns) materialized for one sheet
pub const MAX_SHEET_CELLS: usize = 2_000_000;

/// One worksheet: its name and dense cell grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// Read every worksheet of an XLSX file
pub fn read_elements(path: &Path) -> Result<Vec<Element>, DocumentError> {
    let sheets = read_sheets(path)?;
    let mut elements = Vec::with_capacity(sheets.len() * 2);
    for sheet in sheets {
        elements.push(Element::Section(sheet.name));
        elements.push(Element::Table(sheet.rows));
    }
    Ok(elements)
}

/// Read the worksheets of an XLSX file in workbook order
pub fn read_sheets(path: &Path) -> Result<Vec<Sheet>, DocumentError> {
    let mut archive = open_archive(path)?;
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();

    let shared = if names.iter().any(|n| n == SHARED_STRINGS_PART) {
        let xml = read_zip_part(&mut archive, path, SHARED_STRINGS_PART)?;
        parse_shared_strings(&xml)?
    } else {
        Vec::new()
    };

    let listed = if names.iter().any(|n| n == WORKBOOK_PART) {
        let workbook = read_zip_part(&mut archive, path, WORKBOOK_PART)?;
        let rels = if names.iter().any(|n| n == WORKBOOK_RELS_PART) {
            let xml = read_zip_part(&mut archive, path, WORKBOOK_RELS_PART)?;
            parse_relationships(&xml)?
        } else {
            HashMap::new()
        };
        workbook_sheets(&workbook, &rels)?
    } else {
        Vec::new()
    };
    let listed = if listed.is_empty() { numbered_sheets(&names) } else { listed };

    let mut sheets = Vec::with_capacity(listed.len());
    for (name, part) in listed {
        if !names.contains(&part) {
            log::warn!("Sheet '{}' points at missing part {}", name, part);
            continue;
        }
        let xml = read_zip_part(&mut archive, path, &part)?;
        let rows = parse_sheet_xml(&part, &xml, &shared)?;
        sheets.push(Sheet { name, rows });
    }
    log::debug!("Read {} sheet(s) from {}", sheets.len(), path.display());
    Ok(sheets)
}

/// Worksheet parts named `xl/worksheets/sheetN.xml`, ordered by N
fn numbered_sheets(names: &[String]) -> Vec<(String, String)> {
    let mut found: Vec<(usize, String)> = names
        .iter()
        .filter_map(|name| {
            let n = name
                .strip_prefix("xl/worksheets/sheet")?
                .strip_suffix(".xml")?
                .parse()
                .ok()?;
            Some((n, name.clone()))
        })
        .collect();
    found.sort();
    found
        .into_iter()
        .map(|(n, part)| (format!("Sheet{}", n), part))
        .collect()
}

fn xml_error(part: &str) -> impl Fn(String) -> DocumentError + '_ {
    move |message| DocumentError::Xml {
        part: part.to_string(),
        message,
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Relationship id -> archive part
fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>, DocumentError> {
    let err = xml_error(WORKBOOK_RELS_PART);
    let mut reader = Reader::from_reader(xml);
    let mut rels = HashMap::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).map_err(|e| err(e.to_string()))? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attribute(&e, b"Id"), attribute(&e, b"Target")) {
                    let part = match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("xl/{}", target),
                    };
                    rels.insert(id, part);
                }
            }
            _ => {}
        }
    }
    Ok(rels)
}

/// (sheet name, part) pairs in workbook order
fn workbook_sheets(xml: &[u8], rels: &HashMap<String, String>) -> Result<Vec<(String, String)>, DocumentError> {
    let err = xml_error(WORKBOOK_PART);
    let mut reader = Reader::from_reader(xml);
    let mut sheets = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).map_err(|e| err(e.to_string()))? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let Some(name) = attribute(&e, b"name") else {
                    continue;
                };
                let position = sheets.len() + 1;
                let part = attribute(&e, b"id")
                    .and_then(|id| rels.get(&id).cloned())
                    .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", position));
                sheets.push((name, part));
            }
            _ => {}
        }
    }
    Ok(sheets)
}

/// Shared string table, one entry per `si`; phonetic runs are skipped
pub fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, DocumentError> {
    let err = xml_error(SHARED_STRINGS_PART);
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_item = false;
    let mut in_text = false;
    let mut phonetic_depth = 0usize;

    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).map_err(|e| err(e.to_string()))? {
            Event::Eof => break,
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = true;
                    current.clear();
                }
                b"rPh" => phonetic_depth += 1,
                b"t" if in_item && phonetic_depth == 0 => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = false;
                    strings.push(std::mem::take(&mut current));
                }
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"t" => in_text = false,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(t) if in_text => {
                current.push_str(&t.unescape().map_err(|e| err(e.to_string()))?);
            }
            _ => {}
        }
    }
    Ok(strings)
}

/// `AB12` -> (row 11, column 27), both 0-based
pub fn parse_cell_ref(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let column = letters
        .chars()
        .try_fold(0usize, |acc, c| {
            acc.checked_mul(26)?
                .checked_add((c.to_ascii_uppercase() as u8 - b'A') as usize + 1)
        })?;
    let row: usize = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, column - 1))
}

/// (row 11, column 27) -> `AB12`
pub fn cell_ref(row: usize, column: usize) -> String {
    let mut letters = Vec::new();
    let mut n = column + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect::<String>() + &(row + 1).to_string()
}

#[derive(Default)]
struct CellState {
    reference: Option<(usize, usize)>,
    kind: Option<String>,
    value: String,
    inline: String,
    in_value: bool,
    in_inline_text: bool,
    phonetic_depth: usize,
}

impl CellState {
    fn resolve(&self, shared: &[String]) -> String {
        let value = self.value.trim();
        match self.kind.as_deref() {
            Some("s") => value
                .parse::<usize>()
                .ok()
                .and_then(|i| shared.get(i).cloned())
                .unwrap_or_default(),
            Some("inlineStr") => self.inline.clone(),
            Some("b") => match value {
                "1" => "TRUE".to_string(),
                "0" => "FALSE".to_string(),
                _ => String::new(),
            },
            Some("e") => String::new(),
            _ => value.to_string(),
        }
    }
}

/// Parse one worksheet into a dense grid; empty cells are empty strings
pub fn parse_sheet_xml(part: &str, xml: &[u8], shared: &[String]) -> Result<Vec<Vec<String>>, DocumentError> {
    let err = xml_error(part);
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut cells: BTreeMap<(usize, usize), String> = BTreeMap::new();
    let mut row_index = 0usize;
    let mut next_column = 0usize;
    let mut cell: Option<CellState> = None;

    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_event_into(&mut buf).map_err(|e| err(e.to_string()))? {
            Event::Eof => break,
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    row_index = attribute(&e, b"r")
                        .and_then(|r| r.parse::<usize>().ok())
                        .and_then(|r| r.checked_sub(1))
                        .unwrap_or(row_index);
                    next_column = 0;
                }
                b"c" => {
                    let reference = attribute(&e, b"r")
                        .and_then(|r| parse_cell_ref(&r))
                        .unwrap_or((row_index, next_column));
                    next_column = reference.1 + 1;
                    cell = Some(CellState {
                        reference: Some(reference),
                        kind: attribute(&e, b"t"),
                        ..CellState::default()
                    });
                }
                b"v" => {
                    if let Some(c) = cell.as_mut() {
                        c.in_value = true;
                    }
                }
                b"rPh" => {
                    if let Some(c) = cell.as_mut() {
                        c.phonetic_depth += 1;
                    }
                }
                b"t" => {
                    if let Some(c) = cell.as_mut() {
                        c.in_inline_text = c.phonetic_depth == 0;
                    }
                }
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"row" => row_index += 1,
                b"c" => {
                    if let Some(done) = cell.take() {
                        let text = done.resolve(shared);
                        if let (Some(position), false) = (done.reference, text.trim().is_empty()) {
                            cells.insert(position, text);
                        }
                    }
                }
                b"v" => {
                    if let Some(c) = cell.as_mut() {
                        c.in_value = false;
                    }
                }
                b"rPh" => {
                    if let Some(c) = cell.as_mut() {
                        c.phonetic_depth = c.phonetic_depth.saturating_sub(1);
                    }
                }
                b"t" => {
                    if let Some(c) = cell.as_mut() {
                        c.in_inline_text = false;
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"c" => {
                    next_column = attribute(&e, b"r")
                        .and_then(|r| parse_cell_ref(&r))
                        .map_or(next_column + 1, |(_, col)| col + 1);
                }
                b"row" => {
                    row_index = attribute(&e, b"r")
                        .and_then(|r| r.parse::<usize>().ok())
                        .unwrap_or(row_index + 1);
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some(c) = cell.as_mut() {
                    if c.in_value || c.in_inline_text {
                        let text = t.unescape().map_err(|e| err(e.to_string()))?;
                        if c.in_value {
                            c.value.push_str(&text);
                        } else {
                            c.inline.push_str(&text);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    let height = cells.keys().map(|(r, _)| r + 1).max().unwrap_or(0);
    let width = cells.keys().map(|(_, c)| c + 1).max().unwrap_or(0);
    if height.saturating_mul(width) > MAX_SHEET_CELLS {
        return Err(DocumentError::SheetTooLarge {
            part: part.to_string(),
            rows: height,
            columns: width,
        });
    }

    let mut grid = vec![vec![String::new(); width]; height];
    for ((r, c), text) in cells {
        grid[r][c] = text;
    }
    Ok(grid)
}
