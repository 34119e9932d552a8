/*!
 * Document model and readers.
 *
 * A document is an ordered sequence of elements (paragraphs, tables and
 * section delimiters such as slide headers or sheet names). The alignment core only needs
 * three things from it: a unit count per element, a way to materialize a
 * sub-range of elements as a chunk, and a text rendering of that chunk.
 */

use std::fmt;
use std::io::{Read, Seek};
use std::ops::Range;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::DocumentError;
use crate::language::Language;

pub mod docx;
pub mod pptx;
pub mod text;
pub mod xlsx;

/// Elements at each end of a chunk quoted as anchors
pub const ANCHOR_ELEMENTS: usize = 3;

/// Maximum characters kept in an anchor excerpt
pub const ANCHOR_CHARS: usize = 200;

static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Container format of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Docx,
    Pptx,
    Xlsx,
    Text,
}

impl DocumentKind {
    /// Detect the kind from a file extension
    pub fn from_path(path: &Path) -> Result<Self, DocumentError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "docx" => Ok(Self::Docx),
            "pptx" => Ok(Self::Pptx),
            "xlsx" => Ok(Self::Xlsx),
            "txt" | "md" => Ok(Self::Text),
            other => Err(DocumentError::UnsupportedFormat(if other.is_empty() {
                path.display().to_string()
            } else {
                format!(".{}", other)
            })),
        }
    }

    /// Slide decks and workbooks are always aligned in one piece
    pub fn is_splittable(self) -> bool {
        !matches!(self, Self::Pptx | Self::Xlsx)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Docx => write!(f, "docx"),
            Self::Pptx => write!(f, "pptx"),
            Self::Xlsx => write!(f, "xlsx"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// One structural unit of a document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Element {
    Paragraph(String),
    /// Rows of cell texts
    Table(Vec<Vec<String>>),
    /// A section boundary such as a slide header; carries no content units
    Section(String),
}

impl Element {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::Paragraph(text.into())
    }

    /// Text used for unit counting
    pub fn flattened_text(&self) -> String {
        match self {
            Self::Paragraph(text) => text.clone(),
            Self::Table(rows) => rows
                .iter()
                .map(|row| row.join(" "))
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Section(_) => String::new(),
        }
    }

    /// Text sent to the oracle. Table cells are emitted once each, one per line,
    /// so merged cells do not repeat.
    pub fn render(&self) -> String {
        match self {
            Self::Paragraph(text) => text.clone(),
            Self::Table(rows) => {
                let mut seen: Vec<&str> = Vec::new();
                for cell in rows.iter().flatten() {
                    let cell = cell.trim();
                    if !cell.is_empty() && !seen.contains(&cell) {
                        seen.push(cell);
                    }
                }
                seen.join("\n")
            }
            Self::Section(label) => section_delimiter(label),
        }
    }

    fn anchor_text(&self) -> String {
        match self {
            Self::Paragraph(text) => text.trim().to_string(),
            Self::Table(rows) => rows
                .iter()
                .map(|row| row.join(" | "))
                .collect::<Vec<_>>()
                .join(" "),
            Self::Section(_) => String::new(),
        }
    }
}

/// Render the delimiter line that marks a section boundary
pub fn section_delimiter(label: &str) -> String {
    format!("---- {} ----", label)
}

/// Short excerpts from the start and end of a chunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchors {
    pub first: String,
    pub last: String,
}

impl Anchors {
    pub fn is_empty(&self) -> bool {
        self.first.is_empty() && self.last.is_empty()
    }
}

/// A read-only document
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub kind: DocumentKind,
    pub elements: Vec<Element>,
}

impl Document {
    pub fn new(path: impl Into<PathBuf>, kind: DocumentKind, elements: Vec<Element>) -> Self {
        Self {
            path: path.into(),
            kind,
            elements,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// File stem used to name output artifacts
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document")
            .to_string()
    }

    /// Per-element unit counts in `language`
    pub fn unit_counts(&self, language: Language) -> Vec<usize> {
        self.elements
            .iter()
            .map(|el| language.count_units(&el.flattened_text()))
            .collect()
    }

    pub fn total_units(&self, language: Language) -> usize {
        self.unit_counts(language).iter().sum()
    }

    /// Tables paired with the section label preceding them, such as worksheets
    pub fn sheets(&self) -> Vec<(String, &[Vec<String>])> {
        let mut label = String::new();
        let mut sheets = Vec::new();
        for element in &self.elements {
            match element {
                Element::Section(name) => label = name.clone(),
                Element::Table(rows) => sheets.push((label.clone(), rows.as_slice())),
                Element::Paragraph(_) => {}
            }
        }
        sheets
    }

    /// Render the whole document as one text blob
    pub fn render(&self) -> String {
        self.render_range(0..self.elements.len())
    }

    /// Render the elements in `range` as one text blob
    pub fn render_range(&self, range: Range<usize>) -> String {
        let end = range.end.min(self.elements.len());
        let start = range.start.min(end);

        let mut out = String::new();
        for element in &self.elements[start..end] {
            out.push_str(element.render().trim_end());
            out.push('\n');
        }
        BLANK_RUNS.replace_all(&out, "\n\n").trim().to_string()
    }

    /// Anchors for the elements in `range`
    pub fn anchors(&self, range: Range<usize>) -> Anchors {
        let end = range.end.min(self.elements.len());
        let start = range.start.min(end);
        let slice = &self.elements[start..end];
        if slice.is_empty() {
            return Anchors::default();
        }

        let joined = |els: &[Element]| {
            els.iter()
                .map(Element::anchor_text)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        };

        let head = &slice[..slice.len().min(ANCHOR_ELEMENTS)];
        let tail = &slice[slice.len().saturating_sub(ANCHOR_ELEMENTS)..];

        let first: String = joined(head).chars().take(ANCHOR_CHARS).collect();
        let last_full = joined(tail);
        let skip = last_full.chars().count().saturating_sub(ANCHOR_CHARS);
        let last: String = last_full.chars().skip(skip).collect();

        Anchors { first, last }
    }
}

/// Source of documents for the alignment pipeline
pub trait DocumentReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<Document, DocumentError>;
}

/// Reader that dispatches on the file extension
#[derive(Debug, Default, Clone, Copy)]
pub struct FileDocumentReader;

impl DocumentReader for FileDocumentReader {
    fn read(&self, path: &Path) -> Result<Document, DocumentError> {
        let kind = DocumentKind::from_path(path)?;
        let elements = match kind {
            DocumentKind::Docx => docx::read_elements(path)?,
            DocumentKind::Pptx => pptx::read_elements(path)?,
            DocumentKind::Xlsx => xlsx::read_elements(path)?,
            DocumentKind::Text => text::read_elements(path)?,
        };
        log::debug!(
            "Read {} element(s) from {} ({})",
            elements.len(),
            path.display(),
            kind
        );
        Ok(Document::new(path, kind, elements))
    }
}

/// Largest container part read into memory
pub const MAX_PART_BYTES: u64 = 256 << 20;

/// Cap on the buffer reserved up front from a part's declared size
const PREALLOC_LIMIT: u64 = 64 << 20;

fn prealloc_len(declared: u64) -> usize {
    declared.min(PREALLOC_LIMIT) as usize
}

/// Read a zip container part into memory
pub(crate) fn read_zip_part<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    path: &Path,
    part: &str,
) -> Result<Vec<u8>, DocumentError> {
    read_zip_part_limited(archive, path, part, MAX_PART_BYTES)
}

fn read_zip_part_limited<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    path: &Path,
    part: &str,
    limit: u64,
) -> Result<Vec<u8>, DocumentError> {
    let file = archive.by_name(part).map_err(|_| DocumentError::MissingPart {
        path: path.to_path_buf(),
        part: part.to_string(),
    })?;
    let mut data = Vec::with_capacity(prealloc_len(file.size().min(limit)));
    file.take(limit + 1)
        .read_to_end(&mut data)
        .map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if data.len() as u64 > limit {
        return Err(DocumentError::PartTooLarge {
            part: part.to_string(),
            limit,
        });
    }
    Ok(data)
}

pub(crate) fn open_archive(path: &Path) -> Result<zip::ZipArchive<std::fs::File>, DocumentError> {
    let file = std::fs::File::open(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    zip::ZipArchive::new(file).map_err(|e| DocumentError::Archive {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
