/*!
 * Common test utilities for the docalign test suite
 */

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use log::Level;
use parking_lot::Mutex;
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use docalign::app_config::{Config, ProviderKind};
use docalign::tracker::ProgressSink;

/// Route library logs to the test output
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

fn write_zip(path: &Path, parts: &[(String, String)]) -> Result<()> {
    let mut zip = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default();
    for (name, content) in parts {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(content.as_bytes())?;
    }
    zip.finish()?;
    Ok(())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn word_paragraphs(paragraphs: &[&str]) -> String {
    paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", escape(p)))
        .collect()
}

/// Creates a minimal DOCX with one paragraph per entry
pub fn create_test_docx(dir: &Path, filename: &str, paragraphs: &[&str]) -> Result<PathBuf> {
    create_test_docx_with_parts(dir, filename, paragraphs, &[])
}

/// Creates a DOCX whose extra parts (e.g. `word/footer1.xml`) hold one paragraph per entry.
/// Parts named `word/footnotes.xml` or `word/endnotes.xml` hold one note per entry.
pub fn create_test_docx_with_parts(
    dir: &Path,
    filename: &str,
    paragraphs: &[&str],
    extra: &[(&str, &[&str])],
) -> Result<PathBuf> {
    const NS: &str = "xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"";
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document {}><w:body>{}</w:body></w:document>",
        NS,
        word_paragraphs(paragraphs)
    );
    let mut parts = vec![("word/document.xml".to_string(), xml)];
    for (name, entries) in extra {
        let xml = match *name {
            "word/footnotes.xml" | "word/endnotes.xml" => {
                let tag = if name.contains("foot") { "footnote" } else { "endnote" };
                let notes: String = entries
                    .iter()
                    .enumerate()
                    .map(|(i, e)| {
                        format!("<w:{0} w:id=\"{1}\">{2}</w:{0}>", tag, i + 1, word_paragraphs(&[*e]))
                    })
                    .collect();
                format!(
                    "<w:{0}s {1}><w:{0} w:type=\"separator\" w:id=\"-1\">\
                     <w:p><w:r><w:separator/></w:r></w:p></w:{0}>{2}</w:{0}s>",
                    tag, NS, notes
                )
            }
            _ => format!("<w:hdr {}>{}</w:hdr>", NS, word_paragraphs(entries)),
        };
        parts.push((name.to_string(), xml));
    }
    let path = dir.join(filename);
    write_zip(&path, &parts)?;
    Ok(path)
}

/// Creates a minimal PPTX; each slide holds one text body per entry
pub fn create_test_pptx(dir: &Path, filename: &str, slides: &[&[&str]]) -> Result<PathBuf> {
    let parts: Vec<(String, String)> = slides
        .iter()
        .enumerate()
        .map(|(i, bodies)| {
            let shapes: String = bodies
                .iter()
                .map(|b| {
                    format!(
                        "<p:sp><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp>",
                        escape(b)
                    )
                })
                .collect();
            let xml = format!(
                "<p:sld xmlns:p=\"urn:p\" xmlns:a=\"urn:a\"><p:cSld><p:spTree>{}</p:spTree></p:cSld></p:sld>",
                shapes
            );
            (format!("ppt/slides/slide{}.xml", i + 1), xml)
        })
        .collect();
    let path = dir.join(filename);
    write_zip(&path, &parts)?;
    Ok(path)
}

/// Creates a minimal XLSX; each sheet is a name plus rows of cell texts, stored as shared strings
pub fn create_test_xlsx(dir: &Path, filename: &str, sheets: &[(&str, &[&[&str]])]) -> Result<PathBuf> {
    const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

    let mut shared: Vec<String> = Vec::new();
    let mut parts = Vec::new();
    let mut entries = String::new();
    let mut rels = String::new();

    for (i, (name, rows)) in sheets.iter().enumerate() {
        let number = i + 1;
        entries.push_str(&format!(
            "<sheet name=\"{}\" sheetId=\"{}\" r:id=\"rId{}\"/>",
            escape(name),
            number,
            number
        ));
        rels.push_str(&format!(
            "<Relationship Id=\"rId{}\" Type=\"{}/worksheet\" Target=\"worksheets/sheet{}.xml\"/>",
            number, REL_NS, number
        ));

        let mut data = String::new();
        for (r, row) in rows.iter().enumerate() {
            data.push_str(&format!("<row r=\"{}\">", r + 1));
            for (c, text) in row.iter().enumerate().filter(|(_, t)| !t.is_empty()) {
                let index = match shared.iter().position(|s| s == text) {
                    Some(index) => index,
                    None => {
                        shared.push(text.to_string());
                        shared.len() - 1
                    }
                };
                let column = (b'A' + c as u8) as char;
                data.push_str(&format!("<c r=\"{}{}\" t=\"s\"><v>{}</v></c>", column, r + 1, index));
            }
            data.push_str("</row>");
        }
        parts.push((
            format!("xl/worksheets/sheet{}.xml", number),
            format!("<worksheet xmlns=\"{}\"><sheetData>{}</sheetData></worksheet>", MAIN_NS, data),
        ));
    }

    let strings: String = shared
        .iter()
        .map(|s| format!("<si><t xml:space=\"preserve\">{}</t></si>", escape(s)))
        .collect();
    parts.push((
        "xl/workbook.xml".to_string(),
        format!(
            "<workbook xmlns=\"{}\" xmlns:r=\"{}\"><sheets>{}</sheets></workbook>",
            MAIN_NS, REL_NS, entries
        ),
    ));
    parts.push((
        "xl/_rels/workbook.xml.rels".to_string(),
        format!(
            "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">{}</Relationships>",
            rels
        ),
    ));
    parts.push((
        "xl/sharedStrings.xml".to_string(),
        format!("<sst xmlns=\"{}\">{}</sst>", MAIN_NS, strings),
    ));

    let path = dir.join(filename);
    write_zip(&path, &parts)?;
    Ok(path)
}

/// Configuration that needs no API key and writes below `output_dir`
pub fn test_config(output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.source_language = "en".to_string();
    config.target_language = "fr".to_string();
    config.oracle.provider = ProviderKind::LMStudio;
    config.oracle.common.cache_responses = false;
    config.oracle.common.retry_count = 0;
    config.output_dir = output_dir.to_path_buf();
    config
}

/// Progress sink that records everything it receives
#[derive(Default)]
pub struct RecordingSink {
    pub progress: Mutex<Vec<(u8, String)>>,
    pub lines: Mutex<Vec<(Level, String)>>,
    pub cancelled: AtomicBool,
}

impl RecordingSink {
    pub fn cancelled() -> Self {
        let sink = Self::default();
        sink.cancelled.store(true, Ordering::SeqCst);
        sink
    }

    pub fn percentages(&self) -> Vec<u8> {
        self.progress.lock().iter().map(|(p, _)| *p).collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(level, _)| *level == Level::Warn)
            .map(|(_, line)| line.clone())
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn progress(&self, percent: u8, message: &str) {
        self.progress.lock().push((percent, message.to_string()));
    }

    fn log(&self, level: Level, message: &str) {
        self.lines.lock().push((level, message.to_string()));
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
