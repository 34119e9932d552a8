/*!
 * Output artifacts for alignment tasks.
 *
 * Each task writes into its own directory under `<output_dir>/alignment/`:
 * a TSV table for review, a JSON copy carrying the issues, and the rows of
 * every successful chunk before merging.
 */

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;

use crate::alignment::merger::{ChunkOutput, MergeOutcome, MergedRow};
use crate::alignment::quality::Issue;
use crate::errors::AlignmentError;

const TSV_HEADER: &str = "source\ttarget\tchunk\treview";

/// Creates task directories below a root output directory
#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
}

impl OutputWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: output_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create `<root>/alignment/<stem>_<YYYYmmdd_HHMMSS>_<id>/` and its `intermediate/` child.
    /// Fails rather than sharing a directory with another task.
    pub fn create_task_dir(&self, stem: &str) -> Result<TaskOutput, AlignmentError> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let parent = self.root.join("alignment");
        ensure_dir(&parent)?;
        let dir = parent.join(format!("{}_{}_{}", sanitize(stem), stamp, unique_suffix()));
        fs::create_dir(&dir)
            .map_err(|e| AlignmentError::Output(format!("cannot create {}: {}", dir.display(), e)))?;
        ensure_dir(&dir.join("intermediate"))?;
        log::debug!("Created task directory {}", dir.display());
        Ok(TaskOutput {
            dir,
            stem: sanitize(stem),
        })
    }
}

/// The files of one task
#[derive(Debug, Clone)]
pub struct TaskOutput {
    dir: PathBuf,
    stem: String,
}

#[derive(Serialize)]
struct JsonArtifact<'a> {
    rows: &'a [MergedRow],
    issues: &'a [Issue],
    dropped_duplicates: usize,
}

impl TaskOutput {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tsv_path(&self) -> PathBuf {
        self.dir.join(format!("{}_aligned.tsv", self.stem))
    }

    pub fn json_path(&self) -> PathBuf {
        self.dir.join(format!("{}_aligned.json", self.stem))
    }

    /// Write one chunk's rows as `intermediate/part<N>_rows.json`
    pub fn write_intermediate(&self, chunk: &ChunkOutput) -> Result<PathBuf, AlignmentError> {
        let path = self
            .dir
            .join("intermediate")
            .join(format!("part{}_rows.json", chunk.chunk_index + 1));
        write_json(&path, chunk)?;
        Ok(path)
    }

    /// Write the merged table; returns the TSV path
    pub fn write_table(&self, outcome: &MergeOutcome) -> Result<PathBuf, AlignmentError> {
        let mut tsv = String::from(TSV_HEADER);
        tsv.push('\n');
        for row in &outcome.rows {
            let review = row.duplicate.map(|d| d.to_string()).unwrap_or_default();
            tsv.push_str(&format!(
                "{}\t{}\t{}\t{}\n",
                tsv_cell(&row.row.source),
                tsv_cell(&row.row.target),
                tsv_cell(&row.provenance()),
                review
            ));
        }
        let tsv_path = self.tsv_path();
        write_file(&tsv_path, &tsv)?;

        let artifact = JsonArtifact {
            rows: &outcome.rows,
            issues: &outcome.issues,
            dropped_duplicates: outcome.dropped_duplicates,
        };
        write_json(&self.json_path(), &artifact)?;

        Ok(tsv_path)
    }
}

fn tsv_cell(text: &str) -> String {
    text.chars()
        .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .collect()
}

fn sanitize(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "document".to_string() } else { cleaned }
}

fn unique_suffix() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

fn ensure_dir(path: &Path) -> Result<(), AlignmentError> {
    fs::create_dir_all(path)
        .map_err(|e| AlignmentError::Output(format!("cannot create {}: {}", path.display(), e)))
}

fn write_file(path: &Path, content: &str) -> Result<(), AlignmentError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, content)
        .map_err(|e| AlignmentError::Output(format!("cannot write {}: {}", path.display(), e)))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AlignmentError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AlignmentError::Output(format!("cannot serialize {}: {}", path.display(), e)))?;
    write_file(path, &json)
}
