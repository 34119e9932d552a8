/*!
 * End-to-end alignment of one document pair.
 *
 * Phases: read both documents, plan matching chunks, align each chunk
 * through the oracle, refine rows, merge, write the artifacts. Chunk
 * failures are logged and skipped; the task fails only when no chunk
 * produced rows.
 *
 * Two workbooks skip chunk planning: their sheets are paired and aligned
 * cell by cell, one chunk per sheet.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, StreamExt};

use super::cells::{self, TableCellAligner};
use super::merger::{ChunkOutput, ReconciliationMerger, SectionedRow};
use super::parser::{self, AlignmentRow};
use super::post_split::SentencePostSplitter;
use super::prompts;
use super::quality::QualityChecker;
use super::splitter::{CharBudgetSplitter, ChunkTask, PartCountPolicy, pair_plans};
use crate::app_config::{AlignmentConfig, Config};
use crate::document::{Document, DocumentKind, DocumentReader, FileDocumentReader};
use crate::errors::{AlignmentError, DocumentError};
use crate::language::Language;
use crate::output::OutputWriter;
use crate::providers::{Oracle, OracleRequest};
use crate::tracker::{ProgressSink, TaskResult};

/// Progress reserved for the chunk phase
const CHUNK_PROGRESS_START: usize = 30;
const CHUNK_PROGRESS_SPAN: usize = 50;

/// One document pair to align
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentJob {
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    pub source_language: Language,
    pub target_language: Language,
}

impl AlignmentJob {
    pub fn new(
        source_path: impl Into<PathBuf>,
        target_path: impl Into<PathBuf>,
        source_language: Language,
        target_language: Language,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            target_path: target_path.into(),
            source_language,
            target_language,
        }
    }
}

/// Inputs shared by every chunk of one task
struct ChunkContext<'a> {
    source: &'a Document,
    target: &'a Document,
    job: &'a AlignmentJob,
    system_prompt: String,
    total: usize,
    finished: AtomicUsize,
    sink: &'a dyn ProgressSink,
}

/// Runs alignment tasks against an oracle
pub struct AlignmentPipeline {
    oracle: Arc<dyn Oracle>,
    reader: Arc<dyn DocumentReader>,
    config: AlignmentConfig,
    temperature: f32,
    output: OutputWriter,
}

impl std::fmt::Debug for AlignmentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignmentPipeline")
            .field("oracle", &self.oracle)
            .field("config", &self.config)
            .field("output", &self.output.root())
            .finish()
    }
}

impl AlignmentPipeline {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        reader: Arc<dyn DocumentReader>,
        config: AlignmentConfig,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            oracle,
            reader,
            config,
            temperature: 0.1,
            output: OutputWriter::new(output_dir),
        }
    }

    /// Pipeline with the file reader and the settings from `config`
    pub fn from_config(config: &Config, oracle: Arc<dyn Oracle>) -> Self {
        Self::new(
            oracle,
            Arc::new(FileDocumentReader),
            config.alignment.clone(),
            config.output_dir.clone(),
        )
        .with_temperature(config.oracle.common.temperature)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn config(&self) -> &AlignmentConfig {
        &self.config
    }

    /// Align one document pair
    pub async fn run(&self, job: &AlignmentJob, sink: &dyn ProgressSink) -> Result<TaskResult, AlignmentError> {
        sink.progress(5, "Reading source document");
        let source = self.read_document(&job.source_path).await?;
        sink.progress(8, "Reading target document");
        let target = self.read_document(&job.target_path).await?;
        self.check_cancelled(sink)?;

        if source.kind == DocumentKind::Xlsx && target.kind == DocumentKind::Xlsx {
            return self.run_workbooks(job, &source, &target, sink).await;
        }

        sink.progress(10, "Measuring documents");
        let source_units = source.unit_counts(job.source_language);
        let target_units = target.unit_counts(job.target_language);
        let source_total: usize = source_units.iter().sum();
        let target_total: usize = target_units.iter().sum();
        if source_total == 0 {
            return Err(empty_document(&job.source_path, job.source_language));
        }
        if target_total == 0 {
            return Err(empty_document(&job.target_path, job.target_language));
        }
        sink.info(&format!(
            "Source: {} element(s), {} unit(s); target: {} element(s), {} unit(s)",
            source.len(),
            source_total,
            target.len(),
            target_total
        ));

        let parts = self.part_count(&source, &target, source_total, target_total);
        sink.progress(15, &format!("Planning {} part(s)", parts));
        let splitter = CharBudgetSplitter::new(self.config.buffer_units);
        let source_plan = splitter.plan(&source_units, parts)?;

        sink.progress(20, "Splitting target at matching positions");
        let target_plan = splitter.apply_ratios(&target_units, &source_plan.ratios())?;

        sink.progress(25, "Computing chunk anchors");
        let mut tasks = pair_plans(&source_plan, &target_plan);
        for task in tasks.iter_mut() {
            task.source_anchors = source.anchors(task.source.span());
            task.target_anchors = target.anchors(task.target.span());
            sink.debug(&format!(
                "Part {}: source [{}, {}), target [{}, {})",
                task.number(),
                task.source.start,
                task.source.end,
                task.target.start,
                task.target.end
            ));
        }

        let system_prompt = if source.kind == DocumentKind::Pptx {
            prompts::slide_system_prompt(job.source_language, job.target_language)
        } else {
            prompts::document_system_prompt(job.source_language, job.target_language)
        };

        let context = ChunkContext {
            source: &source,
            target: &target,
            job,
            system_prompt,
            total: tasks.len(),
            finished: AtomicUsize::new(0),
            sink,
        };

        sink.progress(CHUNK_PROGRESS_START as u8, &format!("Aligning {} chunk(s)", tasks.len()));
        let concurrency = self.config.max_concurrent_chunks.max(1);
        let ctx = &context;
        let mut results: Vec<(usize, Result<ChunkOutput, AlignmentError>)> = stream::iter(tasks.clone())
            .map(|task| async move {
                let result = self.process_chunk(&task, ctx).await;
                (task.index, result)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let mut outputs = Vec::new();
        let mut failed_chunks = Vec::new();
        for (index, result) in results {
            match result {
                Ok(output) => outputs.push(output),
                Err(AlignmentError::Cancelled) => return Err(AlignmentError::Cancelled),
                Err(e) if e.is_chunk_local() => {
                    sink.warn(&format!("Part {} skipped: {}", index + 1, e));
                    failed_chunks.push(index + 1);
                }
                Err(e) => return Err(e),
            }
        }

        if outputs.is_empty() {
            return Err(AlignmentError::NoOutputProduced {
                failed: failed_chunks.len(),
            });
        }
        if !failed_chunks.is_empty() {
            sink.warn(&format!(
                "{} of {} part(s) failed: {:?}",
                failed_chunks.len(),
                tasks.len(),
                failed_chunks
            ));
        }

        self.finish(job, &source, outputs, failed_chunks, tasks.len(), sink)
    }

    /// Align two workbooks cell by cell, one chunk per sheet pair
    async fn run_workbooks(
        &self,
        job: &AlignmentJob,
        source: &Document,
        target: &Document,
        sink: &dyn ProgressSink,
    ) -> Result<TaskResult, AlignmentError> {
        sink.progress(15, "Pairing worksheets");
        let sheets = cells::pair_sheets(source, target);
        let cell_count: usize = sheets.iter().map(|s| s.cells.len()).sum();
        if cell_count == 0 {
            return Err(AlignmentError::EmptyDocument(format!(
                "{} and {} have no non-empty cells to pair",
                job.source_path.display(),
                job.target_path.display()
            )));
        }
        sink.info(&format!("{} sheet pair(s), {} cell pair(s)", sheets.len(), cell_count));

        let aligner = TableCellAligner::default().with_temperature(self.temperature);
        let concurrency = self.config.max_concurrent_chunks.max(1);
        let language = job.source_language;
        let oracle = self.oracle.as_ref();
        let total = sheets.len();

        let mut outputs = Vec::with_capacity(total);
        for (index, sheet) in sheets.iter().enumerate() {
            self.check_cancelled(sink)?;
            sink.progress(
                (20 + 60 * index / total) as u8,
                &format!("Processing sheet {}/{}: {}", index + 1, total, sheet.name),
            );

            let cell_futures: Vec<_> = sheet.cells.iter().map(|pair| async move {
                    let section = format!("{}!{}", sheet.name, pair.reference);
                    aligner
                        .align(pair, language, oracle, sink)
                        .await
                        .into_iter()
                        .map(|row| SectionedRow {
                            row,
                            section: Some(section.clone()),
                        })
                        .collect::<Vec<_>>()
                }).collect();
            let rows: Vec<Vec<SectionedRow>> = stream::iter(cell_futures)
                .buffered(concurrency)
                .collect()
                .await;

            let output = ChunkOutput {
                chunk_index: index,
                rows: rows.into_iter().flatten().collect(),
            };
            sink.info(&format!(
                "Sheet {}: {} cell pair(s) -> {} row(s)",
                sheet.name,
                sheet.cells.len(),
                output.len()
            ));
            outputs.push(output);
        }

        self.finish(job, source, outputs, Vec::new(), total, sink)
    }

    /// Merge chunk outputs and write every artifact
    fn finish(
        &self,
        job: &AlignmentJob,
        source: &Document,
        outputs: Vec<ChunkOutput>,
        failed_chunks: Vec<usize>,
        split_parts: usize,
        sink: &dyn ProgressSink,
    ) -> Result<TaskResult, AlignmentError> {
        sink.progress(85, "Merging chunk results");
        let task_output = self.output.create_task_dir(&source.stem())?;
        let mut intermediate_files = Vec::with_capacity(outputs.len());
        for output in &outputs {
            intermediate_files.push(task_output.write_intermediate(output)?);
        }

        let merger = ReconciliationMerger::new(QualityChecker::new(job.source_language, job.target_language));
        let outcome = merger.merge(outputs);
        let flagged_rows = outcome.flagged_count();
        sink.info(&format!(
            "Merged {} row(s): {} exact duplicate(s) dropped, {} flagged for review, {} quality issue(s)",
            outcome.rows.len(),
            outcome.dropped_duplicates,
            flagged_rows,
            outcome.issues.len()
        ));

        sink.progress(95, "Writing output");
        let output_path = task_output.write_table(&outcome)?;
        intermediate_files.push(task_output.json_path());

        Ok(TaskResult {
            output_path,
            intermediate_files,
            row_count: outcome.rows.len(),
            flagged_rows,
            document_kind: source.kind,
            split_parts,
            failed_chunks,
            issue_count: outcome.issues.len(),
            issues: outcome
                .issues
                .into_iter()
                .take(self.config.max_issues_reported)
                .collect(),
        })
    }

    async fn read_document(&self, path: &Path) -> Result<Document, AlignmentError> {
        let reader = Arc::clone(&self.reader);
        let owned = path.to_path_buf();
        let document = tokio::task::spawn_blocking(move || reader.read(&owned))
            .await
            .map_err(|e| DocumentError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other(e.to_string()),
            })??;
        Ok(document)
    }

    fn part_count(&self, source: &Document, target: &Document, source_total: usize, target_total: usize) -> usize {
        if !source.kind.is_splittable() || !target.kind.is_splittable() {
            return 1;
        }
        match self.config.forced_parts {
            Some(parts) => parts,
            None => PartCountPolicy::new(self.config.part_thresholds.clone()).parts_for(source_total, target_total),
        }
    }

    fn check_cancelled(&self, sink: &dyn ProgressSink) -> Result<(), AlignmentError> {
        if sink.is_cancelled() {
            sink.warn("Cancellation requested");
            return Err(AlignmentError::Cancelled);
        }
        Ok(())
    }

    async fn process_chunk(&self, task: &ChunkTask, ctx: &ChunkContext<'_>) -> Result<ChunkOutput, AlignmentError> {
        self.check_cancelled(ctx.sink)?;
        let number = task.number();
        ctx.sink.info(&format!("Aligning part {}/{}", number, ctx.total));

        let source_text = ctx.source.render_range(task.source.span());
        let target_text = ctx.target.render_range(task.target.span());
        let anchors = (ctx.total > 1).then_some((&task.source_anchors, &task.target_anchors));
        let payload = prompts::alignment_payload(
            &source_text,
            &target_text,
            anchors.map(|(s, _)| s),
            anchors.map(|(_, t)| t),
        );

        let request = OracleRequest::new(ctx.system_prompt.clone(), payload).temperature(self.temperature);
        let response = self
            .oracle
            .invoke(request)
            .await
            .map_err(|e| AlignmentError::OracleUnavailable {
                chunk: number,
                reason: e.to_string(),
            })?;

        if response.truncated || parser::looks_truncated(&response.text) {
            ctx.sink.warn(&format!(
                "Part {} response may be truncated; consider a larger part count",
                number
            ));
        }

        let parsed = ChunkOutput::from_parsed(task.index, parser::parse_lines(&response.text));
        if parsed.is_empty() {
            return Err(AlignmentError::UnparsableResponse { chunk: number });
        }

        let refined = self.refine(parsed, ctx).await;

        let finished = ctx.finished.fetch_add(1, Ordering::SeqCst) + 1;
        let percent = CHUNK_PROGRESS_START + finished * CHUNK_PROGRESS_SPAN / ctx.total.max(1);
        ctx.sink.progress(
            percent as u8,
            &format!("Part {}/{} aligned: {} row(s)", number, ctx.total, refined.len()),
        );
        Ok(refined)
    }

    /// Post-split every row, keeping its section label
    async fn refine(&self, chunk: ChunkOutput, ctx: &ChunkContext<'_>) -> ChunkOutput {
        let language = ctx.job.source_language;
        if !self.config.enable_post_split || language.is_logographic() {
            return chunk;
        }
        let splitter = SentencePostSplitter::new(true).with_temperature(self.temperature);

        let before = chunk.len();
        let mut rows = Vec::with_capacity(before);
        for (section, run) in section_runs(chunk.rows) {
            let pieces = splitter
                .split_rows(run, language, self.oracle.as_ref(), ctx.sink)
                .await;
            rows.extend(pieces.into_iter().map(|row| SectionedRow {
                row,
                section: section.clone(),
            }));
        }
        if rows.len() > before {
            ctx.sink.info(&format!(
                "Part {}: sentence splitting {} -> {} row(s)",
                chunk.chunk_index + 1,
                before,
                rows.len()
            ));
        }

        ChunkOutput {
            chunk_index: chunk.chunk_index,
            rows,
        }
    }
}

/// Group consecutive rows that share a section label
fn section_runs(rows: Vec<SectionedRow>) -> Vec<(Option<String>, Vec<AlignmentRow>)> {
    let mut runs: Vec<(Option<String>, Vec<AlignmentRow>)> = Vec::new();
    for SectionedRow { row, section } in rows {
        match runs.last_mut() {
            Some((label, run)) if *label == section => run.push(row),
            _ => runs.push((section, vec![row])),
        }
    }
    runs
}

fn empty_document(path: &Path, language: Language) -> AlignmentError {
    AlignmentError::EmptyDocument(format!(
        "{} contains no {} text",
        path.display(),
        language.name()
    ))
}
