/*!
 * Sentence alignment of a document and its translation.
 *
 * This module provides:
 * - Character-budget splitting into overlapping, synchronized chunks
 * - Parsing of oracle responses into aligned rows
 * - Oracle-assisted sentence splitting of merged rows
 * - Cell-by-cell alignment of workbooks
 * - Merging of chunk outputs with duplicate handling and quality checks
 * - The pipeline tying these together for one task
 */

pub mod cells;
pub mod merger;
pub mod parser;
pub mod pipeline;
pub mod post_split;
pub mod prompts;
pub mod quality;
pub mod splitter;

// Re-export main types
pub use cells::{CellPair, SheetPair, TableCellAligner};
pub use merger::{ChunkOutput, DuplicateField, MergeOutcome, MergedRow, ReconciliationMerger};
pub use parser::AlignmentRow;
pub use pipeline::{AlignmentJob, AlignmentPipeline};
pub use post_split::SentencePostSplitter;
pub use quality::{Issue, IssueKind, QualityChecker};
pub use splitter::{CharBudgetSplitter, ChunkTask, PartCountPolicy, Range, SplitPlan};
