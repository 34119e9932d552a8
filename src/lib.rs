/*!
 * # docalign - sentence alignment of documents and their translations
 *
 * Aligns a source document with its translation at sentence granularity and
 * produces a bilingual table suitable for building a translation memory.
 * The alignment judgment itself is delegated to a language model (the
 * "oracle"); this library makes large documents practical by cutting them
 * into synchronized overlapping chunks and reconciling the results.
 *
 * ## Architecture
 *
 * - `app_config`: Configuration management
 * - `language`: Supported languages and unit counting
 * - `document`: Document model and DOCX / PPTX / text readers
 * - `alignment`: The alignment core:
 *   - `alignment::splitter`: Character-budget chunk planning
 *   - `alignment::parser`: Oracle response parsing
 *   - `alignment::post_split`: Sentence-level row refinement
 *   - `alignment::quality`: Language and length checks
 *   - `alignment::merger`: Chunk reconciliation
 *   - `alignment::pipeline`: One task from documents to artifacts
 * - `providers`: Oracle backends:
 *   - `providers::openai`: OpenAI-compatible chat completions (OpenAI, OpenRouter, LM Studio)
 *   - `providers::anthropic`: Anthropic messages API
 *   - `providers::cache`: Response memoisation
 * - `tracker`: Task registry and progress reporting
 * - `output`: Task artifacts
 * - `app_controller`: Submit / poll / cancel surface
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod alignment;
pub mod app_config;
pub mod app_controller;
pub mod document;
pub mod errors;
pub mod language;
pub mod output;
pub mod providers;
pub mod tracker;

// Re-export main types for easier usage
pub use alignment::{AlignmentJob, AlignmentPipeline, AlignmentRow};
pub use app_config::Config;
pub use app_controller::Controller;
pub use errors::{AlignmentError, AppError, DocumentError, ProviderError, TrackerError};
pub use language::Language;
pub use tracker::{TaskId, TaskRegistry, TaskState, TaskStatus};
