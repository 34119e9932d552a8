/*!
 * Error types for the docalign application.
 *
 * Each subsystem owns one `thiserror` enum. Chunk-level failures
 * (`OracleUnavailable`, `UnparsableResponse`) are recovered inside the
 * pipeline; only task-level variants ever reach the task tracker.
 */

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to an alignment oracle backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The request did not finish within the configured timeout
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The backend answered but produced no text
    #[error("Empty response from {0}")]
    EmptyResponse(String),
}

impl ProviderError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionError(_)
            | Self::RateLimitExceeded(_)
            | Self::Timeout(_)
            | Self::RequestFailed(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::ParseError(_) | Self::AuthenticationError(_) | Self::EmptyResponse(_) => false,
        }
    }
}

/// Errors raised while reading source documents
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Underlying file system failure
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File extension not handled by any reader
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// The container is not a readable zip archive
    #[error("Invalid document archive {path}: {message}")]
    Archive { path: PathBuf, message: String },

    /// Malformed XML inside the container
    #[error("Malformed XML in {part}: {message}")]
    Xml { part: String, message: String },

    /// A required part is absent from the container
    #[error("Missing part {part} in {path}")]
    MissingPart { path: PathBuf, part: String },

    /// A container part exceeds the in-memory size limit
    #[error("Part {part} is larger than {limit} bytes")]
    PartTooLarge { part: String, limit: u64 },

    /// A worksheet spans more cells than can be held in memory
    #[error("Sheet {part} spans {rows} rows by {columns} columns")]
    SheetTooLarge { part: String, rows: usize, columns: usize },
}

/// Errors raised by the alignment pipeline
#[derive(Error, Debug)]
pub enum AlignmentError {
    /// The document has zero measurable units
    #[error("Document has no measurable content: {0}")]
    EmptyDocument(String),

    /// The oracle failed for one chunk (network, timeout or empty reply)
    #[error("Oracle unavailable for chunk {chunk}: {reason}")]
    OracleUnavailable { chunk: usize, reason: String },

    /// The oracle replied but no rows could be parsed
    #[error("Oracle response for chunk {chunk} contained no aligned rows")]
    UnparsableResponse { chunk: usize },

    /// Every chunk failed
    #[error("No output produced: all {failed} chunk(s) failed")]
    NoOutputProduced { failed: usize },

    /// A split was requested with an impossible number of parts
    #[error("Invalid part count: {0}")]
    InvalidPartCount(usize),

    /// Document reader failure
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Output artifact could not be written
    #[error("Failed to write output: {0}")]
    Output(String),

    /// The task was cancelled by its owner
    #[error("Task cancelled")]
    Cancelled,

    /// The task exceeded its total duration budget
    #[error("Task exceeded its time limit of {0:?}")]
    TimedOut(Duration),
}

impl AlignmentError {
    /// Chunk-level failures are skipped rather than aborting the task.
    pub fn is_chunk_local(&self) -> bool {
        matches!(
            self,
            Self::OracleUnavailable { .. } | Self::UnparsableResponse { .. }
        )
    }
}

/// Errors raised by the task registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// No task with the given id
    #[error("Unknown task: {0}")]
    NotFound(String),

    /// The task already reached `done` or `failed`
    #[error("Task {0} is already finished")]
    AlreadyTerminal(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from the document readers
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Error from the alignment pipeline
    #[error("Alignment error: {0}")]
    Alignment(#[from] AlignmentError),

    /// Error from the task registry
    #[error("Task error: {0}")]
    Tracker(#[from] TrackerError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
