/*!
 * Task state models shared between the worker and pollers.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::alignment::quality::Issue;
use crate::document::DocumentKind;

/// Opaque task identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log prefixes
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Processing,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Summary of a finished alignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Primary output artifact
    pub output_path: PathBuf,
    /// Other files written by the task
    pub intermediate_files: Vec<PathBuf>,
    pub row_count: usize,
    /// Rows flagged as partial duplicates
    pub flagged_rows: usize,
    pub document_kind: DocumentKind,
    pub split_parts: usize,
    /// 1-based numbers of chunks that produced no rows
    pub failed_chunks: Vec<usize>,
    /// First issues, capped
    pub issues: Vec<Issue>,
    /// Issue count before capping
    pub issue_count: usize,
}

/// Snapshot of one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub id: TaskId,
    pub status: TaskStatus,
    /// 0..=100
    pub progress: u8,
    pub message: String,
    /// Accumulated `[HH:MM:SS] message` lines
    pub transcript: String,
    pub result: Option<TaskResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskState {
    pub fn new(id: TaskId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: TaskStatus::Processing,
            progress: 0,
            message: "Queued".to_string(),
            transcript: String::new(),
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
