/*!
 * Progress reporting passed explicitly through the pipeline.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::Level;

use super::models::TaskId;
use super::registry::TaskRegistry;

const TASK_LOG_TARGET: &str = "docalign::task";

/// Receives progress and log lines from one running task
pub trait ProgressSink: Send + Sync {
    /// Record a phase transition
    fn progress(&self, percent: u8, message: &str);

    /// Record a log line
    fn log(&self, level: Level, message: &str);

    /// Whether the owner asked the task to stop
    fn is_cancelled(&self) -> bool {
        false
    }

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }
}

/// Worker-side handle to one registered task.
///
/// Every line is logged and, at info level and above, appended to the
/// task's transcript so pollers can follow along.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    registry: Arc<TaskRegistry>,
    id: TaskId,
    cancel: Arc<AtomicBool>,
}

impl TaskHandle {
    pub(crate) fn new(registry: Arc<TaskRegistry>, id: TaskId, cancel: Arc<AtomicBool>) -> Self {
        Self { registry, id, cancel }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }
}

impl ProgressSink for TaskHandle {
    fn progress(&self, percent: u8, message: &str) {
        log::info!(target: TASK_LOG_TARGET, "[{}] {:>3}% {}", self.id.short(), percent, message);
        let result = self
            .registry
            .update(&self.id, percent, message)
            .and_then(|_| self.registry.append_transcript(&self.id, message));
        if let Err(e) = result {
            log::debug!("Progress update for {} ignored: {}", self.id.short(), e);
        }
    }

    fn log(&self, level: Level, message: &str) {
        log::log!(target: TASK_LOG_TARGET, level, "[{}] {}", self.id.short(), message);
        if level <= Level::Info {
            let line = match level {
                Level::Error => format!("ERROR: {}", message),
                Level::Warn => format!("WARNING: {}", message),
                _ => message.to_string(),
            };
            if let Err(e) = self.registry.append_transcript(&self.id, &line) {
                log::debug!("Transcript line for {} ignored: {}", self.id.short(), e);
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}
