/*!
 * Process-wide task registry.
 *
 * Each task is written by the one worker that runs it and read by any
 * number of pollers. Terminal states are final: once a task is `done` or
 * `failed`, further updates are rejected.
 *
 * The id map is locked only to look up or insert an entry; each task's
 * state sits behind its own lock, so a poll of one task never waits on the
 * worker of another, and a worker never waits on pollers of other tasks.
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Local, Utc};
use log::{debug, info};
use parking_lot::{Mutex, RwLock};

use super::clock::{Clock, SystemClock};
use super::handle::TaskHandle;
use super::models::{TaskId, TaskResult, TaskState, TaskStatus};
use crate::errors::TrackerError;

struct Entry {
    state: TaskState,
    cancel: Arc<AtomicBool>,
}

type SharedEntry = Arc<Mutex<Entry>>;

/// Registry of alignment tasks
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, SharedEntry>>,
    clock: Arc<dyn Clock>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.len())
            .finish()
    }
}

impl TaskRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ===== Lifecycle =====

    /// Register a new task in the `processing` state
    pub fn create(&self) -> TaskId {
        let id = TaskId::new();
        let entry = Entry {
            state: TaskState::new(id.clone(), self.now()),
            cancel: Arc::new(AtomicBool::new(false)),
        };
        self.tasks.write().insert(id.clone(), Arc::new(Mutex::new(entry)));
        debug!("Registered task {}", id);
        id
    }

    fn entry(&self, id: &TaskId) -> Option<SharedEntry> {
        self.tasks.read().get(id).cloned()
    }

    /// Handle through which the worker reports on `id`
    pub fn handle(self: &Arc<Self>, id: &TaskId) -> Option<TaskHandle> {
        let cancel = Arc::clone(&self.entry(id)?.lock().cancel);
        Some(TaskHandle::new(Arc::clone(self), id.clone(), cancel))
    }

    /// Record progress; the transcript is preserved
    pub fn update(&self, id: &TaskId, progress: u8, message: &str) -> Result<(), TrackerError> {
        self.mutate(id, |state| {
            state.progress = progress.min(100);
            state.message = message.to_string();
        })
    }

    /// Append one timestamped line to the transcript
    pub fn append_transcript(&self, id: &TaskId, line: &str) -> Result<(), TrackerError> {
        let stamp = self.now().with_timezone(&Local).format("%H:%M:%S");
        self.mutate(id, |state| {
            state.transcript.push_str(&format!("[{}] {}\n", stamp, line));
        })
    }

    /// Move the task to `done`
    pub fn complete(&self, id: &TaskId, result: TaskResult, message: &str) -> Result<(), TrackerError> {
        self.mutate(id, |state| {
            state.status = TaskStatus::Done;
            state.progress = 100;
            state.message = message.to_string();
            state.result = Some(result);
        })?;
        info!("Task {} finished: {}", id.short(), message);
        Ok(())
    }

    /// Move the task to `failed`
    pub fn fail(&self, id: &TaskId, error: &str) -> Result<(), TrackerError> {
        self.mutate(id, |state| {
            state.status = TaskStatus::Failed;
            state.message = "Alignment failed".to_string();
            state.error = Some(error.to_string());
        })?;
        info!("Task {} failed: {}", id.short(), error);
        Ok(())
    }

    fn mutate<F>(&self, id: &TaskId, apply: F) -> Result<(), TrackerError>
    where
        F: FnOnce(&mut TaskState),
    {
        let now = self.now();
        let shared = self
            .entry(id)
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))?;
        let mut entry = shared.lock();
        if entry.state.is_terminal() {
            return Err(TrackerError::AlreadyTerminal(id.to_string()));
        }
        apply(&mut entry.state);
        entry.state.updated_at = now;
        Ok(())
    }

    // ===== Cancellation =====

    /// Ask the worker to stop; returns false for unknown or finished tasks
    pub fn request_cancel(&self, id: &TaskId) -> bool {
        let Some(shared) = self.entry(id) else {
            return false;
        };
        let entry = shared.lock();
        if entry.state.is_terminal() {
            return false;
        }
        entry.cancel.store(true, Ordering::SeqCst);
        true
    }

    // ===== Queries =====

    /// Snapshot of the task state
    pub fn get(&self, id: &TaskId) -> Option<TaskState> {
        self.entry(id).map(|e| e.lock().state.clone())
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ===== Eviction =====

    /// Remove a task regardless of its state
    pub fn evict(&self, id: &TaskId) -> Option<TaskState> {
        let shared = self.tasks.write().remove(id)?;
        let state = shared.lock().state.clone();
        Some(state)
    }

    /// Remove finished tasks not updated within `max_age`; returns how many were removed
    pub fn evict_finished_older_than(&self, max_age: Duration) -> usize {
        let cutoff = self.now() - max_age;
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|_, e| {
            let entry = e.lock();
            !(entry.state.is_terminal() && entry.state.updated_at < cutoff)
        });
        let removed = before - tasks.len();
        if removed > 0 {
            debug!("Evicted {} finished task(s)", removed);
        }
        removed
    }
}
