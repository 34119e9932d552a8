/*!
 * Task progress tracking.
 *
 * This module provides:
 * - An explicit task registry with an injected clock
 * - Task state snapshots for pollers
 * - Task handles that carry progress and transcript lines from the worker
 */

pub mod clock;
pub mod handle;
pub mod models;
pub mod registry;

// Re-export main types
pub use clock::{Clock, ManualClock, SystemClock};
pub use handle::{ProgressSink, TaskHandle};
pub use models::{TaskId, TaskResult, TaskState, TaskStatus};
pub use registry::TaskRegistry;
