use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::alignment::{AlignmentJob, AlignmentPipeline};
use crate::app_config::Config;
use crate::errors::AlignmentError;
use crate::providers::{self, Oracle};
use crate::tracker::{ProgressSink, TaskHandle, TaskId, TaskRegistry, TaskState, TaskStatus};

// @module: Application controller for alignment tasks

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Accepts alignment tasks, runs them in the background and answers polls
pub struct Controller {
    // @field: App configuration
    config: Config,
    registry: Arc<TaskRegistry>,
    pipeline: Arc<AlignmentPipeline>,
}

impl Controller {
    // @method: Create a new controller with the configured oracle
    pub fn with_config(config: Config) -> Result<Self> {
        let oracle = providers::from_config(&config).context("Failed to create oracle backend")?;
        Ok(Self::with_components(config, oracle, Arc::new(TaskRegistry::default())))
    }

    /// Create a controller around an existing oracle and registry
    pub fn with_components(config: Config, oracle: Arc<dyn Oracle>, registry: Arc<TaskRegistry>) -> Self {
        let pipeline = Arc::new(AlignmentPipeline::from_config(&config, oracle));
        Self {
            config,
            registry,
            pipeline,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Job for a document pair in the configured languages
    pub fn job(&self, source_path: impl Into<PathBuf>, target_path: impl Into<PathBuf>) -> Result<AlignmentJob> {
        Ok(AlignmentJob::new(
            source_path,
            target_path,
            self.config.source()?,
            self.config.target()?,
        ))
    }

    // ===== Task surface =====

    /// Start a task in the background and return its id immediately
    pub fn submit(&self, job: AlignmentJob) -> TaskId {
        let id = self.registry.create();
        let limit = Duration::from_secs(self.config.alignment.max_task_duration_secs);

        let Some(handle) = self.registry.handle(&id) else {
            // Only reachable if the task was evicted between the two calls
            warn!("Task {} vanished before it started", id.short());
            return id;
        };

        info!(
            "Task {} accepted: {} -> {}",
            id.short(),
            job.source_path.display(),
            job.target_path.display()
        );

        let pipeline = Arc::clone(&self.pipeline);
        let registry = Arc::clone(&self.registry);
        let task_id = id.clone();
        tokio::spawn(async move {
            let worker = tokio::spawn(execute(pipeline, handle, job, limit));
            if let Err(e) = worker.await {
                error!("Task {} worker aborted: {}", task_id.short(), e);
                if let Err(e) = registry.fail(&task_id, &format!("worker aborted: {}", e)) {
                    debug!("Could not record abort of {}: {}", task_id.short(), e);
                }
            }
        });

        id
    }

    /// Snapshot of a task
    pub fn poll(&self, id: &TaskId) -> Option<TaskState> {
        self.registry.get(id)
    }

    /// Ask a running task to stop at its next chunk boundary
    pub fn cancel(&self, id: &TaskId) -> bool {
        let requested = self.registry.request_cancel(id);
        if requested {
            info!("Cancellation requested for task {}", id.short());
        }
        requested
    }

    /// Poll until the task reaches a terminal state
    pub async fn wait(&self, id: &TaskId) -> Result<TaskState> {
        loop {
            let state = self.poll(id).ok_or_else(|| anyhow!("Unknown task: {}", id))?;
            if state.is_terminal() {
                return Ok(state);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    // ===== Foreground run =====

    /// Align one pair in the foreground, rendering progress on the terminal
    pub async fn run(&self, source_path: PathBuf, target_path: PathBuf) -> Result<TaskState> {
        for path in [&source_path, &target_path] {
            if !path.exists() {
                return Err(anyhow!("Input file does not exist: {:?}", path));
            }
        }

        let start_time = Instant::now();
        let job = self.job(source_path, target_path)?;
        let id = self.submit(job);

        let progress_bar = ProgressBar::new(100);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}% {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar.enable_steady_tick(Duration::from_millis(120));

        let state = loop {
            let state = self.poll(&id).ok_or_else(|| anyhow!("Task {} disappeared", id))?;
            progress_bar.set_position(state.progress as u64);
            progress_bar.set_message(state.message.clone());
            if state.is_terminal() {
                break state;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        };

        match state.status {
            TaskStatus::Done => progress_bar.finish_with_message(state.message.clone()),
            _ => progress_bar.abandon_with_message(state.message.clone()),
        }

        info!("Task finished in {}", Self::format_duration(start_time.elapsed()));
        Ok(state)
    }

    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

/// Run one task to a terminal state
async fn execute(pipeline: Arc<AlignmentPipeline>, handle: TaskHandle, job: AlignmentJob, limit: Duration) {
    let start_time = Instant::now();
    let outcome = match tokio::time::timeout(limit, pipeline.run(&job, &handle)).await {
        Ok(result) => result,
        Err(_) => Err(AlignmentError::TimedOut(limit)),
    };

    let registry = handle.registry();
    let id = handle.id();
    let recorded = match outcome {
        Ok(result) => {
            let elapsed = Controller::format_duration(start_time.elapsed());
            let message = if result.failed_chunks.is_empty() {
                format!("Aligned {} rows in {}", result.row_count, elapsed)
            } else {
                format!(
                    "Aligned {} rows in {} ({} part(s) failed)",
                    result.row_count,
                    elapsed,
                    result.failed_chunks.len()
                )
            };
            handle.info(&message);
            registry.complete(id, result, &message)
        }
        Err(e) => {
            handle.log(Level::Error, &e.to_string());
            registry.fail(id, &e.to_string())
        }
    };

    if let Err(e) = recorded {
        warn!("Could not record the outcome of task {}: {}", id.short(), e);
    }
}
