use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::Config;
use crate::error::{QueueError, QueueResult};
use crate::queue::{HandlerRegistry, Job, JobFailure, JobId, Outcome, Queue};

/// Consumer loop settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep between polls when the queue is empty
    pub poll_interval: Duration,
    /// Total runs allowed before a failing job is moved to the failure table
    pub max_attempts: u32,
    /// Delay applied when a failed job is released for another try
    pub retry_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_attempts: 3,
            retry_delay: Duration::ZERO,
        }
    }
}

impl From<&Config> for WorkerConfig {
    fn from(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_attempts: config.max_attempts.max(1),
            retry_delay: config.retry_delay(),
        }
    }
}

/// What happened to the job a worker picked up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processed {
    Completed(JobId),
    Released(JobId),
    Failed(JobId),
}

/// Polls a queue and dispatches each job to its registered handler
pub struct Worker {
    queue: Queue,
    handlers: Arc<HandlerRegistry>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(queue: Queue, handlers: Arc<HandlerRegistry>, config: WorkerConfig) -> Self {
        Self {
            queue,
            handlers,
            config,
        }
    }

    /// Reserve and process at most one job. `Ok(None)` means the queue was idle.
    pub async fn process_next(&self) -> QueueResult<Option<Processed>> {
        let Some(job) = self.queue.pop().await? else {
            return Ok(None);
        };

        tracing::info!(
            job_id = %job.id,
            kind = %job.kind(),
            attempts = job.attempts,
            "Processing job"
        );

        let Some(handler) = self.handlers.get(job.kind()) else {
            let failure = JobFailure::from(QueueError::UnknownJobType(job.kind().to_string()));
            self.fail(&job, &failure).await?;
            return Ok(Some(Processed::Failed(job.id)));
        };

        match handler.handle(&job).await {
            Ok(()) => {
                let _ = self.queue.delete(&job).await?;
                tracing::info!(job_id = %job.id, "Job completed successfully");
                Ok(Some(Processed::Completed(job.id)))
            }
            Err(failure) if job.attempts + 1 < self.config.max_attempts => {
                tracing::warn!(
                    job_id = %job.id,
                    attempts = job.attempts,
                    error = %failure,
                    "Job failed, releasing for retry"
                );
                let outcome = self
                    .queue
                    .release_later(&job, self.config.retry_delay)
                    .await?;
                warn_if_missing(&job, outcome, "release");
                Ok(Some(Processed::Released(job.id)))
            }
            Err(failure) => {
                self.fail(&job, &failure).await?;
                Ok(Some(Processed::Failed(job.id)))
            }
        }
    }

    /// Poll until `shutdown` flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(handlers = ?self.handlers.kinds(), "Worker started, waiting for jobs...");

        loop {
            // Check for shutdown
            if *shutdown.borrow() {
                tracing::info!("Shutdown requested, exiting worker loop");
                break;
            }

            let pause = match self.process_next().await {
                Ok(Some(_)) => None,
                Ok(None) => {
                    tracing::debug!("Queue idle");
                    Some(self.config.poll_interval)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Error processing job");
                    // Brief sleep on error to prevent tight loop
                    Some(Duration::from_secs(1).max(self.config.poll_interval))
                }
            };

            if let Some(pause) = pause {
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            tracing::info!("Shutdown channel closed, exiting worker loop");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Worker shutdown complete");
    }

    async fn fail(&self, job: &Job, failure: &JobFailure) -> QueueResult<()> {
        tracing::error!(job_id = %job.id, error = %failure, "Job failed permanently");
        let outcome = self.queue.fail(job, failure).await?;
        warn_if_missing(job, outcome, "fail");
        Ok(())
    }
}

/// The row vanished between pop and our terminal call: another consumer won
fn warn_if_missing(job: &Job, outcome: Outcome, action: &str) {
    if outcome == Outcome::NotFound {
        tracing::warn!(job_id = %job.id, action, "Job no longer pending");
    }
}
