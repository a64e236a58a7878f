pub mod connection;
pub mod database_store;
pub mod facade;
pub mod handler;
pub mod job;
pub mod memory_store;
pub mod sync_store;

pub use connection::ConnectionRegistry;
pub use database_store::DatabaseStore;
pub use facade::Queue;
pub use handler::{HandlerRegistry, JobHandler};
pub use job::{FailureRecord, Job, JobFailure, JobId, JobPayload, Payload, UNDECODABLE_KIND};
pub use memory_store::InMemoryStore;
pub use sync_store::SyncStore;

use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::{QueueError, QueueResult};

/// Default time after which a reservation is considered abandoned
pub const DEFAULT_RESERVATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Result of a single-row mutation
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The row existed and was changed
    Applied,
    /// The row was already gone (deleted or failed through another path)
    NotFound,
}

impl Outcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }

    pub(crate) fn from_rows_affected(rows: u64) -> Self {
        if rows == 0 {
            Self::NotFound
        } else {
            Self::Applied
        }
    }
}

/// `now + delay`, or `InvalidDelay` when the result is not representable
pub(crate) fn delayed_until(now: OffsetDateTime, delay: Duration) -> QueueResult<OffsetDateTime> {
    time::Duration::try_from(delay)
        .ok()
        .and_then(|delay| now.checked_add(delay))
        .ok_or_else(|| {
            QueueError::InvalidDelay(format!("{}s from {} is out of range", delay.as_secs(), now))
        })
}

/// Reservations made at or before the returned instant are stale. `None`
/// when the timeout reaches past the earliest representable time.
pub(crate) fn stale_cutoff(now: OffsetDateTime, timeout: Duration) -> Option<OffsetDateTime> {
    time::Duration::try_from(timeout)
        .ok()
        .and_then(|timeout| now.checked_sub(timeout))
}

/// Storage backend for pending and failed jobs.
///
/// Stores own every eligibility and locking decision. `pop` runs the stale
/// reservation sweep and then selects and reserves the eligible job with the
/// smallest `(available_at, id)` as one atomic step, so two concurrent callers
/// never receive the same job.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job, eligible once `delay` has elapsed
    async fn push(&self, payload: &Payload, delay: Duration, category: &str) -> QueueResult<JobId>;

    /// Reserve the next eligible job, or `None` when nothing is eligible
    async fn pop(&self) -> QueueResult<Option<Job>>;

    /// Remove a job; deleting a missing job is a no-op
    async fn delete(&self, id: JobId) -> QueueResult<Outcome>;

    /// Put a job back: persists its payload, increments `attempts`, clears the
    /// reservation and makes it eligible again after `delay`
    async fn release(&self, job: &Job, delay: Duration) -> QueueResult<Outcome>;

    /// Record a permanent failure and remove the pending job, atomically
    async fn fail(&self, job: &Job, failure: &JobFailure) -> QueueResult<Outcome>;

    /// Number of pending jobs (advisory)
    async fn job_count(&self) -> QueueResult<u64>;

    /// Number of failure records (advisory)
    async fn failed_job_count(&self) -> QueueResult<u64>;

    /// Pending jobs in selection order, optionally filtered by category
    async fn list_jobs(&self, category: Option<&str>, limit: u64) -> QueueResult<Vec<Job>>;

    /// Failure records, newest first
    async fn list_failures(&self, limit: u64) -> QueueResult<Vec<FailureRecord>>;
}
