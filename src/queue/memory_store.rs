use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::error::QueueResult;
use crate::queue::{
    delayed_until, stale_cutoff, FailureRecord, Job, JobFailure, JobId, JobStore, Outcome,
    Payload, DEFAULT_RESERVATION_TIMEOUT,
};

/// In-memory store with the same scheduling semantics as the database store.
///
/// One mutex guards all rows, so the sweep, selection and reservation inside
/// `pop` form a single critical section.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<Mutex<InMemoryStoreInner>>,
    clock: Arc<dyn Clock>,
    reservation_timeout: Duration,
}

struct InMemoryStoreInner {
    next_job_id: i64,
    next_failure_id: i64,
    jobs: BTreeMap<JobId, Job>,
    failures: Vec<FailureRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(InMemoryStoreInner {
                next_job_id: 1,
                next_failure_id: 1,
                jobs: BTreeMap::new(),
                failures: Vec::new(),
            })),
            clock,
            reservation_timeout: DEFAULT_RESERVATION_TIMEOUT,
        }
    }

    pub fn with_reservation_timeout(mut self, timeout: Duration) -> Self {
        self.reservation_timeout = timeout;
        self
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStoreInner {
    fn release_reserved(&mut self, expired: OffsetDateTime) -> usize {
        let mut released = 0;
        for job in self.jobs.values_mut() {
            if job.reserved_at.is_some_and(|at| at <= expired) {
                job.attempts += 1;
                job.reserved_at = None;
                released += 1;
            }
        }
        released
    }
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn push(&self, payload: &Payload, delay: Duration, category: &str) -> QueueResult<JobId> {
        let now = self.clock.now();
        let available_at = delayed_until(now, delay)?;
        let mut inner = self.inner.lock().await;

        let id = JobId(inner.next_job_id);
        inner.next_job_id += 1;
        inner.jobs.insert(
            id,
            Job {
                id,
                payload: payload.clone(),
                category: category.to_string(),
                attempts: 0,
                priority: 0,
                reserved_at: None,
                available_at,
                created_at: now,
            },
        );
        drop(inner);

        tracing::info!(job_id = %id, kind = %payload.kind, category, "Job pushed");
        Ok(id)
    }

    async fn pop(&self) -> QueueResult<Option<Job>> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;

        if let Some(expired) = stale_cutoff(now, self.reservation_timeout) {
            let released = inner.release_reserved(expired);
            if released > 0 {
                tracing::warn!(released, "Released stale reservations");
            }
        }

        let next = inner
            .jobs
            .values_mut()
            .filter(|job| job.reserved_at.is_none() && job.available_at <= now)
            .min_by_key(|job| (job.available_at, job.id));

        match next {
            Some(job) => {
                job.reserved_at = Some(now);
                tracing::info!(job_id = %job.id, attempts = job.attempts, "Job reserved");
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: JobId) -> QueueResult<Outcome> {
        let mut inner = self.inner.lock().await;
        let outcome = match inner.jobs.remove(&id) {
            Some(_) => Outcome::Applied,
            None => Outcome::NotFound,
        };
        Ok(outcome)
    }

    async fn release(&self, job: &Job, delay: Duration) -> QueueResult<Outcome> {
        let available_at = delayed_until(self.clock.now(), delay)?;
        let mut inner = self.inner.lock().await;

        let Some(stored) = inner.jobs.get_mut(&job.id) else {
            return Ok(Outcome::NotFound);
        };
        stored.payload = job.payload.clone();
        stored.attempts += 1;
        stored.reserved_at = None;
        stored.available_at = available_at;

        tracing::info!(job_id = %job.id, attempts = stored.attempts, "Job released");
        Ok(Outcome::Applied)
    }

    async fn fail(&self, job: &Job, failure: &JobFailure) -> QueueResult<Outcome> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;

        if inner.jobs.remove(&job.id).is_none() {
            return Ok(Outcome::NotFound);
        }

        let id = inner.next_failure_id;
        inner.next_failure_id += 1;
        inner.failures.push(FailureRecord {
            id,
            payload: job.payload.clone(),
            error: failure.to_string(),
            failed_at: now,
        });

        tracing::info!(job_id = %job.id, "Job moved to failures");
        Ok(Outcome::Applied)
    }

    async fn job_count(&self) -> QueueResult<u64> {
        let inner = self.inner.lock().await;
        Ok(inner.jobs.len() as u64)
    }

    async fn failed_job_count(&self) -> QueueResult<u64> {
        let inner = self.inner.lock().await;
        Ok(inner.failures.len() as u64)
    }

    async fn list_jobs(&self, category: Option<&str>, limit: u64) -> QueueResult<Vec<Job>> {
        let inner = self.inner.lock().await;
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|job| category.map_or(true, |c| job.category == c))
            .cloned()
            .collect();

        jobs.sort_by_key(|job| (job.available_at, job.id));

        Ok(jobs.into_iter().take(limit as usize).collect())
    }

    async fn list_failures(&self, limit: u64) -> QueueResult<Vec<FailureRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .failures
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
