use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::error::QueueResult;
use crate::queue::{
    FailureRecord, HandlerRegistry, Job, JobFailure, JobId, JobStore, Outcome, Payload,
};

/// Store that runs each job in-process as soon as it is pushed.
///
/// Nothing is persisted: delays are ignored, `pop` never yields a job and
/// mutations report `NotFound`. Handler failures are kept in memory so they
/// still show up in `failed_job_count` and `list_failures`.
#[derive(Clone)]
pub struct SyncStore {
    handlers: Arc<HandlerRegistry>,
    clock: Arc<dyn Clock>,
    inner: Arc<Mutex<SyncStoreInner>>,
}

#[derive(Default)]
struct SyncStoreInner {
    last_job_id: i64,
    failures: Vec<FailureRecord>,
}

impl SyncStore {
    pub fn new(handlers: Arc<HandlerRegistry>) -> Self {
        Self::with_clock(handlers, Arc::new(SystemClock))
    }

    pub fn with_clock(handlers: Arc<HandlerRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            handlers,
            clock,
            inner: Arc::new(Mutex::new(SyncStoreInner::default())),
        }
    }
}

#[async_trait]
impl JobStore for SyncStore {
    async fn push(&self, payload: &Payload, _delay: Duration, category: &str) -> QueueResult<JobId> {
        let now = self.clock.now();
        let id = {
            let mut inner = self.inner.lock().await;
            inner.last_job_id += 1;
            JobId(inner.last_job_id)
        };

        let job = Job {
            id,
            payload: payload.clone(),
            category: category.to_string(),
            attempts: 0,
            priority: 0,
            reserved_at: Some(now),
            available_at: now,
            created_at: now,
        };

        match self.handlers.dispatch(&job).await {
            Ok(()) => {
                tracing::info!(job_id = %id, kind = %payload.kind, "Job executed synchronously");
            }
            Err(failure) => {
                tracing::error!(job_id = %id, error = %failure, "Synchronous job failed");
                let mut inner = self.inner.lock().await;
                let failure_id = inner.failures.len() as i64 + 1;
                inner.failures.push(FailureRecord {
                    id: failure_id,
                    payload: job.payload,
                    error: failure.to_string(),
                    failed_at: self.clock.now(),
                });
            }
        }

        Ok(id)
    }

    async fn pop(&self) -> QueueResult<Option<Job>> {
        Ok(None)
    }

    async fn delete(&self, _id: JobId) -> QueueResult<Outcome> {
        Ok(Outcome::NotFound)
    }

    async fn release(&self, _job: &Job, _delay: Duration) -> QueueResult<Outcome> {
        Ok(Outcome::NotFound)
    }

    async fn fail(&self, _job: &Job, _failure: &JobFailure) -> QueueResult<Outcome> {
        Ok(Outcome::NotFound)
    }

    async fn job_count(&self) -> QueueResult<u64> {
        Ok(0)
    }

    async fn failed_job_count(&self) -> QueueResult<u64> {
        let inner = self.inner.lock().await;
        Ok(inner.failures.len() as u64)
    }

    async fn list_jobs(&self, _category: Option<&str>, _limit: u64) -> QueueResult<Vec<Job>> {
        Ok(Vec::new())
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
