use std::sync::Arc;
use std::time::Duration;

use crate::error::QueueResult;
use crate::queue::{FailureRecord, Job, JobFailure, JobId, JobPayload, JobStore, Outcome, Payload};

/// Producer and consumer entry point over a [`JobStore`].
///
/// Encodes typed payloads and forwards everything else; all scheduling and
/// locking decisions stay in the store.
#[derive(Clone)]
pub struct Queue {
    store: Arc<dyn JobStore>,
}

impl Queue {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Push a job that is eligible immediately, without a category
    pub async fn push<T: JobPayload>(&self, task: &T) -> QueueResult<JobId> {
        self.push_with(task, Duration::ZERO, "").await
    }

    pub async fn push_with<T: JobPayload>(
        &self,
        task: &T,
        delay: Duration,
        category: &str,
    ) -> QueueResult<JobId> {
        let payload = Payload::encode(task)?;
        self.push_payload(&payload, delay, category).await
    }

    /// Push an already-encoded payload
    pub async fn push_payload(
        &self,
        payload: &Payload,
        delay: Duration,
        category: &str,
    ) -> QueueResult<JobId> {
        self.store.push(payload, delay, category).await
    }

    pub async fn pop(&self) -> QueueResult<Option<Job>> {
        self.store.pop().await
    }

    pub async fn delete(&self, job: &Job) -> QueueResult<Outcome> {
        self.store.delete(job.id).await
    }

    /// Make the job eligible again right away
    pub async fn release(&self, job: &Job) -> QueueResult<Outcome> {
        self.store.release(job, Duration::ZERO).await
    }

    pub async fn release_later(&self, job: &Job, delay: Duration) -> QueueResult<Outcome> {
        self.store.release(job, delay).await
    }

    pub async fn fail(&self, job: &Job, failure: &JobFailure) -> QueueResult<Outcome> {
        self.store.fail(job, failure).await
    }

    pub async fn job_count(&self) -> QueueResult<u64> {
        self.store.job_count().await
    }

    pub async fn failed_job_count(&self) -> QueueResult<u64> {
        self.store.failed_job_count().await
    }

    pub async fn list_jobs(&self, category: Option<&str>, limit: u64) -> QueueResult<Vec<Job>> {
        self.store.list_jobs(category, limit).await
    }

    pub async fn list_failures(&self, limit: u64) -> QueueResult<Vec<FailureRecord>> {
        self.store.list_failures(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::error::QueueError;
    use crate::queue::InMemoryStore;
    use serde::{Deserialize, Serialize};
    use time::macros::datetime;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Thumbnail {
        upload_id: u64,
        width: u32,
    }

    impl JobPayload for Thumbnail {
        const KIND: &'static str = "thumbnail";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Purge;

    impl JobPayload for Purge {
        const KIND: &'static str = "purge";
    }

    fn queue() -> (Queue, ManualClock) {
        let clock = ManualClock::new(datetime!(2024-03-01 08:00 UTC));
        let store = InMemoryStore::with_clock(Arc::new(clock.clone()));
        (Queue::new(Arc::new(store)), clock)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (queue, clock) = queue();
        let task = Thumbnail {
            upload_id: 42,
            width: 320,
        };

        let job_id = queue.push_with(&task, Duration::ZERO, "media").await.unwrap();
        let job = queue.pop().await.unwrap().unwrap();

        assert_eq!(job.id, job_id);
        assert_eq!(job.kind(), "thumbnail");
        assert_eq!(job.category, "media");
        assert_eq!(job.attempts, 0);
        assert_eq!(job.created_at, clock.now());
        assert_eq!(job.available_at, clock.now());
        assert_eq!(job.reserved_at, Some(clock.now()));
        assert_eq!(job.decode::<Thumbnail>().unwrap(), task);
    }

    #[tokio::test]
    async fn test_decode_other_kind_fails() {
        let (queue, _clock) = queue();

        queue.push(&Purge).await.unwrap();
        let job = queue.pop().await.unwrap().unwrap();

        assert!(matches!(
            job.decode::<Thumbnail>(),
            Err(QueueError::JobTypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_detached_copy_until_release() {
        let (queue, _clock) = queue();

        queue
            .push(&Thumbnail {
                upload_id: 1,
                width: 100,
            })
            .await
            .unwrap();

        let mut job = queue.pop().await.unwrap().unwrap();
        job.payload = Payload::encode(&Thumbnail {
            upload_id: 1,
            width: 200,
        })
        .unwrap();

        // Local edits are not visible in the store yet
        let listed = queue.list_jobs(None, 10).await.unwrap();
        assert_eq!(listed[0].decode::<Thumbnail>().unwrap().width, 100);

        assert!(queue.release(&job).await.unwrap().is_applied());

        let listed = queue.list_jobs(None, 10).await.unwrap();
        assert_eq!(listed[0].decode::<Thumbnail>().unwrap().width, 200);
        assert_eq!(listed[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_counts() {
        let (queue, _clock) = queue();

        queue.push(&Purge).await.unwrap();
        queue.push(&Purge).await.unwrap();

        let job = queue.pop().await.unwrap().unwrap();
        let _ = queue
            .fail(&job, &JobFailure::new("PurgeError", "locked"))
            .await
            .unwrap();

        assert_eq!(queue.job_count().await.unwrap(), 1);
        assert_eq!(queue.failed_job_count().await.unwrap(), 1);
    }
}
