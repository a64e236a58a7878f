use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    DbBackend, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait, Value,
};

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, ConfigError};
use crate::entity::{queue_failure, queue_job};
use crate::error::{QueueError, QueueResult};
use crate::queue::{
    delayed_until, stale_cutoff, FailureRecord, Job, JobFailure, JobId, JobStore, Outcome,
    Payload, DEFAULT_RESERVATION_TIMEOUT,
};

/// Tables:
/// - queue_jobs      - pending jobs, selection index on (reserved_at, available_at, id)
/// - queue_failures  - append-only failure records
///
/// Reservations older than this cutoff go back to the queue with one more attempt.
const RELEASE_RESERVED_SQL: &str = r#"
    UPDATE queue_jobs
    SET attempts = attempts + 1, reserved_at = NULL
    WHERE reserved_at <= $1
"#;

/// Select-and-reserve in one statement. SKIP LOCKED lets concurrent poppers
/// move on to the next row instead of both claiming the same one.
const RESERVE_NEXT_SQL: &str = r#"
    UPDATE queue_jobs
    SET reserved_at = $1
    WHERE id = (
        SELECT id FROM queue_jobs
        WHERE reserved_at IS NULL
          AND available_at <= $1
        ORDER BY available_at, id
        LIMIT 1
        FOR UPDATE SKIP LOCKED
    )
    RETURNING id, job, category, attempts, priority, reserved_at, available_at, created_at
"#;

const RELEASE_SQL: &str = r#"
    UPDATE queue_jobs
    SET job = $1, attempts = attempts + 1, reserved_at = NULL, available_at = $2
    WHERE id = $3
"#;

/// Durable Postgres-backed job store
#[derive(Clone)]
pub struct DatabaseStore {
    db: DatabaseConnection,
    clock: Arc<dyn Clock>,
    reservation_timeout: Duration,
}

impl DatabaseStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: DatabaseConnection, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            clock,
            reservation_timeout: DEFAULT_RESERVATION_TIMEOUT,
        }
    }

    pub fn with_reservation_timeout(mut self, timeout: Duration) -> Self {
        self.reservation_timeout = timeout;
        self
    }

    /// Connect using `DATABASE_URL` and the pool settings from `config`
    pub async fn connect(config: &Config, clock: Arc<dyn Clock>) -> QueueResult<Self> {
        let url = config
            .database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let mut opt = ConnectOptions::new(url);
        opt.max_connections(config.max_connections)
            .min_connections(1)
            .sqlx_logging(false);

        let db = Database::connect(opt).await?;

        Ok(Self::with_clock(db, clock).with_reservation_timeout(config.reservation_timeout()))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Create the queue tables if they do not exist yet
    pub async fn migrate(&self) -> QueueResult<()> {
        sqlx::migrate!("./migrations")
            .run(self.db.get_postgres_connection_pool())
            .await?;
        Ok(())
    }

    /// Empty both tables and reset their id sequences
    pub async fn truncate(&self) -> QueueResult<()> {
        self.db
            .execute_unprepared("TRUNCATE TABLE queue_jobs, queue_failures RESTART IDENTITY")
            .await?;
        tracing::info!("Queue tables truncated");
        Ok(())
    }

    async fn release_reserved(&self, now: time::OffsetDateTime) -> QueueResult<u64> {
        let Some(expired) = stale_cutoff(now, self.reservation_timeout) else {
            return Ok(0);
        };
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                RELEASE_RESERVED_SQL,
                [Value::from(expired)],
            ))
            .await?;
        Ok(result.rows_affected())
    }

    /// Move a reserved row that cannot be materialized as a `Job` straight
    /// to the failure table, keeping the blob verbatim
    async fn bury(&self, model: queue_job::Model, err: QueueError) -> QueueResult<()> {
        let failure = JobFailure::from(err);
        let txn = self.db.begin().await?;

        queue_failure::ActiveModel {
            job: Set(model.job),
            error: Set(Some(failure.to_string())),
            failed_at: Set(self.clock.now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let deleted = queue_job::Entity::delete_by_id(model.id).exec(&txn).await?;
        if deleted.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(());
        }
        txn.commit().await?;

        tracing::warn!(job_id = model.id, error = %failure, "Undecodable job moved to failures");
        Ok(())
    }
}

fn job_from_model(model: queue_job::Model, payload: Payload) -> QueueResult<Job> {
    let attempts = u32::try_from(model.attempts).map_err(|_| {
        QueueError::Database(format!(
            "job {} has invalid attempts {}",
            model.id, model.attempts
        ))
    })?;

    Ok(Job {
        id: JobId(model.id),
        payload,
        category: model.category,
        attempts,
        priority: model.priority,
        reserved_at: model.reserved_at,
        available_at: model.available_at,
        created_at: model.created_at,
    })
}

impl From<queue_failure::Model> for FailureRecord {
    fn from(model: queue_failure::Model) -> Self {
        Self {
            id: model.id,
            payload: Payload::from_blob_lossy(&model.job),
            error: model.error.unwrap_or_default(),
            failed_at: model.failed_at,
        }
    }
}

#[async_trait]
impl JobStore for DatabaseStore {
    async fn push(&self, payload: &Payload, delay: Duration, category: &str) -> QueueResult<JobId> {
        let now = self.clock.now();
        let available_at = delayed_until(now, delay)?;

        let model = queue_job::ActiveModel {
            job: Set(payload.to_blob()?),
            category: Set(category.to_string()),
            attempts: Set(0),
            priority: Set(0),
            reserved_at: Set(None),
            available_at: Set(available_at),
            created_at: Set(now),
            ..Default::default()
        };

        let inserted = model.insert(&self.db).await?;
        let job_id = JobId(inserted.id);

        tracing::info!(job_id = %job_id, kind = %payload.kind, category, "Job pushed");

        Ok(job_id)
    }

    async fn pop(&self) -> QueueResult<Option<Job>> {
        let now = self.clock.now();

        let released = self.release_reserved(now).await?;
        if released > 0 {
            tracing::warn!(released, "Released stale reservations");
        }

        loop {
            let reserved = queue_job::Entity::find()
                .from_raw_sql(Statement::from_sql_and_values(
                    DbBackend::Postgres,
                    RESERVE_NEXT_SQL,
                    [Value::from(now)],
                ))
                .one(&self.db)
                .await?;

            let Some(model) = reserved else {
                return Ok(None);
            };

            let decoded = Payload::from_blob(&model.job)
                .and_then(|payload| job_from_model(model.clone(), payload));

            match decoded {
                Ok(job) => {
                    tracing::info!(job_id = %job.id, attempts = job.attempts, "Job reserved");
                    return Ok(Some(job));
                }
                // Buried rows are gone, so the next pass reserves another one
                Err(err) => self.bury(model, err).await?,
            }
        }
    }

    async fn delete(&self, id: JobId) -> QueueResult<Outcome> {
        let result = queue_job::Entity::delete_by_id(id.0).exec(&self.db).await?;
        Ok(Outcome::from_rows_affected(result.rows_affected))
    }

    async fn release(&self, job: &Job, delay: Duration) -> QueueResult<Outcome> {
        let available_at = delayed_until(self.clock.now(), delay)?;

        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                RELEASE_SQL,
                [
                    Value::from(job.payload.to_blob()?),
                    Value::from(available_at),
                    Value::from(job.id.0),
                ],
            ))
            .await?;

        let outcome = Outcome::from_rows_affected(result.rows_affected());
        if outcome.is_applied() {
            tracing::info!(job_id = %job.id, attempts = job.attempts + 1, "Job released");
        }
        Ok(outcome)
    }

    async fn fail(&self, job: &Job, failure: &JobFailure) -> QueueResult<Outcome> {
        let now = self.clock.now();
        let snapshot = job.payload.to_blob()?;

        // Record first, then delete. Either both land or neither does.
        let txn = self.db.begin().await?;

        queue_failure::ActiveModel {
            job: Set(snapshot),
            error: Set(Some(failure.to_string())),
            failed_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let deleted = queue_job::Entity::delete_by_id(job.id.0).exec(&txn).await?;
        if deleted.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(Outcome::NotFound);
        }

        txn.commit().await?;

        tracing::info!(job_id = %job.id, "Job moved to failures");

        Ok(Outcome::Applied)
    }

    async fn job_count(&self) -> QueueResult<u64> {
        Ok(queue_job::Entity::find().count(&self.db).await?)
    }

    async fn failed_job_count(&self) -> QueueResult<u64> {
        Ok(queue_failure::Entity::find().count(&self.db).await?)
    }

    async fn list_jobs(&self, category: Option<&str>, limit: u64) -> QueueResult<Vec<Job>> {
        let mut query = queue_job::Entity::find();
        if let Some(category) = category {
            query = query.filter(queue_job::Column::Category.eq(category));
        }

        let models = query
            .order_by_asc(queue_job::Column::AvailableAt)
            .order_by_asc(queue_job::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;

        // Undecodable blobs are listed as-is; `pop` is what moves them out
        let jobs = models
            .into_iter()
            .filter_map(|model| {
                let id = model.id;
                let payload = Payload::from_blob_lossy(&model.job);
                match job_from_model(model, payload) {
                    Ok(job) => Some(job),
                    Err(err) => {
                        tracing::warn!(job_id = id, error = %err, "Skipping corrupt job row");
                        None
                    }
                }
            })
            .collect();

        Ok(jobs)
    }

    async fn list_failures(&self, limit: u64) -> QueueResult<Vec<FailureRecord>> {
        let models = queue_failure::Entity::find()
            .order_by_desc(queue_failure::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(FailureRecord::from).collect())
    }
}
