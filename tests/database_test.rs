mod common;

use std::time::Duration;

use sea_orm::{ConnectionTrait, DbBackend, Statement, Value};

use deferq::clock::{Clock, ManualClock};
use deferq::error::QueueError;
use deferq::queue::{DatabaseStore, JobFailure, JobStore, Payload, UNDECODABLE_KIND};

use common::{connect_database, start_clock, Note};

const INSERT_RAW_JOB_SQL: &str = r#"
    INSERT INTO queue_jobs (job, attempts, available_at, created_at)
    VALUES ($1, $2, $3, $3)
"#;

async fn insert_raw_job(store: &DatabaseStore, clock: &ManualClock, blob: &str, attempts: i32) {
    store
        .connection()
        .execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            INSERT_RAW_JOB_SQL,
            [
                Value::from(blob.to_string()),
                Value::from(attempts),
                Value::from(clock.now()),
            ],
        ))
        .await
        .unwrap();
}

async fn push_note(store: &DatabaseStore, body: &str) {
    let payload = Payload::encode(&Note::new(body)).unwrap();
    store.push(&payload, Duration::ZERO, "").await.unwrap();
}

#[tokio::test]
async fn test_undecodable_row_moves_to_failures() {
    let clock = start_clock();
    let Some((store, _guard)) = connect_database(&clock).await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };

    insert_raw_job(&store, &clock, "not json", 0).await;
    push_note(&store, "valid").await;

    // Listing shows the bad row without failing
    let listed = store.list_jobs(None, 10).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].kind(), UNDECODABLE_KIND);

    let job = store.pop().await.unwrap().expect("valid job behind the bad row");
    assert_eq!(job.decode::<Note>().unwrap(), Note::new("valid"));

    assert_eq!(store.job_count().await.unwrap(), 1);
    assert_eq!(store.failed_job_count().await.unwrap(), 1);

    let failures = store.list_failures(10).await.unwrap();
    assert_eq!(failures[0].payload, Payload::undecodable("not json"));
    assert!(failures[0].error.starts_with("Serialization"));

    // Nothing comes back after the sweep either
    store.delete(job.id).await.unwrap();
    clock.advance(Duration::from_secs(301));
    assert!(store.pop().await.unwrap().is_none());
    assert_eq!(store.failed_job_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_negative_attempts_row_moves_to_failures() {
    let clock = start_clock();
    let Some((store, _guard)) = connect_database(&clock).await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };

    let blob = Payload::encode(&Note::new("tampered"))
        .unwrap()
        .to_blob()
        .unwrap();
    insert_raw_job(&store, &clock, &blob, -1).await;

    // Corrupt rows are left out of listings
    assert!(store.list_jobs(None, 10).await.unwrap().is_empty());

    assert!(store.pop().await.unwrap().is_none());
    assert_eq!(store.job_count().await.unwrap(), 0);

    let failures = store.list_failures(10).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].payload.decode::<Note>().unwrap(), Note::new("tampered"));
    assert!(failures[0].error.starts_with("Database"));
}

#[tokio::test]
async fn test_failed_record_write_keeps_pending_row() {
    let clock = start_clock();
    let Some((store, _guard)) = connect_database(&clock).await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };

    push_note(&store, "unlucky").await;
    let job = store.pop().await.unwrap().unwrap();

    let db = store.connection();
    db.execute_unprepared(
        "ALTER TABLE queue_failures ADD CONSTRAINT reject_failures CHECK (false) NOT VALID",
    )
    .await
    .unwrap();

    let result = store.fail(&job, &JobFailure::new("Boom", "lost")).await;

    db.execute_unprepared("ALTER TABLE queue_failures DROP CONSTRAINT reject_failures")
        .await
        .unwrap();

    assert!(matches!(result, Err(QueueError::Database(_))));
    assert_eq!(store.job_count().await.unwrap(), 1);
    assert_eq!(store.failed_job_count().await.unwrap(), 0);

    // The reservation expires normally and the job runs again
    clock.advance(Duration::from_secs(300));
    let again = store.pop().await.unwrap().unwrap();
    assert_eq!(again.id, job.id);
    assert_eq!(again.attempts, 1);
}
