mod common;

use std::time::Duration;

use axum::http::StatusCode;
use deferq::queue::JobFailure;

use common::{Note, TestApp};

#[tokio::test]
async fn test_stats_on_empty_queue() {
    let app = TestApp::new();

    let response = app.server.get("/api/queue/stats").await;

    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["connection"].as_str().unwrap(), "memory");
    assert_eq!(body["jobs"].as_u64().unwrap(), 0);
    assert_eq!(body["failed_jobs"].as_u64().unwrap(), 0);
}

#[tokio::test]
async fn test_stats_counts_pending_and_failed() {
    let app = TestApp::new();
    app.queue.push(&Note::new("one")).await.unwrap();
    app.queue.push(&Note::new("two")).await.unwrap();

    let job = app.queue.pop().await.unwrap().unwrap();
    let _ = app
        .queue
        .fail(&job, &JobFailure::new("Boom", "exploded"))
        .await
        .unwrap();

    let response = app.server.get("/api/queue/stats").await;

    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["jobs"].as_u64().unwrap(), 1);
    assert_eq!(body["failed_jobs"].as_u64().unwrap(), 1);
}

#[tokio::test]
async fn test_list_jobs() {
    let app = TestApp::new();
    let job_id = app
        .queue
        .push_with(&Note::new("hello"), Duration::from_secs(30), "mail")
        .await
        .unwrap();

    let response = app.server.get("/api/queue/jobs").await;

    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["total"].as_u64().unwrap(), 1);
    assert_eq!(body["limit"].as_u64().unwrap(), 20);

    let job = &body["data"][0];
    assert_eq!(job["id"].as_i64().unwrap(), job_id.0);
    assert_eq!(job["kind"].as_str().unwrap(), "note");
    assert_eq!(job["category"].as_str().unwrap(), "mail");
    assert_eq!(job["attempts"].as_u64().unwrap(), 0);
    assert_eq!(job["data"]["body"].as_str().unwrap(), "hello");
    assert!(job["reserved_at"].is_null());
    assert_eq!(
        job["available_at"].as_str().unwrap(),
        "2024-01-01T12:00:30Z"
    );
}

#[tokio::test]
async fn test_list_jobs_filtered_by_category() {
    let app = TestApp::new();
    for category in ["mail", "images", "mail"] {
        app.queue
            .push_with(&Note::new(category), Duration::ZERO, category)
            .await
            .unwrap();
    }

    let response = app.server.get("/api/queue/jobs?category=mail").await;

    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["total"].as_u64().unwrap(), 2);
    let data = body["data"].as_array().unwrap();
    assert!(data.iter().all(|job| job["category"] == "mail"));
}

#[tokio::test]
async fn test_list_jobs_empty_category_means_all() {
    let app = TestApp::new();
    app.queue
        .push_with(&Note::new("a"), Duration::ZERO, "mail")
        .await
        .unwrap();
    app.queue.push(&Note::new("b")).await.unwrap();

    let response = app.server.get("/api/queue/jobs?category=").await;

    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["total"].as_u64().unwrap(), 2);
}

#[tokio::test]
async fn test_list_jobs_limit_is_clamped() {
    let app = TestApp::new();
    for n in 0..3 {
        app.queue.push(&Note::new(&n.to_string())).await.unwrap();
    }

    let response = app.server.get("/api/queue/jobs?limit=0").await;
    response.assert_status(StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["limit"].as_u64().unwrap(), 1);
    assert_eq!(body["total"].as_u64().unwrap(), 1);

    let response = app.server.get("/api/queue/jobs?limit=500").await;
    response.assert_status(StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["limit"].as_u64().unwrap(), 100);
    assert_eq!(body["total"].as_u64().unwrap(), 3);
}

#[tokio::test]
async fn test_list_failures() {
    let app = TestApp::new();
    app.queue.push(&Note::new("first")).await.unwrap();
    app.queue.push(&Note::new("second")).await.unwrap();

    for code in [1, 2] {
        let job = app.queue.pop().await.unwrap().unwrap();
        let failure = JobFailure::new("Boom", "exploded").with_code(code);
        let _ = app.queue.fail(&job, &failure).await.unwrap();
        app.clock.advance(Duration::from_secs(1));
    }

    let response = app.server.get("/api/queue/failures").await;

    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["total"].as_u64().unwrap(), 2);

    // Newest first
    let latest = &body["data"][0];
    assert_eq!(latest["kind"].as_str().unwrap(), "note");
    assert_eq!(latest["data"]["body"].as_str().unwrap(), "second");
    assert_eq!(latest["error"].as_str().unwrap(), "Boom : exploded (#2)");
    assert_eq!(
        latest["failed_at"].as_str().unwrap(),
        "2024-01-01T12:00:01Z"
    );
}

#[tokio::test]
async fn test_invalid_limit_is_rejected() {
    let app = TestApp::new();

    let response = app.server.get("/api/queue/failures?limit=lots").await;

    response.assert_status(StatusCode::BAD_REQUEST);
}
