use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::QueueResult;
use crate::handlers::{clamp_limit, PaginationParams};
use crate::queue::{FailureRecord, Job};
use crate::state::AppState;

// ============ Request / Response DTOs ============

/// Job listing filters
#[derive(Debug, Deserialize, IntoParams)]
pub struct JobListParams {
    /// Only jobs tagged with this category
    pub category: Option<String>,
    #[param(default = 20, minimum = 1, maximum = 100)]
    pub limit: Option<i64>,
}

/// Pending job
#[derive(Debug, Serialize, ToSchema)]
pub struct JobResponse {
    pub id: i64,
    pub kind: String,
    pub category: String,
    pub attempts: u32,
    pub priority: i16,
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    #[schema(value_type = Option<String>)]
    #[serde(with = "time::serde::rfc3339::option")]
    pub reserved_at: Option<time::OffsetDateTime>,
    #[schema(value_type = String)]
    #[serde(with = "time::serde::rfc3339")]
    pub available_at: time::OffsetDateTime,
    #[schema(value_type = String)]
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: time::OffsetDateTime,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id.0,
            kind: job.payload.kind,
            category: job.category,
            attempts: job.attempts,
            priority: job.priority,
            data: job.payload.data,
            reserved_at: job.reserved_at,
            available_at: job.available_at,
            created_at: job.created_at,
        }
    }
}

/// Job list response
#[derive(Debug, Serialize, ToSchema)]
pub struct JobListResponse {
    pub data: Vec<JobResponse>,
    pub total: u64,
    pub limit: u64,
}

/// Failure record
#[derive(Debug, Serialize, ToSchema)]
pub struct FailureResponse {
    pub id: i64,
    pub kind: String,
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    pub error: String,
    #[schema(value_type = String)]
    #[serde(with = "time::serde::rfc3339")]
    pub failed_at: time::OffsetDateTime,
}

impl From<FailureRecord> for FailureResponse {
    fn from(record: FailureRecord) -> Self {
        Self {
            id: record.id,
            kind: record.payload.kind,
            data: record.payload.data,
            error: record.error,
            failed_at: record.failed_at,
        }
    }
}

/// Failure list response
#[derive(Debug, Serialize, ToSchema)]
pub struct FailureListResponse {
    pub data: Vec<FailureResponse>,
    pub total: u64,
    pub limit: u64,
}

/// Queue statistics
#[derive(Debug, Serialize, ToSchema)]
pub struct QueueStatsResponse {
    pub connection: String,
    pub jobs: u64,
    pub failed_jobs: u64,
}

// ============ Handlers ============

/// Get pending and failed job counts
#[utoipa::path(
    get,
    path = "/api/queue/stats",
    responses(
        (status = 200, description = "Queue statistics", body = QueueStatsResponse)
    ),
    tag = "Queue"
)]
pub async fn get_queue_stats(State(state): State<AppState>) -> QueueResult<Json<QueueStatsResponse>> {
    let jobs = state.queue.job_count().await?;
    let failed_jobs = state.queue.failed_job_count().await?;

    Ok(Json(QueueStatsResponse {
        connection: state.connection.clone(),
        jobs,
        failed_jobs,
    }))
}

/// List pending jobs in selection order
#[utoipa::path(
    get,
    path = "/api/queue/jobs",
    params(
        JobListParams
    ),
    responses(
        (status = 200, description = "List of pending jobs", body = JobListResponse)
    ),
    tag = "Queue"
)]
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListParams>,
) -> QueueResult<Json<JobListResponse>> {
    let limit = clamp_limit(params.limit);
    let category = params.category.as_deref().filter(|c| !c.is_empty());

    let jobs = state.queue.list_jobs(category, limit).await?;

    let data: Vec<JobResponse> = jobs.into_iter().map(JobResponse::from).collect();
    let total = data.len() as u64;

    Ok(Json(JobListResponse { data, total, limit }))
}

/// List failure records, newest first
#[utoipa::path(
    get,
    path = "/api/queue/failures",
    params(
        PaginationParams
    ),
    responses(
        (status = 200, description = "List of failure records", body = FailureListResponse)
    ),
    tag = "Queue"
)]
pub async fn list_failures(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> QueueResult<Json<FailureListResponse>> {
    let limit = clamp_limit(params.limit);

    let failures = state.queue.list_failures(limit).await?;

    let data: Vec<FailureResponse> = failures.into_iter().map(FailureResponse::from).collect();
    let total = data.len() as u64;

    Ok(Json(FailureListResponse { data, total, limit }))
}
