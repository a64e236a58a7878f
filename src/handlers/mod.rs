pub mod common;
pub mod job;

pub use common::{clamp_limit, PaginationParams};
pub use job::{
    get_queue_stats, list_failures, list_jobs, FailureListResponse, FailureResponse,
    JobListParams, JobListResponse, JobResponse, QueueStatsResponse,
};
