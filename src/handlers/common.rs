use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PaginationParams {
    #[param(default = 20, minimum = 1, maximum = 100)]
    pub limit: Option<i64>,
}

/// Clamp a requested page size into 1..=100, defaulting to 20
pub fn clamp_limit(limit: Option<i64>) -> u64 {
    limit.unwrap_or(20).clamp(1, 100) as u64
}
