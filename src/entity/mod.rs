pub mod queue_failure;
pub mod queue_job;

pub mod prelude;

pub use prelude::*;
