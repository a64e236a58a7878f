pub use super::queue_failure::Entity as QueueFailure;
pub use super::queue_job::Entity as QueueJob;
