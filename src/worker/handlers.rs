use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use deferq::queue::{Job, JobFailure, JobHandler, JobPayload};

/// Writes a message to the worker log. Handy for checking a deployment end to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMessage {
    pub message: String,
}

impl JobPayload for LogMessage {
    const KIND: &'static str = "log_message";
}

pub struct LogMessageHandler;

#[async_trait]
impl JobHandler for LogMessageHandler {
    fn kind(&self) -> &'static str {
        LogMessage::KIND
    }

    async fn handle(&self, job: &Job) -> Result<(), JobFailure> {
        let task: LogMessage = job.decode()?;
        if task.message.trim().is_empty() {
            return Err(JobFailure::new("EmptyMessage", "nothing to log"));
        }

        tracing::info!(job_id = %job.id, category = %job.category, "{}", task.message);
        Ok(())
    }
}
