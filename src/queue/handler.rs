use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::QueueError;
use crate::queue::{Job, JobFailure};

/// Caller-supplied code for one payload kind
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Payload kind this handler accepts (matches `JobPayload::KIND`)
    fn kind(&self) -> &'static str;

    async fn handle(&self, job: &Job) -> Result<(), JobFailure>;
}

/// Handlers keyed by payload kind, shared by the worker and the sync store
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the same kind
    pub fn register<H: JobHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.insert(handler.kind(), Arc::new(handler));
        self
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(kind).cloned()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Run the handler registered for the job's kind
    pub async fn dispatch(&self, job: &Job) -> Result<(), JobFailure> {
        let handler = self
            .get(job.kind())
            .ok_or_else(|| QueueError::UnknownJobType(job.kind().to_string()))?;
        handler.handle(job).await
    }
}
