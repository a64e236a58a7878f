use std::sync::Arc;

use crate::clock::SystemClock;
use crate::config::Config;
use crate::error::QueueResult;
use crate::queue::{ConnectionRegistry, HandlerRegistry, Queue};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Name of the connection behind `queue`
    pub connection: String,
    pub queue: Queue,
}

impl AppState {
    /// Resolve the configured default connection and build the state
    pub async fn new(config: Config) -> QueueResult<Self> {
        // The admin surface only reads, so no job handlers are needed here
        let registry = ConnectionRegistry::from_config(
            &config,
            Arc::new(HandlerRegistry::new()),
            Arc::new(SystemClock),
        )
        .await?;

        let connection = registry.default_connection().to_string();
        let queue = registry.default_queue()?;

        Ok(Self {
            config,
            connection,
            queue,
        })
    }

    /// Create AppState with a custom queue (for testing)
    pub fn with_queue(config: Config, connection: impl Into<String>, queue: Queue) -> Self {
        Self {
            config,
            connection: connection.into(),
            queue,
        }
    }
}
