use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::{Config, ConfigError, DATABASE_CONNECTION, MEMORY_CONNECTION, SYNC_CONNECTION};
use crate::error::{QueueError, QueueResult};
use crate::queue::{DatabaseStore, HandlerRegistry, InMemoryStore, JobStore, Queue, SyncStore};

/// Named job stores, built once at start-up and passed to whoever needs a queue
#[derive(Clone)]
pub struct ConnectionRegistry {
    stores: HashMap<String, Arc<dyn JobStore>>,
    default_connection: String,
}

impl ConnectionRegistry {
    pub fn new(default_connection: impl Into<String>) -> Self {
        Self {
            stores: HashMap::new(),
            default_connection: default_connection.into(),
        }
    }

    /// Build the standard connections from configuration.
    ///
    /// `sync` and `memory` are always available. `database` is registered when
    /// `DATABASE_URL` is set (connecting and running migrations), and is
    /// required when it is the default connection.
    pub async fn from_config(
        config: &Config,
        handlers: Arc<HandlerRegistry>,
        clock: Arc<dyn Clock>,
    ) -> QueueResult<Self> {
        let mut registry = Self::new(config.default_connection.clone());

        registry.register(
            SYNC_CONNECTION,
            Arc::new(SyncStore::with_clock(handlers, clock.clone())),
        );
        registry.register(
            MEMORY_CONNECTION,
            Arc::new(
                InMemoryStore::with_clock(clock.clone())
                    .with_reservation_timeout(config.reservation_timeout()),
            ),
        );

        if config.database_url.is_some() {
            let store = DatabaseStore::connect(config, clock).await?;
            store.migrate().await?;
            registry.register(DATABASE_CONNECTION, Arc::new(store));
        } else if config.default_connection == DATABASE_CONNECTION {
            return Err(ConfigError::Missing("DATABASE_URL").into());
        }

        tracing::info!(
            default = %registry.default_connection,
            connections = ?registry.names(),
            "Queue connections ready"
        );

        Ok(registry)
    }

    /// Add or replace a named store
    pub fn register(&mut self, name: impl Into<String>, store: Arc<dyn JobStore>) -> &mut Self {
        self.stores.insert(name.into(), store);
        self
    }

    pub fn default_connection(&self) -> &str {
        &self.default_connection
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.stores.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a queue by connection name; an empty name means the default
    pub fn resolve(&self, name: &str) -> QueueResult<Queue> {
        let name = if name.trim().is_empty() {
            self.default_connection.as_str()
        } else {
            name
        };

        self.stores
            .get(name)
            .map(|store| Queue::new(store.clone()))
            .ok_or_else(|| QueueError::UnknownConnection(name.to_string()))
    }

    pub fn default_queue(&self) -> QueueResult<Queue> {
        self.resolve("")
    }
}
