use std::sync::Arc;

use axum_test::TestServer;
use deferq::build_router;
use deferq::clock::ManualClock;
use deferq::config::{Config, MEMORY_CONNECTION};
use deferq::queue::{InMemoryStore, Queue};
use deferq::state::AppState;

use super::stores::start_clock;

/// Test application wrapper
#[allow(dead_code)]
pub struct TestApp {
    pub server: TestServer,
    pub queue: Queue,
    pub clock: ManualClock,
}

#[allow(dead_code)]
impl TestApp {
    /// Create a new test application backed by an in-memory store
    pub fn new() -> Self {
        let clock = start_clock();
        let queue = Queue::new(Arc::new(InMemoryStore::with_clock(Arc::new(clock.clone()))));

        let state = AppState::with_queue(Config::default(), MEMORY_CONNECTION, queue.clone());

        let router = build_router(state);
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            queue,
            clock,
        }
    }
}
