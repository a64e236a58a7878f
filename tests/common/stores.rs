use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::macros::datetime;
use tokio::sync::{Mutex, MutexGuard};

use deferq::clock::ManualClock;
use deferq::config::Config;
use deferq::queue::{DatabaseStore, InMemoryStore, JobPayload, JobStore};

/// Reservation timeout used by every test store
#[allow(dead_code)]
pub const RESERVATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Test payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub body: String,
}

impl JobPayload for Note {
    const KIND: &'static str = "note";
}

#[allow(dead_code)]
impl Note {
    pub fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
        }
    }
}

/// Whole-second start instant so timestamps survive Postgres round trips
pub fn start_clock() -> ManualClock {
    ManualClock::new(datetime!(2024-01-01 12:00 UTC))
}

#[allow(dead_code)]
pub fn memory_store(clock: &ManualClock) -> Arc<dyn JobStore> {
    Arc::new(
        InMemoryStore::with_clock(Arc::new(clock.clone()))
            .with_reservation_timeout(RESERVATION_TIMEOUT),
    )
}

/// Tests sharing the database tables run one at a time
fn database_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

/// Connect to `DATABASE_URL` with empty tables, or `None` when it is not set
#[allow(dead_code)]
pub async fn database_store(
    clock: &ManualClock,
) -> Option<(Arc<dyn JobStore>, MutexGuard<'static, ()>)> {
    let (store, guard) = connect_database(clock).await?;
    Some((Arc::new(store), guard))
}

/// Same as [`database_store`], keeping the concrete type for raw SQL access
#[allow(dead_code)]
pub async fn connect_database(clock: &ManualClock) -> Option<(DatabaseStore, MutexGuard<'static, ()>)> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").ok()?;

    let guard = database_lock().lock().await;

    let config = Config {
        database_url: Some(database_url),
        reservation_timeout_secs: RESERVATION_TIMEOUT.as_secs(),
        ..Config::default()
    };
    let store = DatabaseStore::connect(&config, Arc::new(clock.clone()))
        .await
        .expect("Failed to connect to test database");
    store.migrate().await.expect("Failed to run migrations");
    store.truncate().await.expect("Failed to truncate queue tables");

    Some((store, guard))
}
