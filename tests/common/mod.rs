pub mod app;
pub mod stores;

#[allow(unused_imports)]
pub use app::TestApp;
#[allow(unused_imports)]
pub use stores::{connect_database, database_store, memory_store, start_clock, Note};
