pub mod worker;

pub use worker::{Processed, Worker, WorkerConfig};
