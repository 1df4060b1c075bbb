//! The match worker: claims pending cards from the database queue and
//! drives a detached pipeline run for each.

pub mod config;
pub mod dispatcher;

pub use config::{StorageBackendConfig, WorkerConfig};
pub use dispatcher::MatchDispatcher;
