//! Fetcharr Library
//!
//! Automated round-robin search for Radarr and Sonarr. This library exposes
//! the internal modules for the binary and for integration tests.

pub mod arr;
pub mod background_jobs;
pub mod config;
pub mod history;
pub mod logging;
pub mod search;
pub mod server;
pub mod sqlite_persistence;
pub mod startup;
pub mod state;

// Re-export commonly used types for convenience
pub use config::{AppConfig, CliConfig, FileConfig};
pub use search::{CycleRunner, SearchWorker, SourceKind};
pub use server::{run_server, RequestsLoggingLevel};
