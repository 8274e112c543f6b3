//! Persisted cursor and health state for each source.

mod models;
mod store;

pub use models::{SourceState, StateFile, STATE_FILE_VERSION};
pub use store::{JsonFileStateStore, StateStore};
