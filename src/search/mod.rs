//! The search engine: candidate filtering, season reduction, round-robin
//! batching and the per-source cycle built on top of them.

mod batch;
mod cycle;
mod filter;
mod models;
mod registry;
mod seasons;
mod source;
mod strategy;
#[cfg(test)]
pub(crate) mod test_support;
mod worker;

pub use batch::{cap_batch_sizes, slice_batch};
pub use cycle::{run_cycle, CycleContext, CycleLimits, CycleOutcome, CycleReport};
pub use filter::{
    filter_episode_eligibility, filter_monitored, is_episode_eligible, parse_air_date, Monitored,
};
pub use models::{MovieUnit, QueueKind, SearchUnit, SeasonUnit, SourceKind};
pub use registry::WorkerRegistry;
pub use seasons::{dedupe_seasons, reduce_to_seasons, season_unit};
pub use source::SearchSource;
pub use strategy::{MovieStrategy, SearchStrategy, SeasonStrategy};
pub use worker::{CycleRunner, SearchWorker};
