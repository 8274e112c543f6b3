//! Jobs registered with the scheduler at startup.

pub mod search_cycle;

pub use search_cycle::SearchCycleJob;
