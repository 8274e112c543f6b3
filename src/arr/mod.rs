//! Clients for the Radarr and Sonarr HTTP APIs.

mod client;
mod error;
pub mod models;
mod radarr;
mod sonarr;

pub use client::{ArrClient, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT, PAGE_SIZE};
pub use error::ArrError;
pub use radarr::RadarrClient;
pub use sonarr::{SonarrApiVersion, SonarrClient};
