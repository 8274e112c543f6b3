//! Common test infrastructure
//!
//! Every test gets its own fake Radarr/Sonarr instance and, when needed, its
//! own API server backed by a temporary data directory.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{FakeArr, TestServer};
//!
//! #[tokio::test]
//! async fn test_status() {
//!     let radarr = FakeArr::spawn().await;
//!     let server = TestServer::spawn_with_radarr(&radarr).await;
//!     let response = reqwest::get(format!("{}/api/status", server.base_url)).await.unwrap();
//!     assert!(response.status().is_success());
//! }
//! ```

mod constants;
mod fake_arr;
mod server;

pub use constants::*;
pub use fake_arr::{movie, episode, FakeArr};
pub use server::{reachable_url, TestServer};
