//! Shared constants for end-to-end tests

/// API key every fake instance accepts.
pub const TEST_API_KEY: &str = "0123456789abcdef0123456789abcdef";

/// Maximum time to wait for a spawned server to answer
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Polling interval while waiting for a server
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Retry pause used by test clients so failures resolve quickly.
pub const TEST_RETRY_DELAY_MS: u64 = 10;
