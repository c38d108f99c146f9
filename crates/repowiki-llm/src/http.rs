//! Shared HTTP transport for provider adapters
//!
//! Streaming completions can run for a very long time, so the per-call
//! ceiling is deliberately enormous — retry policies bound total time, not
//! the transport.

use std::time::Duration;

/// Redirects are followed but capped.
const MAX_REDIRECTS: usize = 5;
/// Per-call ceiling, effectively "no timeout" for streaming.
const CALL_TIMEOUT_SECS: u64 = 16_000;

pub fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .pool_max_idle_per_host(64)
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(Duration::from_secs(CALL_TIMEOUT_SECS))
        .build()
        .unwrap_or_default()
}
