//! Shared HTTP client construction.

use std::time::Duration;

use tracing::warn;

/// Default per-request timeout for engine calls.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Default connect timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Build the `reqwest::Client` shared by every engine client.
///
/// Constructed once and passed into each client; engine code never reaches
/// for a process-global handle.
pub fn build_client(request_timeout: Option<Duration>) -> reqwest::Client {
    let timeout = request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .pool_max_idle_per_host(8)
        .build()
        .unwrap_or_else(|error| {
            warn!(
                error = %error,
                "Failed to build configured HTTP client; falling back to reqwest defaults"
            );
            reqwest::Client::new()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_with_custom_timeout() {
        // Construction must not panic for any sane timeout.
        let _client = build_client(Some(Duration::from_secs(5)));
        let _client = build_client(None);
    }
}
