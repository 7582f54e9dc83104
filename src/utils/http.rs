//! HTTP Client with Connection Pooling
//!
//! Provides a global blocking HTTP client with connection pooling and
//! sane timeouts for node and delegation endpoints.

use reqwest::blocking::Client;
use std::sync::OnceLock;
use std::time::Duration;

use crate::error::{VethorError, VethorResult};

/// Global HTTP client instance - lazy initialized
static GLOBAL_CLIENT: OnceLock<Client> = OnceLock::new();

fn build_client() -> VethorResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(5)
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .user_agent("Vethor/1.0")
        .build()
        .map_err(|e| VethorError::network_error(format!("Failed to create HTTP client: {}", e)))
}

/// Get the global HTTP client
pub fn get_client() -> &'static Client {
    GLOBAL_CLIENT.get_or_init(|| {
        // Client construction only fails if TLS initialization fails, which
        // is a system-level issue the process cannot recover from.
        build_client().expect("HTTP client initialization failed - check TLS configuration")
    })
}

/// Make a GET request
pub fn get(url: &str) -> VethorResult<reqwest::blocking::Response> {
    get_client()
        .get(url)
        .send()
        .map_err(|e| VethorError::network_error(format!("GET request failed: {}", e)))
}

/// Make a POST request with a JSON body
pub fn post_json<T: serde::Serialize>(
    url: &str,
    body: &T,
) -> VethorResult<reqwest::blocking::Response> {
    get_client()
        .post(url)
        .json(body)
        .send()
        .map_err(|e| VethorError::network_error(format!("POST request failed: {}", e)))
}
