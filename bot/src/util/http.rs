//! HTTP client construction and request headers.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};

/// User agent sent with every API request (GitHub rejects requests without one).
pub const USER_AGENT: &str = concat!("yewtubot/", env!("CARGO_PKG_VERSION"));

/// Build a shared HTTP client with a whole-request timeout.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(4)
        .build()
}

/// Build standard headers for JSON API requests.
pub fn build_headers(accept: &str, bearer: Option<&str>) -> Vec<(String, String)> {
    let mut headers = vec![
        ("Accept".to_string(), accept.to_string()),
        ("Content-Type".to_string(), "application/json".to_string()),
    ];

    if let Some(token) = bearer.filter(|t| !t.trim().is_empty()) {
        headers.push(("Authorization".to_string(), format!("Bearer {}", token.trim())));
    }

    headers
}

/// Attach headers to a request.
pub fn apply_headers(mut request: RequestBuilder, headers: &[(String, String)]) -> RequestBuilder {
    for (key, value) in headers {
        request = request.header(key.as_str(), value.as_str());
    }
    request
}
