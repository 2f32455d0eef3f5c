//! Upstream forwarding for proxied expectations.
//!
//! The original request's method, body, and headers travel upstream minus
//! hop-by-hop headers; the upstream's status, headers, and body come back
//! verbatim, again minus hop-by-hop. One attempt, bounded by the configured
//! timeout.

use crate::error::{Error, Result};
use crate::matching::MockRequest;
use crate::server::responder::BuiltResponse;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

/// Headers that describe a single hop, never forwarded in either direction.
pub const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// Build the shared upstream client: bounded idle pool, finite timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(8)
        .build()
        .map_err(|e| Error::Config(format!("cannot build proxy client: {e}")))
}

pub async fn forward(
    client: &reqwest::Client,
    target: &str,
    request: &MockRequest,
) -> Result<BuiltResponse> {
    let method = reqwest::Method::from_bytes(request.method().as_bytes())
        .map_err(|_| Error::Upstream(format!("unsupported method {}", request.method())))?;

    let mut headers = HeaderMap::new();
    for (name, values) in request.headers() {
        // Host comes from the target URL; content-length is recomputed.
        if is_hop_by_hop(name) || name == "host" || name == "content-length" {
            continue;
        }
        let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        for value in values {
            if let Ok(header_value) = HeaderValue::from_str(value) {
                headers.append(header_name.clone(), header_value);
            }
        }
    }

    let response = client
        .request(method, target)
        .headers(headers)
        .body(request.body().clone())
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                Error::Upstream(format!("proxy request to {target} timed out"))
            } else {
                Error::Upstream(format!("proxy request to {target} failed: {e}"))
            }
        })?;

    let status = response.status().as_u16();
    let mut response_headers = Vec::new();
    for (name, value) in response.headers() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        response_headers.push((
            name.as_str().to_string(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        ));
    }
    let body: Bytes = response
        .bytes()
        .await
        .map_err(|e| Error::Upstream(format!("failed to read upstream body from {target}: {e}")))?;

    Ok(BuiltResponse {
        status,
        headers: response_headers,
        body,
    })
}
