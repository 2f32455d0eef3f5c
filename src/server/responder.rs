//! Turns a winning expectation into a concrete HTTP response.
//!
//! Pipeline: optional delay first, then either the static response (inline
//! body or body file read at send time) or the proxy leg. Static wins when
//! an expectation carries both.

use crate::expectation::store::StoredExpectation;
use crate::expectation::types::ResponseDef;
use crate::matching::MockRequest;
use crate::server::management::respond_error;
use crate::server::proxy;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::time::Duration;
use tracing::debug;

/// A fully materialized response, independent of the transport types.
#[derive(Debug)]
pub struct BuiltResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl BuiltResponse {
    pub fn into_hyper(self) -> Response<Full<Bytes>> {
        let mut builder = Response::builder().status(
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        );
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
            .body(Full::new(self.body))
            .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
    }
}

pub async fn realize(
    winner: &StoredExpectation,
    request: &MockRequest,
    proxy_client: &reqwest::Client,
) -> Response<Full<Bytes>> {
    let expectation = &winner.expectation;

    if let Some(delay) = expectation.response.as_ref().and_then(|r| r.delay_millis) {
        debug!("delaying response by {delay}ms");
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if let Some(def) = &expectation.response {
        return match build_static(def).await {
            Ok(built) => built.into_hyper(),
            Err(e) => respond_error(&e),
        };
    }

    if let Some(target) = &expectation.proxy_to {
        return match proxy::forward(proxy_client, target, request).await {
            Ok(built) => built.into_hyper(),
            Err(e) => respond_error(&e),
        };
    }

    // Unreachable for stored expectations; validation rejects this shape.
    respond_error(&crate::error::Error::Internal(
        "expectation has neither response nor proxyTo".into(),
    ))
}

async fn build_static(def: &ResponseDef) -> crate::error::Result<BuiltResponse> {
    let body = if let Some(body) = &def.body {
        Bytes::from(body.clone().into_bytes())
    } else if let Some(file) = &def.body_file_name {
        // Read at send time so the file can change between requests.
        Bytes::from(tokio::fs::read(file).await.map_err(|e| {
            crate::error::Error::Internal(format!("cannot read body file {file}: {e}"))
        })?)
    } else {
        Bytes::new()
    };
    let headers = def
        .headers
        .as_ref()
        .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    Ok(BuiltResponse {
        status: def.status_code,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectation::store::ExpectationStore;
    use crate::expectation::types::Expectation;
    use http_body_util::BodyExt;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Instant;

    fn stored(value: serde_json::Value) -> Arc<StoredExpectation> {
        let store = ExpectationStore::new();
        let expectation: Expectation = serde_json::from_value(value).unwrap();
        store.add(expectation).unwrap();
        store.list().remove(0)
    }

    fn get_request() -> MockRequest {
        MockRequest::new("GET", "/x", None, HashMap::new(), Bytes::new())
    }

    fn client() -> reqwest::Client {
        proxy::build_client(Duration::from_millis(500)).unwrap()
    }

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[tokio::test]
    async fn test_static_response_with_inline_body() {
        let winner = stored(json!({
            "request": {},
            "response": {
                "statusCode": 201,
                "body": "created",
                "headers": {"x-custom": "yes"}
            }
        }));
        let response = realize(&winner, &get_request(), &client()).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("x-custom").unwrap(), "yes");
        assert_eq!(body_string(response).await, "created");
    }

    #[tokio::test]
    async fn test_body_file_read_at_send_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.json");
        std::fs::write(&path, r#"{"from":"file"}"#).unwrap();
        let winner = stored(json!({
            "request": {},
            "response": {"bodyFileName": path.to_str().unwrap()}
        }));
        let response = realize(&winner, &get_request(), &client()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, r#"{"from":"file"}"#);
    }

    #[tokio::test]
    async fn test_missing_body_file_is_500_and_repeatable() {
        let winner = stored(json!({
            "request": {},
            "response": {"bodyFileName": "/no/such/file.json"}
        }));
        for _ in 0..2 {
            let response = realize(&winner, &get_request(), &client()).await;
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let body = body_string(response).await;
            assert!(body.contains("ERROR"), "diagnostic envelope expected: {body}");
        }
    }

    #[tokio::test]
    async fn test_inline_body_wins_over_body_file() {
        let winner = stored(json!({
            "request": {},
            "response": {"body": "inline", "bodyFileName": "/no/such/file.json"}
        }));
        let response = realize(&winner, &get_request(), &client()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "inline");
    }

    #[tokio::test]
    async fn test_static_response_wins_over_proxy() {
        let winner = stored(json!({
            "request": {},
            "response": {"body": "static"},
            "proxyTo": "http://127.0.0.1:1/unreachable"
        }));
        let response = realize(&winner, &get_request(), &client()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "static");
    }

    #[tokio::test]
    async fn test_proxy_connect_failure_is_500_envelope() {
        // Nothing listens on port 1; connect fails fast.
        let winner = stored(json!({
            "request": {},
            "proxyTo": "http://127.0.0.1:1/"
        }));
        let response = realize(&winner, &get_request(), &client()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_string(response).await;
        assert!(body.contains("ERROR"));
    }

    #[tokio::test]
    async fn test_delay_is_applied_before_sending() {
        let winner = stored(json!({
            "request": {},
            "response": {"body": "late", "delayMillis": 120}
        }));
        let start = Instant::now();
        let response = realize(&winner, &get_request(), &client()).await;
        assert!(start.elapsed() >= Duration::from_millis(120));
        assert_eq!(body_string(response).await, "late");
    }
}
