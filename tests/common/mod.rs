//! Shared harness: run the mock server in-process on an ephemeral port.
#![allow(dead_code)]

use phiremock_server::{AppState, MockServer, ServerConfig, ShutdownHandle};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    handle: ShutdownHandle,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.shutdown();
    }
}

pub async fn start() -> TestServer {
    start_with(ServerConfig::ephemeral()).await
}

pub async fn start_with(config: ServerConfig) -> TestServer {
    let server = MockServer::bind(config).await.expect("bind test server");
    let addr = server.local_addr();
    let state = server.state();
    let handle = server.shutdown_handle();
    tokio::spawn(server.run());
    TestServer {
        addr,
        state,
        handle,
    }
}

/// Insert an expectation through the management API and return the assigned
/// id.
pub async fn add_expectation(client: &reqwest::Client, server: &TestServer, body: Value) -> String {
    let response = client
        .post(server.url("/__phiremock/expectations"))
        .json(&body)
        .send()
        .await
        .expect("POST expectation");
    assert_eq!(response.status().as_u16(), 201, "expectation insert failed");
    let envelope: Value = response.json().await.expect("envelope json");
    envelope["id"].as_str().expect("id in envelope").to_string()
}
