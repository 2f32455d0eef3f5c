//! End-to-end behavior of the mock side: matching, priorities, scenarios,
//! proxying, journaling, and delays, driven over real HTTP.

mod common;

use common::{add_expectation, start, start_with};
use phiremock_server::ServerConfig;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_empty_store_yields_404_envelope() {
    let server = start().await;
    let client = reqwest::Client::new();

    let response = client.get(server.url("/anything")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"], "ERROR");
    assert_eq!(body["details"][0], "No expectation matched");
}

#[tokio::test]
async fn test_static_response() {
    let server = start().await;
    let client = reqwest::Client::new();

    add_expectation(
        &client,
        &server,
        json!({
            "request": {"method": {"isEqualTo": "get"}, "url": {"isEqualTo": "/hello"}},
            "response": {"statusCode": 200, "body": "hi"}
        }),
    )
    .await;

    let response = client.get(server.url("/hello")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "hi");

    let response = client.get(server.url("/other")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn test_response_headers_and_status_are_served() {
    let server = start().await;
    let client = reqwest::Client::new();

    add_expectation(
        &client,
        &server,
        json!({
            "request": {"url": {"isEqualTo": "/created"}},
            "response": {
                "statusCode": 201,
                "body": "{\"ok\":true}",
                "headers": {"content-type": "application/json", "x-trace": "t1"}
            }
        }),
    )
    .await;

    let response = client.get(server.url("/created")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 201);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/json"
    );
    assert_eq!(response.headers().get("x-trace").unwrap(), "t1");
}

#[tokio::test]
async fn test_higher_priority_wins() {
    let server = start().await;
    let client = reqwest::Client::new();

    add_expectation(
        &client,
        &server,
        json!({
            "priority": 1,
            "request": {"url": {"isEqualTo": "/x"}},
            "response": {"statusCode": 200, "body": "A"}
        }),
    )
    .await;
    add_expectation(
        &client,
        &server,
        json!({
            "priority": 5,
            "request": {"url": {"isEqualTo": "/x"}},
            "response": {"statusCode": 200, "body": "B"}
        }),
    )
    .await;

    let response = client.get(server.url("/x")).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "B");
}

#[tokio::test]
async fn test_scenario_transitions_step_through_states() {
    let server = start().await;
    let client = reqwest::Client::new();

    add_expectation(
        &client,
        &server,
        json!({
            "scenarioName": "S",
            "scenarioStateIs": "Scenario.START",
            "newScenarioState": "second",
            "request": {"url": {"isEqualTo": "/s"}},
            "response": {"body": "1"}
        }),
    )
    .await;
    add_expectation(
        &client,
        &server,
        json!({
            "scenarioName": "S",
            "scenarioStateIs": "second",
            "request": {"url": {"isEqualTo": "/s"}},
            "response": {"body": "2"}
        }),
    )
    .await;

    let first = client.get(server.url("/s")).send().await.unwrap();
    assert_eq!(first.text().await.unwrap(), "1");

    let second = client.get(server.url("/s")).send().await.unwrap();
    assert_eq!(second.text().await.unwrap(), "2");

    // The second expectation has no transition, so the scenario stays in
    // "second" and the first expectation's precondition no longer holds;
    // but the second expectation still matches. A third request repeats "2".
    let third = client.get(server.url("/s")).send().await.unwrap();
    assert_eq!(third.text().await.unwrap(), "2");

    // After resetting scenarios the chain starts over.
    client
        .delete(server.url("/__phiremock/scenarios"))
        .send()
        .await
        .unwrap();
    let again = client.get(server.url("/s")).send().await.unwrap();
    assert_eq!(again.text().await.unwrap(), "1");
}

#[tokio::test]
async fn test_scenario_chain_exhausts_to_404() {
    let server = start().await;
    let client = reqwest::Client::new();

    add_expectation(
        &client,
        &server,
        json!({
            "scenarioName": "T",
            "scenarioStateIs": "Scenario.START",
            "newScenarioState": "second",
            "request": {"url": {"isEqualTo": "/t"}},
            "response": {"body": "1"}
        }),
    )
    .await;
    add_expectation(
        &client,
        &server,
        json!({
            "scenarioName": "T",
            "scenarioStateIs": "second",
            "newScenarioState": "done",
            "request": {"url": {"isEqualTo": "/t"}},
            "response": {"body": "2"}
        }),
    )
    .await;

    assert_eq!(
        client
            .get(server.url("/t"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap(),
        "1"
    );
    assert_eq!(
        client
            .get(server.url("/t"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap(),
        "2"
    );
    // No expectation accepts state "done".
    assert_eq!(
        client
            .get(server.url("/t"))
            .send()
            .await
            .unwrap()
            .status()
            .as_u16(),
        404
    );
}

#[tokio::test]
async fn test_proxy_mirrors_upstream_and_forwards_headers() {
    let upstream = start().await;
    let server = start().await;
    let client = reqwest::Client::new();

    add_expectation(
        &client,
        &upstream,
        json!({
            "request": {
                "url": {"isEqualTo": "/base/"},
                "headers": {"x-test": {"isEqualTo": "abc"}}
            },
            "response": {"statusCode": 207, "body": "upstream-body"}
        }),
    )
    .await;
    add_expectation(
        &client,
        &server,
        json!({
            "request": {"url": {"isEqualTo": "/p"}},
            "proxyTo": format!("http://{}/base/", upstream.addr)
        }),
    )
    .await;

    let response = client
        .get(server.url("/p"))
        .header("x-test", "abc")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 207);
    assert_eq!(response.text().await.unwrap(), "upstream-body");
}

#[tokio::test]
async fn test_proxy_forwards_method_and_body() {
    let upstream = start().await;
    let server = start().await;
    let client = reqwest::Client::new();

    add_expectation(
        &client,
        &upstream,
        json!({
            "request": {
                "method": {"isEqualTo": "POST"},
                "url": {"isEqualTo": "/sink"},
                "body": {"contains": "payload"}
            },
            "response": {"statusCode": 202, "body": "accepted"}
        }),
    )
    .await;
    add_expectation(
        &client,
        &server,
        json!({
            "request": {"url": {"isEqualTo": "/relay"}},
            "proxyTo": format!("http://{}/sink", upstream.addr)
        }),
    )
    .await;

    let response = client
        .post(server.url("/relay"))
        .body("the payload body")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 202);
    assert_eq!(response.text().await.unwrap(), "accepted");
}

#[tokio::test]
async fn test_proxy_connect_failure_yields_500_diagnostic() {
    let server = start().await;
    let client = reqwest::Client::new();

    add_expectation(
        &client,
        &server,
        json!({
            "request": {"url": {"isEqualTo": "/broken"}},
            "proxyTo": "http://127.0.0.1:1/"
        }),
    )
    .await;

    let response = client.get(server.url("/broken")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"], "ERROR");
}

#[tokio::test]
async fn test_journal_counts_requests_by_pattern() {
    let server = start().await;
    let client = reqwest::Client::new();

    // Journaled even though nothing matches.
    client.get(server.url("/j")).send().await.unwrap();
    client.get(server.url("/j")).send().await.unwrap();
    client.get(server.url("/elsewhere")).send().await.unwrap();

    let response = client
        .post(server.url("/__phiremock/executions/count"))
        .json(&json!({"url": {"isEqualTo": "/j"}}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["count"], json!(2));
}

#[tokio::test]
async fn test_journal_preserves_arrival_order() {
    let server = start().await;
    let client = reqwest::Client::new();

    for path in ["/first", "/second", "/third"] {
        client.get(server.url(path)).send().await.unwrap();
    }

    let response = client
        .get(server.url("/__phiremock/executions"))
        .send()
        .await
        .unwrap();
    let entries: Value = response.json().await.unwrap();
    let urls: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["url"].as_str().unwrap())
        .collect();
    assert_eq!(urls, vec!["/first", "/second", "/third"]);
}

#[tokio::test]
async fn test_delay_millis_is_observed_end_to_end() {
    let server = start().await;
    let client = reqwest::Client::new();

    add_expectation(
        &client,
        &server,
        json!({
            "request": {"url": {"isEqualTo": "/slow"}},
            "response": {"body": "done", "delayMillis": 200}
        }),
    )
    .await;

    let start_time = Instant::now();
    let response = client.get(server.url("/slow")).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "done");
    assert!(
        start_time.elapsed() >= Duration::from_millis(200),
        "delay must be applied before the response is sent"
    );
}

#[tokio::test]
async fn test_missing_body_file_is_500_and_store_unchanged() {
    let server = start().await;
    let client = reqwest::Client::new();

    add_expectation(
        &client,
        &server,
        json!({
            "request": {"url": {"isEqualTo": "/file"}},
            "response": {"bodyFileName": "/no/such/phiremock-body.json"}
        }),
    )
    .await;

    for _ in 0..2 {
        let response = client.get(server.url("/file")).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 500);
    }
    assert_eq!(server.state.expectations.len(), 1);
}

#[tokio::test]
async fn test_body_file_contents_are_served() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("greeting.txt");
    std::fs::write(&path, "hello from disk").unwrap();

    let server = start().await;
    let client = reqwest::Client::new();
    add_expectation(
        &client,
        &server,
        json!({
            "request": {"url": {"isEqualTo": "/greeting"}},
            "response": {"bodyFileName": path.to_str().unwrap()}
        }),
    )
    .await;

    let response = client.get(server.url("/greeting")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "hello from disk");
}

#[tokio::test]
async fn test_form_field_matching_over_http() {
    let server = start().await;
    let client = reqwest::Client::new();

    add_expectation(
        &client,
        &server,
        json!({
            "request": {
                "method": {"isEqualTo": "POST"},
                "url": {"isEqualTo": "/login"},
                "formFields": {"user": {"isEqualTo": "jane"}}
            },
            "response": {"body": "welcome"}
        }),
    )
    .await;

    let ok = client
        .post(server.url("/login"))
        .form(&[("user", "jane"), ("pass", "s3cret")])
        .send()
        .await
        .unwrap();
    assert_eq!(ok.text().await.unwrap(), "welcome");

    let wrong = client
        .post(server.url("/login"))
        .form(&[("user", "john")])
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status().as_u16(), 404);
}

#[tokio::test]
async fn test_url_matcher_sees_query_string() {
    let server = start().await;
    let client = reqwest::Client::new();

    add_expectation(
        &client,
        &server,
        json!({
            "request": {"url": {"matches": "^/search\\?q=\\w+$"}},
            "response": {"body": "results"}
        }),
    )
    .await;

    let with_query = client
        .get(server.url("/search?q=rust"))
        .send()
        .await
        .unwrap();
    assert_eq!(with_query.text().await.unwrap(), "results");

    let without = client.get(server.url("/search")).send().await.unwrap();
    assert_eq!(without.status().as_u16(), 404);
}

#[tokio::test]
async fn test_journal_capacity_keeps_newest_entries() {
    let mut config = ServerConfig::ephemeral();
    config.journal_capacity = 2;
    let server = start_with(config).await;
    let client = reqwest::Client::new();

    for path in ["/1", "/2", "/3"] {
        client.get(server.url(path)).send().await.unwrap();
    }

    let response = client
        .get(server.url("/__phiremock/executions"))
        .send()
        .await
        .unwrap();
    let entries: Value = response.json().await.unwrap();
    let urls: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["url"].as_str().unwrap())
        .collect();
    assert_eq!(urls, vec!["/2", "/3"]);
}
