//! Management API under the reserved `/__phiremock` prefix.
//!
//! Mutations answer with the `{"result": ..., "details": [...]}` envelope;
//! list endpoints answer with bare JSON arrays. Everything here operates on
//! the shared stores and completes before its HTTP response is sent, so a
//! subsequent mock request observes the effect.

use crate::error::Error;
use crate::expectation::types::{Expectation, RequestPattern};
use crate::matching::CompiledPattern;
use crate::server::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

pub const MANAGEMENT_PREFIX: &str = "/__phiremock";

/// Standard management response envelope.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub result: &'static str,
    pub details: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl Envelope {
    pub fn ok() -> Self {
        Envelope {
            result: "OK",
            details: Vec::new(),
            id: None,
            count: None,
        }
    }

    pub fn error(details: Vec<String>) -> Self {
        Envelope {
            result: "ERROR",
            details,
            id: None,
            count: None,
        }
    }

    pub fn with_id(mut self, id: String) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ScenarioUpdate {
    scenario_name: String,
    scenario_state: String,
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"{}"))))
}

/// Turn an error into its envelope response, logging at the level the
/// taxonomy assigns to its kind.
pub fn respond_error(err: &Error) -> Response<Full<Bytes>> {
    match err {
        Error::Validation(_) => info!("{err}"),
        Error::NotFound(_) => debug!("{err}"),
        Error::Upstream(_) => warn!("{err}"),
        _ => error!("{err}"),
    }
    json_response(err.status(), &Envelope::error(err.details()))
}

/// Route a management request. `path` is the remainder after the reserved
/// prefix has been stripped.
pub async fn handle(
    method: &Method,
    path: &str,
    body: Bytes,
    state: &AppState,
) -> Response<Full<Bytes>> {
    debug!("management request: {method} {MANAGEMENT_PREFIX}{path}");
    match (method, path) {
        (&Method::GET, "/expectations") => {
            let list: Vec<Expectation> = state
                .expectations
                .list()
                .iter()
                .map(|stored| stored.expectation.clone())
                .collect();
            json_response(StatusCode::OK, &list)
        }
        (&Method::POST, "/expectations") => match parse_expectation(&body) {
            Ok(expectation) => match state.expectations.add(expectation) {
                Ok(id) => {
                    info!("expectation {id} added");
                    json_response(StatusCode::CREATED, &Envelope::ok().with_id(id))
                }
                Err(e) => respond_error(&e),
            },
            Err(e) => respond_error(&e),
        },
        (&Method::DELETE, "/expectations") => {
            state.expectations.reset();
            info!("expectations reset");
            json_response(StatusCode::OK, &Envelope::ok())
        }
        (&Method::GET, "/scenarios") => json_response(StatusCode::OK, &state.scenarios.snapshot()),
        (&Method::PUT, "/scenarios") => {
            match serde_json::from_slice::<ScenarioUpdate>(&body) {
                Ok(update) => {
                    state
                        .scenarios
                        .set(&update.scenario_name, &update.scenario_state);
                    info!(
                        "scenario {} forced to {}",
                        update.scenario_name, update.scenario_state
                    );
                    json_response(StatusCode::OK, &Envelope::ok())
                }
                Err(e) => respond_error(&Error::validation(format!(
                    "invalid scenario update: {e}"
                ))),
            }
        }
        (&Method::DELETE, "/scenarios") => {
            state.scenarios.reset_all();
            info!("scenarios reset");
            json_response(StatusCode::OK, &Envelope::ok())
        }
        (&Method::GET, "/executions") => match pattern_from_body(&body) {
            Ok(pattern) => json_response(StatusCode::OK, &state.journal.search(&pattern)),
            Err(e) => respond_error(&e),
        },
        (&Method::POST, "/executions/count") => match pattern_from_body(&body) {
            Ok(pattern) => {
                let count = state.journal.count(&pattern);
                json_response(StatusCode::OK, &Envelope::ok().with_count(count))
            }
            Err(e) => respond_error(&e),
        },
        (&Method::DELETE, "/executions") => {
            state.journal.reset();
            info!("journal reset");
            json_response(StatusCode::OK, &Envelope::ok())
        }
        (&Method::POST, "/reset") => {
            state.expectations.reset();
            state.scenarios.reset_all();
            state.journal.reset();
            info!("expectations, scenarios and journal reset");
            json_response(StatusCode::OK, &Envelope::ok())
        }
        _ => respond_error(&Error::NotFound(format!(
            "no management endpoint {method} {MANAGEMENT_PREFIX}{path}"
        ))),
    }
}

fn parse_expectation(body: &Bytes) -> Result<Expectation, Error> {
    serde_json::from_slice(body)
        .map_err(|e| Error::validation(format!("invalid expectation: {e}")))
}

/// An empty body means "match everything"; otherwise the body is a request
/// pattern with the same semantics as live matching.
fn pattern_from_body(body: &Bytes) -> Result<CompiledPattern, Error> {
    if body.is_empty() {
        return Ok(CompiledPattern::match_all());
    }
    let pattern: RequestPattern = serde_json::from_slice(body)
        .map_err(|e| Error::validation(format!("invalid request pattern: {e}")))?;
    CompiledPattern::compile(&pattern)
}
