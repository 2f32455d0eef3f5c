//! Per-request entry point.
//!
//! Management traffic is routed to the management handler and never
//! journaled. Everything else is journaled first, matched against a fresh
//! store snapshot, and answered by the responder; a miss is a 404 envelope.

use crate::journal::JournalEntry;
use crate::matching::{self, MockRequest};
use crate::server::management::{self, MANAGEMENT_PREFIX};
use crate::server::{responder, AppState};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response};
use std::sync::Arc;
use tracing::{debug, warn};

pub async fn dispatch(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("failed to read request body: {e}");
            Bytes::new()
        }
    };

    let path = parts.uri.path();
    if path.starts_with(MANAGEMENT_PREFIX) {
        let rest = path
            .strip_prefix(MANAGEMENT_PREFIX)
            .unwrap_or("")
            .to_string();
        return management::handle(&parts.method, &rest, body, &state).await;
    }

    let request = MockRequest::from_parts(&parts.method, &parts.uri, &parts.headers, body);
    state.journal.append(JournalEntry::from_request(&request));

    let snapshot = state.expectations.list();
    match matching::select(&request, &snapshot, &state.scenarios) {
        None => {
            debug!(
                "no expectation matched {} {}",
                request.method(),
                request.url_for_match()
            );
            management::respond_error(&crate::error::Error::NotFound(
                "No expectation matched".into(),
            ))
        }
        Some(winner) => {
            debug!(
                "{} {} matched expectation {}",
                request.method(),
                request.url_for_match(),
                winner.expectation.id.as_deref().unwrap_or("?")
            );
            // Transition right after winner selection so any match that
            // starts later observes the new state, even while this response
            // is still sleeping in its delay.
            if let (Some(name), Some(new_state)) = (
                &winner.expectation.scenario_name,
                &winner.expectation.new_scenario_state,
            ) {
                state.scenarios.set(name, new_state);
            }
            responder::realize(&winner, &request, &state.proxy_client).await
        }
    }
}
