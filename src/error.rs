//! Error taxonomy for the mock server.
//!
//! Every error carries enough context to be surfaced as a management API
//! envelope; `status()` gives the HTTP status a handler should emit.

use hyper::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad input from a client: malformed JSON, unknown fields, invalid
    /// matcher patterns, missing required pieces.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// A lookup that found nothing: no expectation matched, delete of an
    /// absent resource.
    #[error("{0}")]
    NotFound(String),

    /// The upstream call of a proxied expectation failed (timeout, DNS,
    /// connect, protocol error). Single attempt, never retried.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// Server-side failure while producing a response, e.g. an unreadable
    /// body file.
    #[error("{0}")]
    Internal(String),

    /// Fatal configuration problem detected at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Could not bind the listener socket.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(vec![message.into()])
    }

    /// HTTP status this error maps to when surfaced through the API.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Upstream(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // Startup errors never travel over HTTP; 500 is a safe fallback.
            Error::Config(_) | Error::Bind { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Detail strings for the `{"result":"ERROR","details":[...]}` envelope.
    pub fn details(&self) -> Vec<String> {
        match self {
            Error::Validation(details) => details.clone(),
            other => vec![other.to_string()],
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
