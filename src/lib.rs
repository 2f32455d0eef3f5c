//! HTTP mock server core.
//!
//! Incoming requests are matched against a concurrent library of
//! expectations and answered with canned responses or proxied upstream,
//! while a journal records everything for later assertions. The management
//! API under `/__phiremock` mutates the stores while live traffic is served.

pub mod config;
pub mod error;
pub mod expectation;
pub mod journal;
pub mod matching;
pub mod scenario;
pub mod server;

pub use config::{PartialConfig, ServerConfig};
pub use error::Error;
pub use server::{AppState, MockServer, ShutdownHandle};
