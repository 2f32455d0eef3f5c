//! Request snapshotting and expectation matching.

pub mod matcher;
pub mod request;

pub use matcher::{select, CompiledMatcher, CompiledPattern};
pub use request::MockRequest;
