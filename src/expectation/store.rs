//! Concurrent in-memory expectation registry.
//!
//! Readers take a cheap snapshot (a clone of the `Arc` list) under the read
//! lock and release it before matching runs, so matching never holds the
//! lock across user-visible work.

use crate::error::Result;
use crate::expectation::types::Expectation;
use crate::matching::CompiledPattern;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// An expectation as kept by the store: the wire form (with its id filled
/// in), the compiled pattern, and the insertion sequence used for
/// tie-breaking.
#[derive(Debug)]
pub struct StoredExpectation {
    pub expectation: Expectation,
    pub pattern: CompiledPattern,
    pub seq: u64,
}

#[derive(Default)]
pub struct ExpectationStore {
    inner: RwLock<Vec<Arc<StoredExpectation>>>,
    next_seq: AtomicU64,
}

impl ExpectationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate, compile, and insert an expectation. An id is assigned from
    /// the content hash when absent. Inserting an id that already exists
    /// replaces the stored expectation in place, keeping its insertion
    /// position (and so its tie-break order).
    pub fn add(&self, mut expectation: Expectation) -> Result<String> {
        expectation.validate()?;
        let pattern = CompiledPattern::compile(&expectation.request)?;
        let id = expectation
            .id
            .clone()
            .unwrap_or_else(|| expectation.content_id());
        expectation.id = Some(id.clone());

        let mut inner = self.inner.write();
        if let Some(existing) = inner
            .iter_mut()
            .find(|stored| stored.expectation.id.as_deref() == Some(id.as_str()))
        {
            let seq = existing.seq;
            *existing = Arc::new(StoredExpectation {
                expectation,
                pattern,
                seq,
            });
        } else {
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            inner.push(Arc::new(StoredExpectation {
                expectation,
                pattern,
                seq,
            }));
        }
        Ok(id)
    }

    /// Immutable snapshot in insertion order.
    pub fn list(&self) -> Vec<Arc<StoredExpectation>> {
        self.inner.read().clone()
    }

    /// Remove by id. Idempotent; returns whether anything was removed.
    pub fn delete(&self, id: &str) -> bool {
        let mut inner = self.inner.write();
        let before = inner.len();
        inner.retain(|stored| stored.expectation.id.as_deref() != Some(id));
        inner.len() != before
    }

    pub fn reset(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
