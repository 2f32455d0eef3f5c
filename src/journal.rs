//! Append-only journal of received mock requests.
//!
//! Every non-management request is recorded before matching, so the journal
//! reflects wire arrival order even for requests that end in a 404. Search
//! and count evaluate the same pattern semantics as live matching.

use crate::matching::{CompiledPattern, MockRequest};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub method: String,
    /// Path plus raw query, exactly as the url matcher sees it.
    pub url: String,
    pub headers: HashMap<String, Vec<String>>,
    pub body: String,
    pub received_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn from_request(request: &MockRequest) -> Self {
        Self {
            method: request.method().to_string(),
            url: request.url_for_match(),
            headers: request.headers().clone(),
            body: request.body_utf8().into_owned(),
            received_at: Utc::now(),
        }
    }

    /// Rebuild a matcher view of the recorded request for journal search.
    pub fn to_request(&self) -> MockRequest {
        let (path, query) = match self.url.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (self.url.clone(), None),
        };
        MockRequest::new(
            &self.method,
            path,
            query,
            self.headers.clone(),
            Bytes::from(self.body.clone().into_bytes()),
        )
    }
}

pub struct RequestJournal {
    inner: RwLock<VecDeque<Arc<JournalEntry>>>,
    /// Newest entries kept when non-zero; 0 means unbounded.
    capacity: usize,
}

impl RequestJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(VecDeque::new()),
            capacity,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    pub fn append(&self, entry: JournalEntry) {
        let mut inner = self.inner.write();
        if self.capacity > 0 && inner.len() == self.capacity {
            inner.pop_front();
        }
        inner.push_back(Arc::new(entry));
    }

    /// Entries matching a pattern, in insertion order.
    pub fn search(&self, pattern: &CompiledPattern) -> Vec<Arc<JournalEntry>> {
        let snapshot: Vec<Arc<JournalEntry>> = self.inner.read().iter().cloned().collect();
        snapshot
            .into_iter()
            .filter(|entry| pattern.matches(&entry.to_request()))
            .collect()
    }

    pub fn count(&self, pattern: &CompiledPattern) -> usize {
        self.search(pattern).len()
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
