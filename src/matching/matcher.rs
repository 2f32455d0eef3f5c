//! Compiled matcher forms and winner selection.
//!
//! Wire matchers (`StringMatcher`) are compiled once, when an expectation is
//! inserted or loaded, so an invalid regex is rejected up front and
//! match-time evaluation is pure and infallible.

use crate::error::{Error, Result};
use crate::expectation::store::StoredExpectation;
use crate::expectation::types::{RequestPattern, StringMatcher};
use crate::matching::request::MockRequest;
use crate::scenario::ScenarioStore;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;

/// Runtime form of a [`StringMatcher`].
#[derive(Debug, Clone)]
pub enum CompiledMatcher {
    Equals(String),
    /// Needle stored lowercased; compared against the lowercased input.
    SameString(String),
    Matches(Arc<Regex>),
    Contains(String),
}

impl CompiledMatcher {
    pub fn compile(matcher: &StringMatcher) -> Result<Self> {
        match matcher {
            StringMatcher::Equals(v) => Ok(CompiledMatcher::Equals(v.clone())),
            StringMatcher::SameString(v) => Ok(CompiledMatcher::SameString(v.to_lowercase())),
            StringMatcher::Matches(pattern) => {
                let regex = Regex::new(pattern).map_err(|e| {
                    Error::validation(format!("invalid regex '{pattern}': {e}"))
                })?;
                Ok(CompiledMatcher::Matches(Arc::new(regex)))
            }
            StringMatcher::Contains(v) => Ok(CompiledMatcher::Contains(v.clone())),
        }
    }

    /// Compile with case folding baked in, used for the request method,
    /// which matches case-insensitively regardless of matcher kind. Regex
    /// patterns are compiled case-insensitively here.
    pub fn compile_ignore_case(matcher: &StringMatcher) -> Result<Self> {
        match matcher {
            StringMatcher::Matches(pattern) => {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        Error::validation(format!("invalid regex '{pattern}': {e}"))
                    })?;
                Ok(CompiledMatcher::Matches(Arc::new(regex)))
            }
            other => Self::compile(other),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            CompiledMatcher::Equals(expected) => value == expected,
            CompiledMatcher::SameString(lowered) => value.to_lowercase() == *lowered,
            // Unanchored: the pattern may match any part of the input.
            CompiledMatcher::Matches(regex) => regex.is_match(value),
            CompiledMatcher::Contains(needle) => value.contains(needle),
        }
    }

    /// Case-folding evaluation for the request method. The `Matches` arm
    /// relies on the regex having been compiled via
    /// [`CompiledMatcher::compile_ignore_case`].
    pub fn matches_ignore_case(&self, value: &str) -> bool {
        match self {
            CompiledMatcher::Equals(expected) => value.eq_ignore_ascii_case(expected),
            CompiledMatcher::SameString(lowered) => value.to_lowercase() == *lowered,
            CompiledMatcher::Matches(regex) => regex.is_match(value),
            CompiledMatcher::Contains(needle) => {
                value.to_lowercase().contains(&needle.to_lowercase())
            }
        }
    }
}

/// Runtime form of a [`RequestPattern`]. Header and form-field names keep
/// their declaration order; header names are lowercased for lookup.
#[derive(Debug, Clone, Default)]
pub struct CompiledPattern {
    pub method: Option<CompiledMatcher>,
    pub url: Option<CompiledMatcher>,
    pub body: Option<CompiledMatcher>,
    pub headers: Vec<(String, CompiledMatcher)>,
    pub form_fields: Vec<(String, CompiledMatcher)>,
}

impl CompiledPattern {
    pub fn compile(pattern: &RequestPattern) -> Result<Self> {
        let mut compiled = CompiledPattern {
            method: pattern
                .method
                .as_ref()
                .map(CompiledMatcher::compile_ignore_case)
                .transpose()?,
            url: pattern.url.as_ref().map(CompiledMatcher::compile).transpose()?,
            body: pattern.body.as_ref().map(CompiledMatcher::compile).transpose()?,
            headers: Vec::new(),
            form_fields: Vec::new(),
        };
        if let Some(headers) = &pattern.headers {
            for (name, matcher) in headers {
                compiled
                    .headers
                    .push((name.to_lowercase(), CompiledMatcher::compile(matcher)?));
            }
        }
        if let Some(fields) = &pattern.form_fields {
            for (name, matcher) in fields {
                compiled
                    .form_fields
                    .push((name.clone(), CompiledMatcher::compile(matcher)?));
            }
        }
        Ok(compiled)
    }

    /// A pattern that matches every request.
    pub fn match_all() -> Self {
        Self::default()
    }

    /// Every declared matcher must be satisfied.
    pub fn matches(&self, request: &MockRequest) -> bool {
        if let Some(m) = &self.method {
            if !m.matches_ignore_case(request.method()) {
                return false;
            }
        }
        if let Some(m) = &self.url {
            if !m.matches(&request.url_for_match()) {
                return false;
            }
        }
        if let Some(m) = &self.body {
            if !m.matches(&request.body_utf8()) {
                return false;
            }
        }
        for (name, matcher) in &self.headers {
            let values = request.header_values(name);
            if !values.iter().any(|v| matcher.matches(v)) {
                return false;
            }
        }
        if !self.form_fields.is_empty() {
            let Some(form) = request.form_fields() else {
                return false;
            };
            for (name, matcher) in &self.form_fields {
                match form.get(name) {
                    Some(value) if matcher.matches(value) => {}
                    _ => return false,
                }
            }
        }
        true
    }
}

/// Select the winning expectation for a request from a store snapshot.
///
/// Candidates are expectations whose pattern matches and whose scenario
/// precondition holds; among them the highest priority wins, ties broken by
/// insertion order (oldest first). The snapshot is already in insertion
/// order, so keeping the first of each priority level suffices.
pub fn select(
    request: &MockRequest,
    snapshot: &[Arc<StoredExpectation>],
    scenarios: &ScenarioStore,
) -> Option<Arc<StoredExpectation>> {
    let mut winner: Option<&Arc<StoredExpectation>> = None;
    for stored in snapshot {
        if !scenario_precondition_holds(stored, scenarios) {
            continue;
        }
        if !stored.pattern.matches(request) {
            continue;
        }
        match winner {
            Some(current) if stored.expectation.priority <= current.expectation.priority => {}
            _ => winner = Some(stored),
        }
    }
    winner.cloned()
}

fn scenario_precondition_holds(stored: &StoredExpectation, scenarios: &ScenarioStore) -> bool {
    match (
        &stored.expectation.scenario_name,
        &stored.expectation.scenario_state_is,
    ) {
        (Some(name), Some(expected)) => scenarios.get(name) == *expected,
        _ => true,
    }
}
