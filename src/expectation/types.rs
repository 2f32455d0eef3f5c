//! Wire data model for expectations.
//!
//! These are the serde types that travel over the management API and live in
//! `*.json` expectation files. Field names follow the Phiremock wire format
//! exactly; unknown fields are rejected so a typo in a test suite surfaces
//! as a 400 instead of a silently ignored matcher.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A tagged string predicate. Exactly one variant key is present on the wire:
/// `{"isEqualTo": "..."}`, `{"isSameString": "..."}`, `{"matches": "..."}`
/// or `{"contains": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringMatcher {
    #[serde(rename = "isEqualTo")]
    Equals(String),
    /// Case-insensitive equality (Unicode lowercase compare).
    #[serde(rename = "isSameString")]
    SameString(String),
    /// Unanchored regular expression.
    #[serde(rename = "matches")]
    Matches(String),
    #[serde(rename = "contains")]
    Contains(String),
}

/// Match criteria of an expectation. Every field is optional; an empty
/// pattern matches every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RequestPattern {
    #[serde(default)]
    pub method: Option<StringMatcher>,
    /// Applied against `path?query` when a query is present, else `path`.
    #[serde(default)]
    pub url: Option<StringMatcher>,
    /// Applied against the raw body bytes decoded as UTF-8.
    #[serde(default)]
    pub body: Option<StringMatcher>,
    /// Header names are compared case-insensitively; the matcher succeeds if
    /// any value under the name satisfies it.
    #[serde(default)]
    pub headers: Option<BTreeMap<String, StringMatcher>>,
    /// Applied to a parsed `application/x-www-form-urlencoded` body.
    #[serde(default)]
    pub form_fields: Option<BTreeMap<String, StringMatcher>>,
}

fn default_status_code() -> u16 {
    200
}

/// Static response definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResponseDef {
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub body: Option<String>,
    /// Read from disk at send time. Inline `body` wins when both are set.
    #[serde(default)]
    pub body_file_name: Option<String>,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    /// Sleep this long before emitting anything.
    #[serde(default)]
    pub delay_millis: Option<u64>,
}

impl Default for ResponseDef {
    fn default() -> Self {
        Self {
            status_code: default_status_code(),
            body: None,
            body_file_name: None,
            headers: None,
            delay_millis: None,
        }
    }
}

/// A request/response rule. `id` is assigned on insertion when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Expectation {
    #[serde(default)]
    pub id: Option<String>,
    /// Higher wins; ties break by insertion order, oldest first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub scenario_name: Option<String>,
    /// Required scenario state for this expectation to match.
    /// `"Scenario.START"` also matches a scenario that was never set.
    #[serde(default)]
    pub scenario_state_is: Option<String>,
    /// State the scenario transitions to when this expectation wins.
    #[serde(default)]
    pub new_scenario_state: Option<String>,
    #[serde(default)]
    pub request: RequestPattern,
    #[serde(default)]
    pub response: Option<ResponseDef>,
    /// Forward the original request to this URL. Ignored when `response`
    /// is also present (the static response wins).
    #[serde(default)]
    pub proxy_to: Option<String>,
}

impl Expectation {
    /// Stable id derived from the expectation content (ignoring any id the
    /// client may have sent), so the same rule always hashes the same. The
    /// pattern and response maps are sorted, so the digest does not depend
    /// on the order keys were declared in.
    pub fn content_id(&self) -> String {
        let mut stripped = self.clone();
        stripped.id = None;
        let canonical = serde_json::to_vec(&stripped).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        hex::encode(&digest[..8])
    }

    /// Structural validation beyond what serde enforces.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.response.is_none() && self.proxy_to.is_none() {
            problems.push("expectation must define a response or proxyTo".to_string());
        }
        if self.scenario_name.is_none() {
            if self.scenario_state_is.is_some() {
                problems.push("scenarioStateIs requires scenarioName".to_string());
            }
            if self.new_scenario_state.is_some() {
                problems.push("newScenarioState requires scenarioName".to_string());
            }
        }
        if let Some(def) = &self.response {
            if def.status_code < 100 {
                problems.push(format!("invalid statusCode {}", def.status_code));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(problems))
        }
    }
}
