//! Named scenario states for multi-step flows.
//!
//! A scenario is a string variable; expectations can gate on its current
//! state and transition it when they win a match. A scenario that was never
//! set reads as [`SCENARIO_START`], and explicitly setting it to the
//! sentinel is equivalent to never having set it.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

pub const SCENARIO_START: &str = "Scenario.START";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScenarioState {
    pub name: String,
    pub state: String,
}

#[derive(Default)]
pub struct ScenarioStore {
    inner: RwLock<HashMap<String, String>>,
}

impl ScenarioStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a scenario; missing entries read as the sentinel.
    pub fn get(&self, name: &str) -> String {
        self.inner
            .read()
            .get(name)
            .cloned()
            .unwrap_or_else(|| SCENARIO_START.to_string())
    }

    pub fn set(&self, name: &str, state: &str) {
        self.inner
            .write()
            .insert(name.to_string(), state.to_string());
    }

    pub fn reset_one(&self, name: &str) {
        self.inner.write().remove(name);
    }

    pub fn reset_all(&self) {
        self.inner.write().clear();
    }

    /// Snapshot for the management listing, sorted by name for stable output.
    pub fn snapshot(&self) -> Vec<ScenarioState> {
        let mut states: Vec<ScenarioState> = self
            .inner
            .read()
            .iter()
            .map(|(name, state)| ScenarioState {
                name: name.clone(),
                state: state.clone(),
            })
            .collect();
        states.sort_by(|a, b| a.name.cmp(&b.name));
        states
    }
}
