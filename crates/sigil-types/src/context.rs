//! Contexts: immutable evaluation perspectives
//!
//! A Context is one perspective's snapshot — an optional actor, a
//! timestamp, a location, and the world-state map. Contexts are values:
//! applying a state update yields a new context and leaves the original
//! untouched, which is what lets the audit trail keep exact historical
//! snapshots.

use crate::ActorId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An immutable runtime context for binding symbols
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// The acting/witnessing perspective. Absent means the system
    /// (omniscient) perspective.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub who: Option<ActorId>,
    /// The evaluation timestamp
    pub when: DateTime<Utc>,
    /// The evaluation location
    #[serde(rename = "where")]
    pub location: String,
    /// World-state: arbitrary key → value facts
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub state: BTreeMap<String, Value>,
}

impl Context {
    /// Create a system-perspective context with empty state
    pub fn new(when: DateTime<Utc>, location: impl Into<String>) -> Self {
        Self {
            who: None,
            when,
            location: location.into(),
            state: BTreeMap::new(),
        }
    }

    pub fn with_who(mut self, who: impl Into<ActorId>) -> Self {
        self.who = Some(who.into());
        self
    }

    pub fn with_state(mut self, key: impl Into<String>, value: Value) -> Self {
        self.state.insert(key.into(), value);
        self
    }

    pub fn with_state_map(mut self, state: BTreeMap<String, Value>) -> Self {
        self.state = state;
        self
    }

    /// Return a new context with one state key updated. Pure: `self` is
    /// consumed or cloned by the caller, never mutated through a shared
    /// reference.
    pub fn with_state_update(&self, key: impl Into<String>, value: Value) -> Self {
        let mut next = self.clone();
        next.state.insert(key.into(), value);
        next
    }

    /// Look up a state value
    pub fn state_value(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn make_context() -> Context {
        Context::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(), "harbor")
            .with_who("alice")
            .with_state("tide", json!("low"))
    }

    #[test]
    fn test_with_state_update_is_pure() {
        let original = make_context();
        let updated = original.with_state_update("tide", json!("high"));

        assert_eq!(original.state_value("tide").unwrap(), &json!("low"));
        assert_eq!(updated.state_value("tide").unwrap(), &json!("high"));
        assert_eq!(original.who, updated.who);
        assert_eq!(original.when, updated.when);
    }

    #[test]
    fn test_system_perspective_has_no_actor() {
        let context = Context::new(Utc::now(), "scheduler");
        assert!(context.who.is_none());
    }

    #[test]
    fn test_serde_round_trip_with_where_key() {
        let context = make_context();
        let encoded = serde_json::to_value(&context).unwrap();
        assert_eq!(encoded.get("where").unwrap(), &json!("harbor"));

        let decoded: Context = serde_json::from_value(encoded).unwrap();
        assert_eq!(context, decoded);
    }

    #[test]
    fn test_timestamp_serializes_as_iso8601() {
        let context = make_context();
        let encoded = serde_json::to_value(&context).unwrap();
        let when = encoded.get("when").unwrap().as_str().unwrap();
        assert!(when.starts_with("2025-03-01T09:00:00"));
    }
}
