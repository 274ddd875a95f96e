//! Latent symbols: portable carriers of dormant meaning
//!
//! A Symbol is an immutable activation contract. It declares a gate that
//! must be satisfied, a payload that becomes the activation effect, the
//! symbols it depends on, and whether it burns after one activation or
//! stays available for re-binding.

use crate::GateCondition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Payload key whose object value is applied to context state between
/// cascade rounds.
pub const STATE_MUTATION_KEY: &str = "state_mutation";

/// Payload key that overrides the default activation weight.
pub const WEIGHT_KEY: &str = "weight";

// ── Identifiers ──────────────────────────────────────────────────────

/// Unique identifier for a symbol within a registry
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub String);

impl SymbolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SymbolId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SymbolId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier for an actor (the `who` dimension)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ActorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ── Consumption Mode ─────────────────────────────────────────────────

/// Whether a symbol instance may bind once or repeatedly
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionMode {
    /// The ticket burns after binding — the instance is archived and can
    /// never bind again.
    #[default]
    OneShot,
    /// The instance re-arms after binding and may bind again in a later
    /// round, producing a new activation record each time.
    Reusable,
}

// ── Symbol ───────────────────────────────────────────────────────────

/// An immutable activation contract awaiting context
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    /// Unique identifier within a registry
    pub id: SymbolId,
    /// Free-form `CATEGORY:name` type tag. Not interpreted by the engine,
    /// only by template pattern matching.
    pub symbol_type: String,
    /// The activation predicate
    pub gate: GateCondition,
    /// Opaque payload, copied verbatim into the activation effect
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub payload: BTreeMap<String, Value>,
    /// Metadata — never evaluated
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    /// Symbols that must have bound at least once before this one may bind
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<SymbolId>,
    /// One-shot or reusable
    #[serde(default)]
    pub consumption: ConsumptionMode,
}

impl Symbol {
    /// Create a new one-shot symbol with an empty payload
    pub fn new(id: impl Into<SymbolId>, symbol_type: impl Into<String>, gate: GateCondition) -> Self {
        Self {
            id: id.into(),
            symbol_type: symbol_type.into(),
            gate,
            payload: BTreeMap::new(),
            metadata: BTreeMap::new(),
            depends_on: Vec::new(),
            consumption: ConsumptionMode::OneShot,
        }
    }

    pub fn with_payload(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_dependency(mut self, dependency: impl Into<SymbolId>) -> Self {
        self.depends_on.push(dependency.into());
        self
    }

    pub fn with_consumption(mut self, consumption: ConsumptionMode) -> Self {
        self.consumption = consumption;
        self
    }

    /// Mark the symbol reusable (re-arms after each activation)
    pub fn reusable(mut self) -> Self {
        self.consumption = ConsumptionMode::Reusable;
        self
    }

    /// Add one key/value pair to the payload's state-mutation sub-map
    pub fn with_state_mutation(mut self, key: impl Into<String>, value: Value) -> Self {
        let entry = self
            .payload
            .entry(STATE_MUTATION_KEY.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Value::Object(map) = entry {
            map.insert(key.into(), value);
        }
        self
    }

    /// The state-mutation sub-map, if the payload declares one
    pub fn state_mutation(&self) -> Option<&serde_json::Map<String, Value>> {
        self.payload.get(STATE_MUTATION_KEY).and_then(Value::as_object)
    }

    /// The payload's weight override, if present and numeric
    pub fn weight_hint(&self) -> Option<f64> {
        self.payload.get(WEIGHT_KEY).and_then(Value::as_f64)
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "⟦{}⟧", self.symbol_type)
    }
}
