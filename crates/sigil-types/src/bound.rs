//! Bound symbols: records of successful activation
//!
//! Each activation is a new fact. A reusable symbol that binds in three
//! rounds produces three distinct BoundSymbol records, distinguished by
//! their engine-assigned sequence numbers.

use crate::{Context, SymbolId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One applied state change, recorded as an old → new triple
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub key: String,
    /// The value before the change; absent if the key did not exist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    pub new_value: Value,
}

/// A symbol that has successfully bound against a context
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundSymbol {
    /// Engine-assigned, monotonically increasing activation sequence.
    /// Unique per activation event, not per symbol.
    pub sequence: u64,
    /// The source symbol
    pub symbol_id: SymbolId,
    pub symbol_type: String,
    /// Verbatim copy of the symbol's payload
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub effect: BTreeMap<String, Value>,
    /// Activation weight (default 1.0, overridable by payload or a caller
    /// weight function)
    pub weight: f64,
    /// When the binding happened (the evaluated context's timestamp, so
    /// repeated runs stay identical)
    pub bound_at: DateTime<Utc>,
    /// Exact snapshot of the context the gate was evaluated against
    pub context: Context,
    /// State changes applied at the round boundary, when mutation
    /// application was enabled and the payload declared a mutation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_changes: Option<Vec<StateChange>>,
}

impl BoundSymbol {
    pub fn new(
        sequence: u64,
        symbol_id: SymbolId,
        symbol_type: impl Into<String>,
        effect: BTreeMap<String, Value>,
        weight: f64,
        context: Context,
    ) -> Self {
        Self {
            sequence,
            symbol_id,
            symbol_type: symbol_type.into(),
            effect,
            weight,
            bound_at: context.when,
            context,
            state_changes: None,
        }
    }
}
