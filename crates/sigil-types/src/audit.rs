//! Audit records: binding attempts and structured failure reasons
//!
//! Every explicit binding attempt — success or failure — produces exactly
//! one BindingAttempt. Failures carry one FailureReason per failing
//! dimension so the audit trail can explain every decision completely.

use crate::{ActorId, Context, StateChange, SymbolId, TemporalSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

// ── Failure Reasons ──────────────────────────────────────────────────

/// Why one gate dimension (or lifecycle check) rejected a binding.
///
/// A closed enum: every evaluator and every audit consumer is forced to
/// handle all reason kinds at compile time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FailureReason {
    /// The context actor is not in the gate's allowed set
    WhoMismatch {
        expected: BTreeSet<ActorId>,
        actual: Option<ActorId>,
        message: String,
    },
    /// The context location is not in the gate's allowed set
    WhereMismatch {
        expected: BTreeSet<String>,
        actual: String,
        message: String,
    },
    /// The temporal condition is not satisfied
    WhenMismatch {
        expected: TemporalSpec,
        actual: DateTime<Utc>,
        message: String,
    },
    /// A required state key does not hold the expected value
    StateMismatch {
        key: String,
        expected: Value,
        actual: Option<Value>,
        message: String,
    },
    /// A declared dependency has never bound
    DependencyUnmet { dependency: SymbolId, message: String },
    /// A hard `before:` deadline has permanently passed
    Expired {
        deadline: DateTime<Utc>,
        observed: DateTime<Utc>,
        message: String,
    },
    /// Re-bind refused: the one-shot instance already burned
    Consumed { symbol_id: SymbolId, message: String },
}

impl FailureReason {
    /// The aggregation category for this reason
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::WhoMismatch { .. } => FailureCategory::Who,
            Self::WhereMismatch { .. } => FailureCategory::Where,
            Self::WhenMismatch { .. } => FailureCategory::When,
            Self::StateMismatch { .. } => FailureCategory::State,
            Self::DependencyUnmet { .. } => FailureCategory::Dependency,
            Self::Expired { .. } => FailureCategory::Expired,
            Self::Consumed { .. } => FailureCategory::Consumed,
        }
    }

    /// The human-readable explanation
    pub fn message(&self) -> &str {
        match self {
            Self::WhoMismatch { message, .. }
            | Self::WhereMismatch { message, .. }
            | Self::WhenMismatch { message, .. }
            | Self::StateMismatch { message, .. }
            | Self::DependencyUnmet { message, .. }
            | Self::Expired { message, .. }
            | Self::Consumed { message, .. } => message,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Aggregation key for failure statistics
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Who,
    Where,
    When,
    State,
    Dependency,
    Expired,
    Consumed,
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Who => "who",
            Self::Where => "where",
            Self::When => "when",
            Self::State => "state",
            Self::Dependency => "dependency",
            Self::Expired => "expired",
            Self::Consumed => "consumed",
        };
        write!(f, "{}", name)
    }
}

// ── Binding Attempt ──────────────────────────────────────────────────

/// The audit record of one binding attempt, never mutated once emitted
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BindingAttempt {
    pub symbol_id: SymbolId,
    pub attempted_at: DateTime<Utc>,
    /// Exact snapshot of the evaluated context
    pub context: Context,
    pub success: bool,
    /// Activation sequence of the produced record, on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_sequence: Option<u64>,
    /// Non-empty on failure: one reason per failing dimension
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure_reasons: Vec<FailureReason>,
    /// State changes applied at the round boundary, on success with
    /// mutation application enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_changes: Option<Vec<StateChange>>,
}

impl BindingAttempt {
    /// Record a successful attempt
    pub fn succeeded(
        symbol_id: SymbolId,
        context: Context,
        bound_sequence: u64,
        state_changes: Option<Vec<StateChange>>,
    ) -> Self {
        Self {
            symbol_id,
            attempted_at: context.when,
            context,
            success: true,
            bound_sequence: Some(bound_sequence),
            failure_reasons: Vec::new(),
            state_changes,
        }
    }

    /// Record a failed attempt with its reasons
    pub fn failed(symbol_id: SymbolId, context: Context, reasons: Vec<FailureReason>) -> Self {
        Self {
            symbol_id,
            attempted_at: context.when,
            context,
            success: false,
            bound_sequence: None,
            failure_reasons: reasons,
            state_changes: None,
        }
    }
}
