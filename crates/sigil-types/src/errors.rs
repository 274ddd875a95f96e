//! Error types for the sigil layer
//!
//! Gate non-satisfaction is never an error — it flows through
//! `FailureReason`. These are the structural failures: bad registrations,
//! malformed temporal expressions, illegal lifecycle transitions, and
//! sink I/O.

use crate::{LifecyclePhase, SymbolId};

/// Errors that can occur in sigil operations
#[derive(Debug, thiserror::Error)]
pub enum SigilError {
    #[error("circular dependency detected: {}", format_cycle(.path))]
    CycleDetected { path: Vec<SymbolId> },

    #[error("symbol already registered: {0}")]
    DuplicateSymbol(SymbolId),

    #[error("symbol not registered: {0}")]
    UnknownSymbol(SymbolId),

    #[error("invalid temporal expression '{expression}': {reason}")]
    InvalidTemporal { expression: String, reason: String },

    #[error("invalid lifecycle transition for '{symbol}': {from_phase} -> {to}", from_phase = format_phase(.from))]
    InvalidTransition {
        symbol: SymbolId,
        from: Option<LifecyclePhase>,
        to: LifecyclePhase,
    },

    #[error("symbol type '{symbol_type}' does not match template pattern '{pattern}'")]
    TemplateMismatch {
        symbol_type: String,
        pattern: String,
    },

    #[error("template pattern '{0}' must contain a '*' wildcard")]
    InvalidTemplatePattern(String),

    #[error("no template found for pattern '{0}'")]
    TemplateNotFound(String),

    #[error("missing required payload fields: {}", .fields.join(", "))]
    MissingPayloadFields { fields: Vec<String> },

    #[error("payload rejected by template: {0}")]
    PayloadRejected(String),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Result type alias for sigil operations
pub type SigilResult<T> = Result<T, SigilError>;

/// Errors raised by audit sinks and exporters
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("audit sink I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit sink serialization failure: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("audit sink already closed")]
    Closed,
}

fn format_cycle(path: &[SymbolId]) -> String {
    path.iter()
        .map(SymbolId::as_str)
        .collect::<Vec<_>>()
        .join(" → ")
}

fn format_phase(phase: &Option<LifecyclePhase>) -> String {
    match phase {
        Some(phase) => phase.to_string(),
        None => "created".to_string(),
    }
}
