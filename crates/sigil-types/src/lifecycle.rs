//! Symbol lifecycle: phases, the transition table, and the ledger
//!
//! One-shot symbols travel Latent → Bound → Archived. Reusable symbols
//! return Bound → Latent and may bind again. A hard deadline moves a
//! latent symbol to Expired. Every transition is validated and recorded
//! as a LedgerEvent.

use crate::{SigilError, SymbolId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a symbol instance sits in its lifecycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// Registered and dormant, awaiting a satisfying context
    #[default]
    Latent,
    /// Gate and dependencies satisfied; an activation record was produced
    Bound,
    /// One-shot instance burned — permanently out of eligibility
    Archived,
    /// A hard `before:` deadline passed while the symbol was latent
    Expired,
}

impl LifecyclePhase {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(self, next: LifecyclePhase) -> bool {
        matches!(
            (self, next),
            (Self::Latent, Self::Bound)
                | (Self::Latent, Self::Expired)
                | (Self::Bound, Self::Archived)
                | (Self::Bound, Self::Latent)
        )
    }

    /// Whether this phase can never bind again
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Archived | Self::Expired)
    }
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Latent => "latent",
            Self::Bound => "bound",
            Self::Archived => "archived",
            Self::Expired => "expired",
        };
        write!(f, "{}", name)
    }
}

/// One validated lifecycle transition, appended to the registry ledger
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub symbol_id: SymbolId,
    /// Absent for the registration event itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<LifecyclePhase>,
    pub to: LifecyclePhase,
    pub at: DateTime<Utc>,
    pub reason: String,
}

impl LedgerEvent {
    /// Build a transition event, rejecting illegal transitions.
    ///
    /// `from = None` records registration and is only legal into `Latent`.
    pub fn new(
        symbol_id: SymbolId,
        from: Option<LifecyclePhase>,
        to: LifecyclePhase,
        at: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Result<Self, SigilError> {
        let legal = match from {
            None => to == LifecyclePhase::Latent,
            Some(phase) => phase.can_transition_to(to),
        };
        if !legal {
            return Err(SigilError::InvalidTransition {
                symbol: symbol_id,
                from,
                to,
            });
        }
        Ok(Self {
            symbol_id,
            from,
            to,
            at,
            reason: reason.into(),
        })
    }
}
