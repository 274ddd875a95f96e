//! Symbol registry: owns definitions and their lifecycle phases
//!
//! The registry holds symbol data; the dependency graph holds only
//! identifiers. Iteration is always in registration order, which is what
//! makes cascade evaluation deterministic.

use chrono::{DateTime, Utc};
use sigil_types::{
    ConsumptionMode, LedgerEvent, LifecyclePhase, SigilError, SigilResult, Symbol, SymbolId,
};
use std::collections::HashMap;

/// A registered symbol and its current lifecycle phase
#[derive(Clone, Debug)]
pub struct RegisteredSymbol {
    pub symbol: Symbol,
    pub phase: LifecyclePhase,
}

/// Registry of symbol definitions with lifecycle tracking
#[derive(Clone, Debug, Default)]
pub struct SymbolRegistry {
    symbols: HashMap<SymbolId, RegisteredSymbol>,
    /// Registration order — the engine's deterministic iteration order
    order: Vec<SymbolId>,
    /// Append-only record of every lifecycle transition
    ledger: Vec<LedgerEvent>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &SymbolId) -> bool {
        self.symbols.contains_key(id)
    }

    /// Insert a definition in the latent phase and record the
    /// registration event. The caller is responsible for duplicate,
    /// dependency, and cycle validation.
    pub fn insert(&mut self, symbol: Symbol, at: DateTime<Utc>) -> SigilResult<()> {
        let id = symbol.id.clone();
        let event = LedgerEvent::new(id.clone(), None, LifecyclePhase::Latent, at, "registered")?;
        self.ledger.push(event);
        self.symbols.insert(
            id.clone(),
            RegisteredSymbol {
                symbol,
                phase: LifecyclePhase::Latent,
            },
        );
        self.order.push(id);
        Ok(())
    }

    pub fn get(&self, id: &SymbolId) -> Option<&RegisteredSymbol> {
        self.symbols.get(id)
    }

    pub fn phase(&self, id: &SymbolId) -> Option<LifecyclePhase> {
        self.symbols.get(id).map(|entry| entry.phase)
    }

    /// Apply a validated lifecycle transition and append it to the ledger
    pub fn transition(
        &mut self,
        id: &SymbolId,
        to: LifecyclePhase,
        at: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> SigilResult<()> {
        let entry = self
            .symbols
            .get_mut(id)
            .ok_or_else(|| SigilError::UnknownSymbol(id.clone()))?;
        let event = LedgerEvent::new(id.clone(), Some(entry.phase), to, at, reason)?;
        entry.phase = to;
        self.ledger.push(event);
        Ok(())
    }

    /// Move a freshly bound symbol to its post-bind phase: one-shot
    /// instances archive, reusable instances re-arm.
    pub fn settle_after_bind(&mut self, id: &SymbolId, at: DateTime<Utc>) -> SigilResult<()> {
        self.transition(id, LifecyclePhase::Bound, at, "binding success")?;
        let consumption = self
            .symbols
            .get(id)
            .map(|entry| entry.symbol.consumption)
            .ok_or_else(|| SigilError::UnknownSymbol(id.clone()))?;
        match consumption {
            ConsumptionMode::OneShot => {
                self.transition(id, LifecyclePhase::Archived, at, "one-shot consumed")
            }
            ConsumptionMode::Reusable => {
                self.transition(id, LifecyclePhase::Latent, at, "reusable re-armed")
            }
        }
    }

    /// Registered symbols in registration order
    pub fn iter_in_order(&self) -> impl Iterator<Item = &RegisteredSymbol> {
        self.order.iter().filter_map(|id| self.symbols.get(id))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// The full transition ledger, in order
    pub fn ledger(&self) -> &[LedgerEvent] {
        &self.ledger
    }

    /// Ledger entries for one symbol
    pub fn ledger_for(&self, id: &SymbolId) -> Vec<&LedgerEvent> {
        self.ledger.iter().filter(|e| &e.symbol_id == id).collect()
    }
}
