//! The binding engine: explicit binds and multi-round cascades
//!
//! The engine composes the registry, the dependency graph, the gate
//! evaluator, and the audit trail. Two entry points:
//!
//! - [`BindingEngine::bind`] — the explicit "try now" primitive. Always
//!   evaluates the full gate and always records exactly one audit entry,
//!   success or failure.
//! - [`BindingEngine::bind_all_registered`] — the cascade. Each round
//!   binds every eligible latent symbol against the round-start context,
//!   then applies state mutations at the round boundary, which can
//!   unlock further symbols next round. Symbols that are not yet
//!   eligible stay latent with no audit entry: latency is not failure.
//!
//! Everything iterates in registration order, so identical inputs
//! produce identical bound sequences and final contexts.

use crate::{gate, AuditSink, AuditTrail, DependencyGraph, SymbolRegistry};
use chrono::Utc;
use sigil_types::{
    BindingAttempt, BoundSymbol, Context, FailureCategory, FailureReason, LedgerEvent,
    LifecyclePhase, SigilError, SigilResult, StateChange, Symbol, SymbolId,
};
use std::collections::{BTreeMap, BTreeSet};

/// Callback invoked synchronously on every successful bind
pub type ActivationHook = Box<dyn Fn(&Symbol, &Context, &BoundSymbol) + Send>;

/// Caller-supplied weight override
pub type WeightFn = Box<dyn Fn(&Symbol, &Context) -> f64 + Send>;

// ── Cascade configuration ────────────────────────────────────────────

/// Configuration for a cascading bind
#[derive(Clone, Copy, Debug)]
pub struct CascadeOptions {
    /// Safety valve against oscillation and deadlock; a strictly acyclic
    /// dependency cascade of N symbols converges in at most N rounds
    pub max_rounds: usize,
    /// When true (default), state mutations from bound symbols are
    /// applied between rounds; when false the engine runs in analytical
    /// mode and the context never changes
    pub apply_mutations: bool,
}

impl Default for CascadeOptions {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            apply_mutations: true,
        }
    }
}

impl CascadeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Analytical mode: record mutations but never apply them
    pub fn analytical(mut self) -> Self {
        self.apply_mutations = false;
        self
    }
}

/// Per-round observability: how many symbols were eligible (and bound)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundSummary {
    /// Zero-based round index
    pub round: usize,
    /// Size of the eligible-set batch this round
    pub eligible: usize,
}

/// The result of one cascading bind
#[derive(Debug)]
pub struct CascadeOutcome {
    /// Every activation produced, in bind order
    pub bound: Vec<BoundSymbol>,
    /// The context after all applied mutations (equal to the input when
    /// mutation application was disabled)
    pub final_context: Context,
    /// One summary per executed round
    pub rounds: Vec<RoundSummary>,
}

impl CascadeOutcome {
    /// Collapse into the (bound, final context) pair
    pub fn into_pair(self) -> (Vec<BoundSymbol>, Context) {
        (self.bound, self.final_context)
    }
}

// ── Binding Engine ───────────────────────────────────────────────────

/// Engine managing latent symbols and binding them against contexts
pub struct BindingEngine {
    registry: SymbolRegistry,
    graph: DependencyGraph,
    /// Every identifier that has bound at least once — dependency checks
    /// are set-membership against this, regardless of consumption mode
    activated: BTreeSet<SymbolId>,
    audit: AuditTrail,
    sink: Option<Box<dyn AuditSink>>,
    activation_hook: Option<ActivationHook>,
    weight_fn: Option<WeightFn>,
    next_sequence: u64,
}

impl BindingEngine {
    pub fn new() -> Self {
        Self {
            registry: SymbolRegistry::new(),
            graph: DependencyGraph::new(),
            activated: BTreeSet::new(),
            audit: AuditTrail::new(),
            sink: None,
            activation_hook: None,
            weight_fn: None,
            next_sequence: 0,
        }
    }

    /// Attach an audit sink. Every attempt is written at most once; the
    /// sink is flushed and closed when the engine session ends.
    pub fn with_sink(mut self, sink: impl AuditSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Attach a callback invoked on every successful bind. The hook
    /// receives shared references only — it cannot mutate engine state.
    pub fn with_activation_hook(
        mut self,
        hook: impl Fn(&Symbol, &Context, &BoundSymbol) + Send + 'static,
    ) -> Self {
        self.activation_hook = Some(Box::new(hook));
        self
    }

    /// Override the default weight calculation
    pub fn with_weight_fn(
        mut self,
        weight_fn: impl Fn(&Symbol, &Context) -> f64 + Send + 'static,
    ) -> Self {
        self.weight_fn = Some(Box::new(weight_fn));
        self
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Register a symbol definition.
    ///
    /// Rejects duplicate identifiers and dependency cycles; a cycle
    /// rolls back atomically and the error carries the full path.
    /// Dependencies may reference symbols registered later — an edge to
    /// an identifier that never registers simply never satisfies.
    pub fn register(&mut self, symbol: Symbol) -> SigilResult<()> {
        if self.registry.contains(&symbol.id) {
            return Err(SigilError::DuplicateSymbol(symbol.id.clone()));
        }

        self.graph.add(&symbol.id, &symbol.depends_on)?;
        let id = symbol.id.clone();
        self.registry.insert(symbol, Utc::now())?;

        tracing::info!(symbol_id = %id, "symbol registered");
        Ok(())
    }

    // ── Explicit bind ────────────────────────────────────────────────

    /// Attempt to bind one symbol against a context.
    ///
    /// Always appends exactly one audit entry. Returns `Ok(None)` when
    /// the gate, dependencies, or lifecycle refuse the binding — that is
    /// a normal outcome, not an error. An archived one-shot records a
    /// `Consumed` failure, distinct from any gate mismatch.
    pub fn bind(&mut self, id: &SymbolId, context: &Context) -> SigilResult<Option<BoundSymbol>> {
        let entry = self
            .registry
            .get(id)
            .ok_or_else(|| SigilError::UnknownSymbol(id.clone()))?;
        let symbol = entry.symbol.clone();
        let phase = entry.phase;

        if phase == LifecyclePhase::Archived {
            let reasons = vec![FailureReason::Consumed {
                symbol_id: id.clone(),
                message: format!("one-shot symbol '{}' already consumed", id),
            }];
            self.record_attempt(BindingAttempt::failed(id.clone(), context.clone(), reasons))?;
            tracing::debug!(symbol_id = %id, "re-bind refused: already consumed");
            return Ok(None);
        }

        let mut reasons = Vec::new();
        let unmet: Vec<SymbolId> = self
            .graph
            .unmet_dependencies(id, &self.activated)
            .into_iter()
            .cloned()
            .collect();
        for dependency in unmet {
            reasons.push(FailureReason::DependencyUnmet {
                message: format!("dependency '{}' not yet activated", dependency),
                dependency,
            });
        }

        let expired = gate::check_expired(&symbol.gate, context);
        let deadline_passed = expired.is_some();
        reasons.extend(expired);
        reasons.extend(gate::evaluate(&symbol.gate, context));

        if !reasons.is_empty() {
            let reason_count = reasons.len();
            self.record_attempt(BindingAttempt::failed(id.clone(), context.clone(), reasons))?;
            if deadline_passed && phase == LifecyclePhase::Latent {
                self.registry
                    .transition(id, LifecyclePhase::Expired, context.when, "deadline passed")?;
            }
            tracing::debug!(symbol_id = %id, reasons = reason_count, "binding attempt failed");
            return Ok(None);
        }

        let bound = self.seal_binding(&symbol, context, None)?;
        Ok(Some(bound))
    }

    // ── Cascading bind ───────────────────────────────────────────────

    /// Bind all registered symbols in a multi-round cascade.
    ///
    /// Per round, the eligible set is every latent symbol whose
    /// dependencies are satisfied and whose gate passes against the
    /// round-start context; a symbol waiting on an absolute `after:`
    /// instant still in the future is excluded without an audit entry.
    /// Every eligible symbol binds; mutations apply at the round
    /// boundary in bind order, last write wins. The cascade stops on an
    /// empty eligible set or at the round limit.
    pub fn bind_all_registered(
        &mut self,
        context: &Context,
        options: CascadeOptions,
    ) -> SigilResult<CascadeOutcome> {
        let mut current = context.clone();
        let mut bound_all = Vec::new();
        let mut rounds = Vec::new();

        for round in 0..options.max_rounds {
            let round_context = current.clone();
            let eligible: Vec<Symbol> = self
                .registry
                .iter_in_order()
                .filter(|entry| entry.phase == LifecyclePhase::Latent)
                .filter(|entry| {
                    self.graph
                        .dependencies_satisfied(&entry.symbol.id, &self.activated)
                })
                .filter(|entry| !gate::awaiting_future_open(&entry.symbol.gate, &round_context))
                .filter(|entry| gate::passes(&entry.symbol.gate, &round_context))
                .map(|entry| entry.symbol.clone())
                .collect();

            if eligible.is_empty() {
                tracing::debug!(round, "cascade stopped: no eligible symbols");
                break;
            }
            rounds.push(RoundSummary {
                round,
                eligible: eligible.len(),
            });

            for symbol in &eligible {
                let changes = if options.apply_mutations {
                    symbol.state_mutation().map(|mutation| {
                        let mut changes = Vec::with_capacity(mutation.len());
                        for (key, value) in mutation {
                            changes.push(StateChange {
                                key: key.clone(),
                                old_value: current.state_value(key).cloned(),
                                new_value: value.clone(),
                            });
                            current = current.with_state_update(key.clone(), value.clone());
                        }
                        changes
                    })
                } else {
                    None
                };

                let bound = self.seal_binding(symbol, &round_context, changes)?;
                bound_all.push(bound);
            }

            tracing::debug!(
                round,
                bound = eligible.len(),
                "cascade round complete"
            );
        }

        Ok(CascadeOutcome {
            bound: bound_all,
            final_context: current,
            rounds,
        })
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Finalize one successful binding: assign the activation sequence,
    /// advance lifecycle state, record the audit entry, fire the hook.
    fn seal_binding(
        &mut self,
        symbol: &Symbol,
        context: &Context,
        state_changes: Option<Vec<StateChange>>,
    ) -> SigilResult<BoundSymbol> {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let weight = self.resolve_weight(symbol, context);
        let mut bound = BoundSymbol::new(
            sequence,
            symbol.id.clone(),
            symbol.symbol_type.clone(),
            symbol.payload.clone(),
            weight,
            context.clone(),
        );
        bound.state_changes = state_changes.clone();

        self.activated.insert(symbol.id.clone());
        self.registry.settle_after_bind(&symbol.id, context.when)?;
        self.record_attempt(BindingAttempt::succeeded(
            symbol.id.clone(),
            context.clone(),
            sequence,
            state_changes,
        ))?;
        tracing::info!(symbol_id = %symbol.id, sequence, "symbol bound");

        if let Some(hook) = &self.activation_hook {
            hook(symbol, context, &bound);
        }
        Ok(bound)
    }

    fn resolve_weight(&self, symbol: &Symbol, context: &Context) -> f64 {
        if let Some(weight_fn) = &self.weight_fn {
            return weight_fn(symbol, context);
        }
        symbol.weight_hint().unwrap_or(1.0)
    }

    /// Append to the trail, then forward the same record to the sink —
    /// at most one write per attempt.
    fn record_attempt(&mut self, attempt: BindingAttempt) -> SigilResult<()> {
        self.audit.record(attempt);
        if let Some(sink) = self.sink.as_mut() {
            if let Some(recorded) = self.audit.trail().last() {
                sink.write(recorded)?;
            }
        }
        Ok(())
    }

    // ── Session end ──────────────────────────────────────────────────

    /// Flush buffered sink writes; failures surface to the caller
    pub fn flush(&mut self) -> SigilResult<()> {
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    /// Flush and close the sink. Idempotent; after this the engine keeps
    /// working but no further attempts reach the sink.
    pub fn close(&mut self) -> SigilResult<()> {
        if let Some(mut sink) = self.sink.take() {
            sink.close()?;
        }
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// The audit trail
    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Full ordered trail of binding attempts
    pub fn trail(&self) -> &[BindingAttempt] {
        self.audit.trail()
    }

    /// Failed attempts for one symbol
    pub fn failed(&self, id: &SymbolId) -> Vec<&BindingAttempt> {
        self.audit.failed(id)
    }

    /// Human-readable explanation of a symbol's latest attempt
    pub fn explain(&self, id: &SymbolId) -> String {
        self.audit.explain(id)
    }

    /// Aggregate failure counts by category
    pub fn stats(&self) -> BTreeMap<FailureCategory, usize> {
        self.audit.stats()
    }

    /// The lifecycle transition ledger
    pub fn ledger(&self) -> &[LedgerEvent] {
        self.registry.ledger()
    }

    /// Ledger entries for one symbol
    pub fn ledger_for(&self, id: &SymbolId) -> Vec<&LedgerEvent> {
        self.registry.ledger_for(id)
    }

    /// Identifiers that have bound at least once this engine session
    pub fn activated(&self) -> &BTreeSet<SymbolId> {
        &self.activated
    }

    /// Current lifecycle phase of a registered symbol
    pub fn phase(&self, id: &SymbolId) -> Option<LifecyclePhase> {
        self.registry.phase(id)
    }

    /// A registered symbol definition
    pub fn symbol(&self, id: &SymbolId) -> Option<&Symbol> {
        self.registry.get(id).map(|entry| &entry.symbol)
    }

    /// Number of registered symbols
    pub fn symbol_count(&self) -> usize {
        self.registry.len()
    }
}

impl Default for BindingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BindingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingEngine")
            .field("symbols", &self.registry.len())
            .field("activated", &self.activated.len())
            .field("attempts", &self.audit.len())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl Drop for BindingEngine {
    fn drop(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(error) = sink.close() {
                tracing::warn!(%error, "audit sink close failed at session end");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;
    use sigil_types::{ConsumptionMode, GateCondition, TemporalSpec};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn make_engine() -> BindingEngine {
        BindingEngine::new()
    }

    fn make_symbol(id: &str, gate: GateCondition) -> Symbol {
        Symbol::new(id, "TEST:symbol", gate)
    }

    #[test]
    fn test_register_duplicate_rejected() {
        let mut engine = make_engine();
        engine
            .register(make_symbol("a", GateCondition::open()))
            .unwrap();
        let result = engine.register(make_symbol("a", GateCondition::open()));
        assert!(matches!(result, Err(SigilError::DuplicateSymbol(_))));
        assert_eq!(engine.symbol_count(), 1);
    }

    #[test]
    fn test_register_cycle_reports_literal_path() {
        // Scenario: a → b → c → a, each depending on the next in line;
        // the third registration closes the loop.
        let mut engine = make_engine();
        engine
            .register(make_symbol("a", GateCondition::open()).with_dependency("b"))
            .unwrap();
        engine
            .register(make_symbol("b", GateCondition::open()).with_dependency("c"))
            .unwrap();
        let err = engine
            .register(make_symbol("c", GateCondition::open()).with_dependency("a"))
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "circular dependency detected: a → b → c → a"
        );
        // Atomic rollback: the registry is untouched and still usable.
        assert_eq!(engine.symbol_count(), 2);
        engine
            .register(make_symbol("c", GateCondition::open()))
            .unwrap();
    }

    #[test]
    fn test_bind_unknown_symbol_is_an_error() {
        let mut engine = make_engine();
        let result = engine.bind(&SymbolId::new("ghost"), &Context::new(noon(), "lab"));
        assert!(matches!(result, Err(SigilError::UnknownSymbol(_))));
    }

    #[test]
    fn test_where_mismatch_is_explained() {
        // Scenario A: gate requires the beach, context is in the forest.
        let mut engine = make_engine();
        engine
            .register(make_symbol(
                "S1",
                GateCondition::open().with_location(["beach"]),
            ))
            .unwrap();

        let context = Context::new(noon(), "forest");
        let result = engine.bind(&SymbolId::new("S1"), &context).unwrap();
        assert!(result.is_none());

        let explanation = engine.explain(&SymbolId::new("S1"));
        assert!(explanation.contains("where: 'forest' not in {beach}"));
        assert_eq!(engine.failed(&SymbolId::new("S1")).len(), 1);
    }

    #[test]
    fn test_explicit_bind_success_records_audit_and_lifecycle() {
        let mut engine = make_engine();
        engine
            .register(make_symbol("a", GateCondition::open()))
            .unwrap();

        let context = Context::new(noon(), "lab");
        let bound = engine.bind(&SymbolId::new("a"), &context).unwrap().unwrap();
        assert_eq!(bound.sequence, 0);
        assert_eq!(bound.weight, 1.0);
        assert_eq!(bound.context, context);

        assert_eq!(engine.trail().len(), 1);
        assert!(engine.trail()[0].success);
        assert_eq!(engine.phase(&SymbolId::new("a")), Some(LifecyclePhase::Archived));
        assert!(engine.activated().contains(&SymbolId::new("a")));
    }

    #[test]
    fn test_one_shot_rebind_records_consumed() {
        let mut engine = make_engine();
        engine
            .register(make_symbol("ticket", GateCondition::open()))
            .unwrap();

        let context = Context::new(noon(), "gate");
        assert!(engine.bind(&SymbolId::new("ticket"), &context).unwrap().is_some());
        assert!(engine.bind(&SymbolId::new("ticket"), &context).unwrap().is_none());

        let failures = engine.failed(&SymbolId::new("ticket"));
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].failure_reasons[0].category(),
            FailureCategory::Consumed
        );
    }

    #[test]
    fn test_unmet_dependency_failure_on_explicit_bind() {
        let mut engine = make_engine();
        engine
            .register(make_symbol("base", GateCondition::open()))
            .unwrap();
        engine
            .register(make_symbol("tower", GateCondition::open()).with_dependency("base"))
            .unwrap();

        let context = Context::new(noon(), "site");
        assert!(engine.bind(&SymbolId::new("tower"), &context).unwrap().is_none());

        let stats = engine.stats();
        assert_eq!(stats.get(&FailureCategory::Dependency), Some(&1));
    }

    #[test]
    fn test_expired_symbol_transitions_and_reports() {
        let mut engine = make_engine();
        let deadline = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        engine
            .register(make_symbol(
                "offer",
                GateCondition::open().with_when(TemporalSpec::Before(deadline)),
            ))
            .unwrap();

        let context = Context::new(noon(), "shop");
        assert!(engine.bind(&SymbolId::new("offer"), &context).unwrap().is_none());

        assert_eq!(engine.phase(&SymbolId::new("offer")), Some(LifecyclePhase::Expired));
        let categories: Vec<FailureCategory> = engine.failed(&SymbolId::new("offer"))[0]
            .failure_reasons
            .iter()
            .map(|r| r.category())
            .collect();
        assert!(categories.contains(&FailureCategory::Expired));
        assert!(categories.contains(&FailureCategory::When));
    }

    #[test]
    fn test_cascade_state_chain_binds_across_two_rounds() {
        // Scenario B: pick_up_key unlocks unlock_door via a state mutation.
        let mut engine = make_engine();
        engine
            .register(
                make_symbol("pick_up_key", GateCondition::open())
                    .with_state_mutation("has_key", json!(true)),
            )
            .unwrap();
        engine
            .register(make_symbol(
                "unlock_door",
                GateCondition::open().with_state("has_key", json!(true)),
            ))
            .unwrap();

        let context = Context::new(noon(), "room").with_state("has_key", json!(false));
        let outcome = engine
            .bind_all_registered(&context, CascadeOptions::default())
            .unwrap();

        let bound_ids: Vec<&str> = outcome.bound.iter().map(|b| b.symbol_id.as_str()).collect();
        assert_eq!(bound_ids, vec!["pick_up_key", "unlock_door"]);
        assert_eq!(outcome.rounds.len(), 2);
        assert_eq!(outcome.rounds[0], RoundSummary { round: 0, eligible: 1 });
        assert_eq!(outcome.rounds[1], RoundSummary { round: 1, eligible: 1 });
        assert_eq!(
            outcome.final_context.state_value("has_key"),
            Some(&json!(true))
        );

        // The applied change is on the bound record and its audit entry.
        let change = &outcome.bound[0].state_changes.as_ref().unwrap()[0];
        assert_eq!(change.key, "has_key");
        assert_eq!(change.old_value, Some(json!(false)));
        assert_eq!(change.new_value, json!(true));

        let audit_entry = engine
            .trail()
            .iter()
            .find(|a| a.symbol_id.as_str() == "pick_up_key")
            .unwrap();
        assert_eq!(audit_entry.state_changes.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_cascade_latency_is_not_failure() {
        let mut engine = make_engine();
        engine
            .register(make_symbol("a", GateCondition::open().with_who(["alice"])))
            .unwrap();
        engine
            .register(
                make_symbol("b", GateCondition::open().with_who(["bob"])).with_dependency("a"),
            )
            .unwrap();
        engine
            .register(make_symbol("c", GateCondition::open()).with_dependency("b"))
            .unwrap();

        let context = Context::new(noon(), "office").with_who("alice");
        let outcome = engine
            .bind_all_registered(&context, CascadeOptions::default())
            .unwrap();

        let bound_ids: Vec<&str> = outcome.bound.iter().map(|b| b.symbol_id.as_str()).collect();
        assert_eq!(bound_ids, vec!["a"]);

        // b and c stayed latent: no audit entries at all.
        let attempted: Vec<&str> = engine.trail().iter().map(|a| a.symbol_id.as_str()).collect();
        assert_eq!(attempted, vec!["a"]);
        assert_eq!(engine.phase(&SymbolId::new("b")), Some(LifecyclePhase::Latent));
        assert_eq!(engine.phase(&SymbolId::new("c")), Some(LifecyclePhase::Latent));
    }

    #[test]
    fn test_cascade_future_deadline_stays_latent() {
        let mut engine = make_engine();
        let future = Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap();
        let past = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        engine
            .register(make_symbol(
                "scheduled_2099",
                GateCondition::open().with_when(TemporalSpec::After(future)),
            ))
            .unwrap();
        engine
            .register(make_symbol(
                "scheduled_2020",
                GateCondition::open().with_when(TemporalSpec::After(past)),
            ))
            .unwrap();

        let outcome = engine
            .bind_all_registered(&Context::new(noon(), "scheduler"), CascadeOptions::default())
            .unwrap();

        let bound_ids: Vec<&str> = outcome.bound.iter().map(|b| b.symbol_id.as_str()).collect();
        assert_eq!(bound_ids, vec!["scheduled_2020"]);
        assert!(engine.trail().iter().all(|a| a.symbol_id.as_str() != "scheduled_2099"));
    }

    #[test]
    fn test_cascade_oscillation_stops_at_round_limit() {
        // Scenario D: two reusable symbols toggling a shared flag.
        let mut engine = make_engine();
        engine
            .register(
                make_symbol(
                    "toggle_on",
                    GateCondition::open().with_state("flag", json!(false)),
                )
                .with_state_mutation("flag", json!(true))
                .reusable(),
            )
            .unwrap();
        engine
            .register(
                make_symbol(
                    "toggle_off",
                    GateCondition::open().with_state("flag", json!(true)),
                )
                .with_state_mutation("flag", json!(false))
                .reusable(),
            )
            .unwrap();

        let context = Context::new(noon(), "circuit").with_state("flag", json!(false));
        let outcome = engine
            .bind_all_registered(&context, CascadeOptions::default().with_max_rounds(10))
            .unwrap();

        assert_eq!(outcome.bound.len(), 10);
        assert_eq!(outcome.rounds.len(), 10);
        for (index, bound) in outcome.bound.iter().enumerate() {
            let expected = if index % 2 == 0 { "toggle_on" } else { "toggle_off" };
            assert_eq!(bound.symbol_id.as_str(), expected);
        }
        assert_eq!(
            outcome.final_context.state_value("flag"),
            Some(&json!(false))
        );
    }

    #[test]
    fn test_cascade_one_shot_binds_at_most_once_across_cascades() {
        let mut engine = make_engine();
        engine
            .register(make_symbol("once", GateCondition::open()))
            .unwrap();

        let context = Context::new(noon(), "lab");
        let first = engine
            .bind_all_registered(&context, CascadeOptions::default())
            .unwrap();
        let second = engine
            .bind_all_registered(&context, CascadeOptions::default())
            .unwrap();

        assert_eq!(first.bound.len(), 1);
        assert!(second.bound.is_empty());
    }

    #[test]
    fn test_cascade_last_write_wins_in_registration_order() {
        let mut engine = make_engine();
        engine
            .register(
                make_symbol("set_health_100", GateCondition::open())
                    .with_state_mutation("health", json!(100)),
            )
            .unwrap();
        engine
            .register(
                make_symbol("set_health_50", GateCondition::open())
                    .with_state_mutation("health", json!(50)),
            )
            .unwrap();

        let outcome = engine
            .bind_all_registered(&Context::new(noon(), "arena"), CascadeOptions::default())
            .unwrap();

        assert_eq!(outcome.bound.len(), 2);
        assert_eq!(outcome.rounds[0].eligible, 2);
        // Later registration wins the conflict; a documented outcome.
        assert_eq!(
            outcome.final_context.state_value("health"),
            Some(&json!(50))
        );
        // The second writer observed the first one's value as old state.
        let change = &outcome.bound[1].state_changes.as_ref().unwrap()[0];
        assert_eq!(change.old_value, Some(json!(100)));
    }

    #[test]
    fn test_cascade_analytical_mode_leaves_context_untouched() {
        let mut engine = make_engine();
        engine
            .register(
                make_symbol("pick_up_key", GateCondition::open())
                    .with_state_mutation("has_key", json!(true)),
            )
            .unwrap();
        engine
            .register(make_symbol(
                "unlock_door",
                GateCondition::open().with_state("has_key", json!(true)),
            ))
            .unwrap();

        let context = Context::new(noon(), "room").with_state("has_key", json!(false));
        let outcome = engine
            .bind_all_registered(&context, CascadeOptions::default().analytical())
            .unwrap();

        let bound_ids: Vec<&str> = outcome.bound.iter().map(|b| b.symbol_id.as_str()).collect();
        assert_eq!(bound_ids, vec!["pick_up_key"]);
        assert_eq!(outcome.final_context, context);
        assert!(outcome.bound[0].state_changes.is_none());
    }

    #[test]
    fn test_determinism_two_runs_identical() {
        let build = || {
            let mut engine = make_engine();
            engine
                .register(
                    make_symbol("step_a", GateCondition::open())
                        .with_state_mutation("x", json!(1)),
                )
                .unwrap();
            engine
                .register(
                    make_symbol("step_b", GateCondition::open().with_state("x", json!(1)))
                        .with_state_mutation("y", json!(2)),
                )
                .unwrap();
            engine
                .register(
                    make_symbol("step_c", GateCondition::open().with_state("y", json!(2)))
                        .with_state_mutation("z", json!(3)),
                )
                .unwrap();
            engine
        };

        let context = Context::new(noon(), "bench");
        let first = build()
            .bind_all_registered(&context, CascadeOptions::default())
            .unwrap();
        let second = build()
            .bind_all_registered(&context, CascadeOptions::default())
            .unwrap();

        assert_eq!(first.bound, second.bound);
        assert_eq!(first.final_context, second.final_context);
        assert_eq!(first.rounds, second.rounds);
    }

    #[test]
    fn test_weight_resolution() {
        let mut engine = make_engine();
        engine
            .register(
                make_symbol("heavy", GateCondition::open()).with_payload("weight", json!(2.5)),
            )
            .unwrap();
        let bound = engine
            .bind(&SymbolId::new("heavy"), &Context::new(noon(), "lab"))
            .unwrap()
            .unwrap();
        assert_eq!(bound.weight, 2.5);

        let mut weighted = BindingEngine::new().with_weight_fn(|symbol, _| {
            if symbol.symbol_type.starts_with("TEST:") {
                0.5
            } else {
                1.0
            }
        });
        weighted
            .register(make_symbol("light", GateCondition::open()))
            .unwrap();
        let bound = weighted
            .bind(&SymbolId::new("light"), &Context::new(noon(), "lab"))
            .unwrap()
            .unwrap();
        assert_eq!(bound.weight, 0.5);
    }

    #[test]
    fn test_activation_hook_fires_per_bind() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let mut engine = BindingEngine::new().with_activation_hook(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        engine
            .register(make_symbol("a", GateCondition::open()))
            .unwrap();
        engine
            .register(make_symbol("blocked", GateCondition::open().with_who(["bob"])))
            .unwrap();

        engine
            .bind_all_registered(&Context::new(noon(), "lab"), CascadeOptions::default())
            .unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sink_receives_every_attempt_once() {
        use sigil_types::SinkError;
        use std::sync::Mutex;

        struct SharedSink(Arc<Mutex<Vec<SymbolId>>>);
        impl crate::AuditSink for SharedSink {
            fn write(&mut self, attempt: &BindingAttempt) -> Result<(), SinkError> {
                self.0.lock().unwrap().push(attempt.symbol_id.clone());
                Ok(())
            }
            fn flush(&mut self) -> Result<(), SinkError> {
                Ok(())
            }
            fn close(&mut self) -> Result<(), SinkError> {
                Ok(())
            }
        }

        let written = Arc::new(Mutex::new(Vec::new()));
        let mut engine = BindingEngine::new().with_sink(SharedSink(Arc::clone(&written)));
        engine
            .register(make_symbol("a", GateCondition::open()))
            .unwrap();
        engine
            .register(make_symbol("far", GateCondition::open().with_location(["beach"])))
            .unwrap();

        let context = Context::new(noon(), "lab");
        engine.bind(&SymbolId::new("a"), &context).unwrap();
        engine.bind(&SymbolId::new("far"), &context).unwrap();
        engine.flush().unwrap();
        engine.close().unwrap();

        // One write per attempt, in trail order — success and failure alike.
        assert_eq!(engine.trail().len(), 2);
        let written = written.lock().unwrap();
        assert_eq!(*written, vec![SymbolId::new("a"), SymbolId::new("far")]);
    }

    #[test]
    fn test_reusable_symbol_produces_distinct_records() {
        let mut engine = make_engine();
        engine
            .register(make_symbol("pulse", GateCondition::open()).reusable())
            .unwrap();

        let context = Context::new(noon(), "lab");
        let first = engine.bind(&SymbolId::new("pulse"), &context).unwrap().unwrap();
        let second = engine.bind(&SymbolId::new("pulse"), &context).unwrap().unwrap();

        assert_eq!(first.symbol_id, second.symbol_id);
        assert_ne!(first.sequence, second.sequence);
        assert_eq!(engine.phase(&SymbolId::new("pulse")), Some(LifecyclePhase::Latent));
    }

    #[test]
    fn test_consumption_mode_does_not_affect_dependency_history() {
        let mut engine = make_engine();
        engine
            .register(make_symbol("spark", GateCondition::open()))
            .unwrap();
        engine
            .register(make_symbol("fire", GateCondition::open()).with_dependency("spark"))
            .unwrap();

        let context = Context::new(noon(), "camp");
        engine.bind(&SymbolId::new("spark"), &context).unwrap();
        assert_eq!(
            engine.symbol(&SymbolId::new("spark")).unwrap().consumption,
            ConsumptionMode::OneShot
        );
        // The archived dependency still counts as satisfied.
        let bound = engine.bind(&SymbolId::new("fire"), &context).unwrap();
        assert!(bound.is_some());
    }
}
