//! Perspective sequencing: replaying the cascade across actors
//!
//! A context is one actor's perspective. Multi-actor scenarios run the
//! cascade once per perspective in an explicit order, carrying state
//! mutations forward — actor presence and actions live in world-state,
//! agency lives in the `who` gate.

use crate::{BindingEngine, CascadeOptions};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sigil_types::{ActorId, BoundSymbol, Context, SigilResult};
use std::collections::BTreeMap;

/// One evaluation perspective in a sequence
#[derive(Clone, Debug, PartialEq)]
pub struct Perspective {
    /// The acting/witnessing actor; absent for the system perspective
    pub who: Option<ActorId>,
    pub location: String,
    /// Overrides the sequence's base timestamp when present
    pub when: Option<DateTime<Utc>>,
}

impl Perspective {
    /// A system (omniscient) perspective
    pub fn system(location: impl Into<String>) -> Self {
        Self {
            who: None,
            location: location.into(),
            when: None,
        }
    }

    /// A specific actor's perspective
    pub fn actor(who: impl Into<ActorId>, location: impl Into<String>) -> Self {
        Self {
            who: Some(who.into()),
            location: location.into(),
            when: None,
        }
    }

    pub fn with_when(mut self, when: DateTime<Utc>) -> Self {
        self.when = Some(when);
        self
    }
}

/// Runs a cascade per perspective, carrying state forward
#[derive(Clone, Copy, Debug, Default)]
pub struct PerspectiveRunner {
    options: CascadeOptions,
}

impl PerspectiveRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: CascadeOptions) -> Self {
        self.options = options;
        self
    }

    /// Execute the cascade once per perspective, in order.
    ///
    /// Each perspective sees the state produced by the previous one.
    /// Returns every bound symbol across all perspectives plus the final
    /// state map.
    pub fn run(
        &self,
        engine: &mut BindingEngine,
        perspectives: &[Perspective],
        initial_state: BTreeMap<String, Value>,
        base_when: DateTime<Utc>,
    ) -> SigilResult<(Vec<BoundSymbol>, BTreeMap<String, Value>)> {
        let mut all_bound = Vec::new();
        let mut state = initial_state;

        for perspective in perspectives {
            let mut context = Context::new(
                perspective.when.unwrap_or(base_when),
                perspective.location.clone(),
            )
            .with_state_map(state);
            context.who = perspective.who.clone();

            let outcome = engine.bind_all_registered(&context, self.options)?;
            all_bound.extend(outcome.bound);
            state = outcome.final_context.state;
        }

        Ok((all_bound, state))
    }

    /// Timeline variant: explicit `(when, who, where)` triples
    pub fn run_timeline(
        &self,
        engine: &mut BindingEngine,
        timeline: &[(DateTime<Utc>, Option<ActorId>, String)],
        initial_state: BTreeMap<String, Value>,
    ) -> SigilResult<(Vec<BoundSymbol>, BTreeMap<String, Value>)> {
        let perspectives: Vec<Perspective> = timeline
            .iter()
            .map(|(when, who, location)| Perspective {
                who: who.clone(),
                location: location.clone(),
                when: Some(*when),
            })
            .collect();

        let base_when = timeline.first().map(|(when, _, _)| *when).unwrap_or_else(Utc::now);
        self.run(engine, &perspectives, initial_state, base_when)
    }
}
