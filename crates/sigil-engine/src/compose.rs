//! Composition: binding expressions over symbols
//!
//! Small closed expression language for combining explicit binds:
//! alternatives (first that binds wins), sequences (each must bind
//! before the next is attempted), and all-of groups. Expressions run
//! against an engine, so every underlying attempt still lands in the
//! audit trail.

use crate::BindingEngine;
use sigil_types::{BoundSymbol, Context, SigilResult, SymbolId};

/// A binding expression tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindExpr {
    /// Bind one registered symbol
    Sym(SymbolId),
    /// Try each branch in order; the first that binds wins
    Any(Vec<BindExpr>),
    /// Each step must bind before the next is attempted
    Seq(Vec<BindExpr>),
    /// Every branch is attempted; all must bind
    All(Vec<BindExpr>),
}

/// The outcome of evaluating a binding expression
#[derive(Clone, Debug, PartialEq)]
pub enum BindOutcome {
    /// Everything the expression bound, in attempt order
    Bound(Vec<BoundSymbol>),
    /// The expression stalled; carries the first blocking symbol
    Latent(SymbolId),
}

impl BindOutcome {
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound(_))
    }
}

impl BindExpr {
    /// Leaf expression for one symbol
    pub fn sym(id: impl Into<SymbolId>) -> Self {
        Self::Sym(id.into())
    }

    /// `self`, falling back to `other` if latent
    pub fn or(self, other: BindExpr) -> Self {
        match self {
            Self::Any(mut branches) => {
                branches.push(other);
                Self::Any(branches)
            }
            expr => Self::Any(vec![expr, other]),
        }
    }

    /// `self`, then `other` only once `self` has bound
    pub fn then(self, other: BindExpr) -> Self {
        match self {
            Self::Seq(mut steps) => {
                steps.push(other);
                Self::Seq(steps)
            }
            expr => Self::Seq(vec![expr, other]),
        }
    }

    /// `self` and `other`, both required
    pub fn and(self, other: BindExpr) -> Self {
        match self {
            Self::All(mut branches) => {
                branches.push(other);
                Self::All(branches)
            }
            expr => Self::All(vec![expr, other]),
        }
    }

    /// Evaluate the expression against an engine
    pub fn try_bind(
        &self,
        engine: &mut BindingEngine,
        context: &Context,
    ) -> SigilResult<BindOutcome> {
        match self {
            Self::Sym(id) => match engine.bind(id, context)? {
                Some(bound) => Ok(BindOutcome::Bound(vec![bound])),
                None => Ok(BindOutcome::Latent(id.clone())),
            },

            Self::Any(branches) => {
                let mut last_latent = None;
                for branch in branches {
                    match branch.try_bind(engine, context)? {
                        outcome @ BindOutcome::Bound(_) => return Ok(outcome),
                        BindOutcome::Latent(id) => last_latent = Some(id),
                    }
                }
                match last_latent {
                    Some(id) => Ok(BindOutcome::Latent(id)),
                    None => Ok(BindOutcome::Bound(Vec::new())),
                }
            }

            Self::Seq(steps) => {
                let mut all_bound = Vec::new();
                for step in steps {
                    match step.try_bind(engine, context)? {
                        BindOutcome::Bound(bound) => all_bound.extend(bound),
                        latent @ BindOutcome::Latent(_) => return Ok(latent),
                    }
                }
                Ok(BindOutcome::Bound(all_bound))
            }

            Self::All(branches) => {
                let mut all_bound = Vec::new();
                let mut first_latent = None;
                for branch in branches {
                    match branch.try_bind(engine, context)? {
                        BindOutcome::Bound(bound) => all_bound.extend(bound),
                        BindOutcome::Latent(id) => {
                            first_latent.get_or_insert(id);
                        }
                    }
                }
                match first_latent {
                    Some(id) => Ok(BindOutcome::Latent(id)),
                    None => Ok(BindOutcome::Bound(all_bound)),
                }
            }
        }
    }
}
