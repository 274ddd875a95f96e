//! Sigil Binding Engine
//!
//! The engine binds latent symbols — activation contracts with
//! four-dimensional gates — against immutable contexts, resolving
//! dependency cascades deterministically and explaining every decision
//! through an append-only audit trail.
//!
//! # Architecture
//!
//! The [`BindingEngine`] composes specialized components:
//!
//! - [`SymbolRegistry`] — Owns definitions and lifecycle phases, in
//!   registration order
//! - [`DependencyGraph`] — Symbol → dependency edges, kept acyclic at
//!   registration time
//! - [`gate`] — Pure evaluation of gate conditions against contexts
//! - [`AuditTrail`] — Append-only record of every binding attempt
//! - [`AuditSink`] — Pluggable live storage for audit records
//!
//! # Example
//!
//! ```rust
//! use sigil_engine::{BindingEngine, CascadeOptions};
//! use sigil_types::{Context, GateCondition, Symbol};
//! use chrono::Utc;
//! use serde_json::json;
//!
//! let mut engine = BindingEngine::new();
//!
//! engine.register(
//!     Symbol::new("pick_up_key", "ACTION:pickup", GateCondition::open())
//!         .with_state_mutation("has_key", json!(true)),
//! ).unwrap();
//! engine.register(Symbol::new(
//!     "unlock_door",
//!     "ACTION:unlock",
//!     GateCondition::open().with_state("has_key", json!(true)),
//! )).unwrap();
//!
//! let context = Context::new(Utc::now(), "hallway")
//!     .with_state("has_key", json!(false));
//! let outcome = engine
//!     .bind_all_registered(&context, CascadeOptions::default())
//!     .unwrap();
//!
//! assert_eq!(outcome.bound.len(), 2);
//! assert_eq!(outcome.final_context.state_value("has_key"), Some(&json!(true)));
//! ```

#![deny(unsafe_code)]

pub mod audit;
pub mod compose;
pub mod engine;
pub mod export;
pub mod gate;
pub mod graph;
pub mod registry;
pub mod sequence;
pub mod sink;
pub mod template;

pub use audit::AuditTrail;
pub use compose::{BindExpr, BindOutcome};
pub use engine::{
    ActivationHook, BindingEngine, CascadeOptions, CascadeOutcome, RoundSummary, WeightFn,
};
pub use export::{
    export_ledger_json, export_ledger_jsonl, export_trail_filtered, export_trail_json,
    export_trail_jsonl, ExportFormat,
};
pub use graph::DependencyGraph;
pub use registry::{RegisteredSymbol, SymbolRegistry};
pub use sequence::{Perspective, PerspectiveRunner};
pub use sink::{AuditSink, JsonFileSink, JsonlFileSink, MemorySink, MultiplexSink};
pub use template::{SymbolTemplate, TemplateRegistry};
