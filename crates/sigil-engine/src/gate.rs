//! Gate evaluation: pure pass/fail decisions with structured reasons
//!
//! Stateless functions from `(GateCondition, Context)` to failure
//! reasons. Every failing dimension is collected — not just the first —
//! so audit output explains the whole rejection at once.

use serde_json::Value;
use sigil_types::{Context, FailureReason, GateCondition, TemporalSpec};

/// Evaluate every present gate dimension against a context.
///
/// Returns one reason per failing dimension (who, where, state, when, in
/// that order); an empty vector means the gate passes. The empty gate
/// passes for every context.
pub fn evaluate(gate: &GateCondition, context: &Context) -> Vec<FailureReason> {
    let mut reasons = Vec::new();

    if let Some(reason) = check_who(gate, context) {
        reasons.push(reason);
    }
    if let Some(reason) = check_location(gate, context) {
        reasons.push(reason);
    }
    if let Some(reason) = check_state(gate, context) {
        reasons.push(reason);
    }
    if let Some(reason) = check_when(gate, context) {
        reasons.push(reason);
    }

    reasons
}

/// Whether the gate passes outright
pub fn passes(gate: &GateCondition, context: &Context) -> bool {
    evaluate(gate, context).is_empty()
}

/// Check the actor dimension
pub fn check_who(gate: &GateCondition, context: &Context) -> Option<FailureReason> {
    let allowed = gate.who.as_ref()?;
    let satisfied = context
        .who
        .as_ref()
        .is_some_and(|actor| allowed.contains(actor));
    if satisfied {
        return None;
    }

    let actual = context
        .who
        .as_ref()
        .map(|a| a.as_str().to_string())
        .unwrap_or_else(|| "none".to_string());
    Some(FailureReason::WhoMismatch {
        expected: allowed.clone(),
        actual: context.who.clone(),
        message: format!("who: '{}' not in {}", actual, render_set(allowed.iter().map(|a| a.as_str()))),
    })
}

/// Check the location dimension
pub fn check_location(gate: &GateCondition, context: &Context) -> Option<FailureReason> {
    let allowed = gate.location.as_ref()?;
    if allowed.contains(&context.location) {
        return None;
    }

    Some(FailureReason::WhereMismatch {
        expected: allowed.clone(),
        actual: context.location.clone(),
        message: format!(
            "where: '{}' not in {}",
            context.location,
            render_set(allowed.iter().map(String::as_str))
        ),
    })
}

/// Check the state dimension: exact, type-sensitive equality per key.
/// Reports the first mismatched key (deterministic: sorted key order).
pub fn check_state(gate: &GateCondition, context: &Context) -> Option<FailureReason> {
    let required = gate.state.as_ref()?;
    for (key, expected) in required {
        let actual = context.state_value(key);
        if actual != Some(expected) {
            let rendered_actual = actual
                .map(|v| v.to_string())
                .unwrap_or_else(|| "none".to_string());
            return Some(FailureReason::StateMismatch {
                key: key.clone(),
                expected: expected.clone(),
                actual: actual.cloned(),
                message: format!("state['{}']: expected {}, got {}", key, expected, rendered_actual),
            });
        }
    }
    None
}

/// Check the temporal dimension
pub fn check_when(gate: &GateCondition, context: &Context) -> Option<FailureReason> {
    let spec = gate.when.as_ref()?;
    if temporal_satisfied(spec, context) {
        return None;
    }

    Some(FailureReason::WhenMismatch {
        expected: spec.clone(),
        actual: context.when,
        message: format!(
            "when: temporal condition '{}' not satisfied at {}",
            spec,
            context.when.to_rfc3339()
        ),
    })
}

/// Check whether a hard `before:` deadline has permanently passed.
///
/// Only absolute deadlines expire; a symbolic `before:key` can always
/// flip back.
pub fn check_expired(gate: &GateCondition, context: &Context) -> Option<FailureReason> {
    match gate.when {
        Some(TemporalSpec::Before(deadline)) if context.when >= deadline => {
            Some(FailureReason::Expired {
                deadline,
                observed: context.when,
                message: format!(
                    "symbol expired: deadline '{}' has passed",
                    deadline.to_rfc3339()
                ),
            })
        }
        _ => None,
    }
}

/// Whether the gate waits on an absolute `after:` instant that is still
/// in the future. The cascade excludes such symbols from the eligible
/// set without recording a failure — not-yet is not a rejection.
pub fn awaiting_future_open(gate: &GateCondition, context: &Context) -> bool {
    matches!(gate.when, Some(TemporalSpec::After(open)) if context.when <= open)
}

fn temporal_satisfied(spec: &TemporalSpec, context: &Context) -> bool {
    match spec {
        TemporalSpec::After(instant) => context.when > *instant,
        TemporalSpec::Before(instant) => context.when < *instant,
        TemporalSpec::AfterKey(key) => truthy(context.state_value(key)),
        TemporalSpec::BeforeKey(key) => !truthy(context.state_value(key)),
    }
}

/// Truthiness for symbolic temporal references: null/absent, false, zero,
/// and empty collections are falsy.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

fn render_set<'a>(items: impl Iterator<Item = &'a str>) -> String {
    format!("{{{}}}", items.collect::<Vec<_>>().join(", "))
}
