//! Audit trail: append-only record of every binding attempt
//!
//! The trail is never rewritten. It answers the questions the engine
//! itself cannot: why didn't this symbol activate, and where is the
//! systemic bottleneck.

use sigil_types::{BindingAttempt, FailureCategory, SymbolId};
use std::collections::BTreeMap;

/// Append-only audit trail over binding attempts
#[derive(Clone, Debug, Default)]
pub struct AuditTrail {
    attempts: Vec<BindingAttempt>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one attempt. Records are immutable once here.
    pub fn record(&mut self, attempt: BindingAttempt) {
        self.attempts.push(attempt);
    }

    /// The full ordered trail
    pub fn trail(&self) -> &[BindingAttempt] {
        &self.attempts
    }

    /// All attempts for one symbol, in order
    pub fn attempts_for(&self, symbol_id: &SymbolId) -> Vec<&BindingAttempt> {
        self.attempts
            .iter()
            .filter(|a| &a.symbol_id == symbol_id)
            .collect()
    }

    /// Failed attempts for one symbol, in order
    pub fn failed(&self, symbol_id: &SymbolId) -> Vec<&BindingAttempt> {
        self.attempts
            .iter()
            .filter(|a| &a.symbol_id == symbol_id && !a.success)
            .collect()
    }

    /// Human-readable explanation of the most recent attempt for a symbol
    pub fn explain(&self, symbol_id: &SymbolId) -> String {
        let attempts = self.attempts_for(symbol_id);

        let Some(latest) = attempts.last() else {
            return format!("Symbol '{}' was never attempted for binding", symbol_id);
        };

        if latest.success {
            return format!("Symbol '{}' successfully activated", symbol_id);
        }

        if latest.failure_reasons.is_empty() {
            return format!(
                "Symbol '{}' failed to activate (no specific reason recorded)",
                symbol_id
            );
        }

        let mut lines = vec![format!("Symbol '{}' failed to activate:", symbol_id)];
        for reason in &latest.failure_reasons {
            lines.push(format!("  - {}", reason.message()));
        }
        lines.join("\n")
    }

    /// Aggregate failure counts by category, for locating systemic
    /// bottlenecks
    pub fn stats(&self) -> BTreeMap<FailureCategory, usize> {
        let mut stats = BTreeMap::new();
        for attempt in self.attempts.iter().filter(|a| !a.success) {
            for reason in &attempt.failure_reasons {
                *stats.entry(reason.category()).or_insert(0) += 1;
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sigil_types::{Context, FailureReason};

    fn make_context() -> Context {
        Context::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(), "forest")
    }

    fn where_mismatch() -> FailureReason {
        FailureReason::WhereMismatch {
            expected: ["beach".to_string()].into_iter().collect(),
            actual: "forest".to_string(),
            message: "where: 'forest' not in {beach}".to_string(),
        }
    }

    fn dependency_unmet(dep: &str) -> FailureReason {
        FailureReason::DependencyUnmet {
            dependency: SymbolId::new(dep),
            message: format!("dependency '{}' not yet activated", dep),
        }
    }

    #[test]
    fn test_explain_never_attempted() {
        let trail = AuditTrail::new();
        assert_eq!(
            trail.explain(&SymbolId::new("ghost")),
            "Symbol 'ghost' was never attempted for binding"
        );
    }

    #[test]
    fn test_explain_success() {
        let mut trail = AuditTrail::new();
        trail.record(BindingAttempt::succeeded(
            SymbolId::new("s1"),
            make_context(),
            0,
            None,
        ));
        assert_eq!(
            trail.explain(&SymbolId::new("s1")),
            "Symbol 's1' successfully activated"
        );
    }

    #[test]
    fn test_explain_lists_every_failing_dimension() {
        let mut trail = AuditTrail::new();
        trail.record(BindingAttempt::failed(
            SymbolId::new("s1"),
            make_context(),
            vec![where_mismatch(), dependency_unmet("s0")],
        ));

        let explanation = trail.explain(&SymbolId::new("s1"));
        assert!(explanation.contains("failed to activate"));
        assert!(explanation.contains("where: 'forest' not in {beach}"));
        assert!(explanation.contains("dependency 's0' not yet activated"));
    }

    #[test]
    fn test_explain_uses_most_recent_attempt() {
        let mut trail = AuditTrail::new();
        trail.record(BindingAttempt::failed(
            SymbolId::new("s1"),
            make_context(),
            vec![where_mismatch()],
        ));
        trail.record(BindingAttempt::succeeded(
            SymbolId::new("s1"),
            make_context(),
            0,
            None,
        ));
        assert_eq!(
            trail.explain(&SymbolId::new("s1")),
            "Symbol 's1' successfully activated"
        );
    }

    #[test]
    fn test_failed_filters_by_symbol_and_outcome() {
        let mut trail = AuditTrail::new();
        trail.record(BindingAttempt::failed(
            SymbolId::new("a"),
            make_context(),
            vec![where_mismatch()],
        ));
        trail.record(BindingAttempt::succeeded(SymbolId::new("a"), make_context(), 0, None));
        trail.record(BindingAttempt::failed(
            SymbolId::new("b"),
            make_context(),
            vec![dependency_unmet("a")],
        ));

        assert_eq!(trail.failed(&SymbolId::new("a")).len(), 1);
        assert_eq!(trail.failed(&SymbolId::new("b")).len(), 1);
        assert_eq!(trail.attempts_for(&SymbolId::new("a")).len(), 2);
    }

    #[test]
    fn test_stats_counts_by_category() {
        let mut trail = AuditTrail::new();
        trail.record(BindingAttempt::failed(
            SymbolId::new("a"),
            make_context(),
            vec![where_mismatch(), dependency_unmet("x")],
        ));
        trail.record(BindingAttempt::failed(
            SymbolId::new("b"),
            make_context(),
            vec![dependency_unmet("y")],
        ));

        let stats = trail.stats();
        assert_eq!(stats.get(&FailureCategory::Where), Some(&1));
        assert_eq!(stats.get(&FailureCategory::Dependency), Some(&2));
        assert_eq!(stats.get(&FailureCategory::Who), None);
    }
}
