//! Dependency graph: directed edges from symbol to dependency
//!
//! The graph holds identifiers only — the registry owns symbol data.
//! Dependencies may reference symbols registered later; an edge to an
//! identifier that never registers simply never satisfies. What the
//! graph does guarantee is acyclicity: a cycle introduced by an
//! insertion is detected immediately and the insertion is rolled back.

use sigil_types::{SigilError, SigilResult, SymbolId};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Directed graph over symbol identifiers, kept acyclic by construction
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    edges: HashMap<SymbolId, Vec<SymbolId>>,
    /// Insertion order; cycle reporting walks nodes in this order so the
    /// reported path is stable across runs
    order: Vec<SymbolId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node with edges to each declared dependency.
    ///
    /// Runs a depth-first acyclicity check over the whole graph. On
    /// detecting a cycle the insertion is removed — no partial mutation
    /// survives — and the error carries the full cycle path in
    /// iteration order (e.g. `a → b → c → a`).
    pub fn add(&mut self, id: &SymbolId, dependencies: &[SymbolId]) -> SigilResult<()> {
        self.edges.insert(id.clone(), dependencies.to_vec());
        self.order.push(id.clone());

        if let Some(path) = self.find_cycle() {
            self.edges.remove(id);
            self.order.pop();
            return Err(SigilError::CycleDetected { path });
        }
        Ok(())
    }

    /// True iff every direct dependency of `id` is in `activated`.
    ///
    /// A pure set-membership test against historical activation: an
    /// archived one-shot dependency counts forever after its first bind.
    pub fn dependencies_satisfied(&self, id: &SymbolId, activated: &BTreeSet<SymbolId>) -> bool {
        self.edges
            .get(id)
            .map(|deps| deps.iter().all(|dep| activated.contains(dep)))
            .unwrap_or(true)
    }

    /// Direct dependencies of `id` that have not yet bound, in
    /// declaration order
    pub fn unmet_dependencies<'a>(
        &'a self,
        id: &SymbolId,
        activated: &BTreeSet<SymbolId>,
    ) -> Vec<&'a SymbolId> {
        self.edges
            .get(id)
            .map(|deps| deps.iter().filter(|dep| !activated.contains(*dep)).collect())
            .unwrap_or_default()
    }

    /// Depth-first search over every node in insertion order
    fn find_cycle(&self) -> Option<Vec<SymbolId>> {
        let mut visited = HashSet::new();
        let mut on_path = HashSet::new();
        let mut path = Vec::new();

        for node in &self.order {
            if !visited.contains(node) {
                if let Some(cycle) = self.dfs(node, &mut visited, &mut on_path, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn dfs(
        &self,
        node: &SymbolId,
        visited: &mut HashSet<SymbolId>,
        on_path: &mut HashSet<SymbolId>,
        path: &mut Vec<SymbolId>,
    ) -> Option<Vec<SymbolId>> {
        visited.insert(node.clone());
        on_path.insert(node.clone());
        path.push(node.clone());

        for neighbor in self.edges.get(node).into_iter().flatten() {
            if on_path.contains(neighbor) {
                // Close the loop: everything from the first occurrence of
                // `neighbor` onward, plus `neighbor` again.
                let start = path.iter().position(|n| n == neighbor).unwrap_or(0);
                let mut cycle: Vec<SymbolId> = path[start..].to_vec();
                cycle.push(neighbor.clone());
                return Some(cycle);
            }
            if !visited.contains(neighbor) {
                if let Some(cycle) = self.dfs(neighbor, visited, on_path, path) {
                    return Some(cycle);
                }
            }
        }

        on_path.remove(node);
        path.pop();
        None
    }
}
