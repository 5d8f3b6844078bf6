use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::DagError;

/// Directed acyclic graph of run nodes keyed by ID.
///
/// An edge `before -> after` means `after` may only start once `before`
/// has finished.
#[derive(Debug, Clone)]
pub struct Dag<V> {
    /// Node values: id -> value
    nodes: HashMap<String, V>,

    /// id -> nodes that must finish first
    ancestors: BTreeMap<String, Vec<String>>,

    /// id -> nodes waiting for it
    descendants: BTreeMap<String, Vec<String>>,
}

impl<V> Default for Dag<V> {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            ancestors: BTreeMap::new(),
            descendants: BTreeMap::new(),
        }
    }
}

impl<V> Dag<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: impl Into<String>, value: V) -> Result<(), DagError> {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            return Err(DagError::DuplicateNode(id));
        }
        self.ancestors.entry(id.clone()).or_default();
        self.descendants.entry(id.clone()).or_default();
        self.nodes.insert(id, value);
        Ok(())
    }

    /// Records that `before` must finish before `after` starts. Idempotent.
    pub fn add_edge(&mut self, before: &str, after: &str) {
        let anc = self.ancestors.entry(after.to_string()).or_default();
        if !anc.iter().any(|a| a == before) {
            anc.push(before.to_string());
        }
        let desc = self.descendants.entry(before.to_string()).or_default();
        if !desc.iter().any(|d| d == after) {
            desc.push(after.to_string());
        }
    }

    /// Checks every edge endpoint is a node and that there are no cycles.
    pub fn validate(&self) -> Result<(), DagError> {
        for (id, ancestors) in &self.ancestors {
            if !self.nodes.contains_key(id) {
                return Err(DagError::NodeNotFound(id.clone()));
            }
            if let Some(missing) = ancestors.iter().find(|a| !self.nodes.contains_key(*a)) {
                return Err(DagError::NodeNotFound(missing.clone()));
            }
        }

        if let Some(reason) = self.detect_cycle() {
            return Err(DagError::CycleDetected { reason });
        }
        Ok(())
    }

    /// Topological order, lexicographic among nodes that are ready together.
    pub fn order(&self) -> Vec<String> {
        let mut pending: HashMap<&str, usize> = self
            .ids()
            .map(|id| (id, self.ancestors_of(id).len()))
            .collect();
        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_first() {
            order.push(id.to_string());
            for next in self.descendants_of(id) {
                if let Some(n) = pending.get_mut(next.as_str()) {
                    *n -= 1;
                    if *n == 0 {
                        ready.insert(next.as_str());
                    }
                }
            }
        }
        order
    }

    /// Node IDs in lexicographic order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ancestors
            .keys()
            .map(String::as_str)
            .filter(|id| self.nodes.contains_key(*id))
    }

    pub fn node(&self, id: &str) -> Option<&V> {
        self.nodes.get(id)
    }

    pub fn ancestors_of(&self, id: &str) -> &[String] {
        self.ancestors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn descendants_of(&self, id: &str) -> &[String] {
        self.descendants.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walks ancestor edges with an explicit frame stack so long chains do
    /// not exhaust the call stack. Returns the first cycle found.
    fn detect_cycle(&self) -> Option<String> {
        let mut visited: HashSet<&str> = HashSet::new();

        for start in self.ancestors.keys() {
            let start = start.as_str();
            if !visited.insert(start) {
                continue;
            }

            let mut path: Vec<&str> = vec![start];
            let mut on_path: HashSet<&str> = HashSet::from([start]);
            let mut frames: Vec<(&str, usize)> = vec![(start, 0)];

            while let Some(&(node, idx)) = frames.last() {
                let Some(dep) = self.ancestors_of(node).get(idx).map(String::as_str) else {
                    on_path.remove(node);
                    path.pop();
                    frames.pop();
                    continue;
                };

                if let Some(top) = frames.last_mut() {
                    top.1 += 1;
                }

                // already on the current path: cycle
                if on_path.contains(dep) {
                    let pos = path.iter().position(|p| *p == dep).unwrap_or(0);
                    let mut cycle = path[pos..].to_vec();
                    cycle.push(dep);
                    return Some(format_cycle_path(&cycle));
                }

                if visited.insert(dep) {
                    path.push(dep);
                    on_path.insert(dep);
                    frames.push((dep, 0));
                }
            }
        }

        None
    }
}

fn format_cycle_path(stack: &[&str]) -> String {
    stack.join(" -> ")
}
