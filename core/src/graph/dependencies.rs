use std::collections::{BTreeMap, HashSet};

use crate::error::GraphError;
use crate::eval::{eval_from_stack_id, EvalContext};
use crate::stack::{path, Project, Stack};

/// Directed data-dependency edges between stacks, keyed by stack dir.
///
/// `dependencies[a]` lists what `a` needs, `dependents[b]` lists who needs `b`.
/// Both maps are kept in sync by `add_dependency` and hold no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    dependencies: BTreeMap<String, Vec<String>>,
    dependents: BTreeMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes the data dependencies of `stacks`.
    ///
    /// Edges pointing outside `stacks` are skipped; a `from_stack_id` that
    /// fails to evaluate is an error.
    pub fn build(
        project: &dyn Project,
        eval: &dyn EvalContext,
        stacks: &[Stack],
    ) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        let selected: HashSet<&str> = stacks.iter().map(|s| s.dir.as_str()).collect();

        for stack in stacks {
            graph.add_stack(&stack.dir);
        }

        for stack in stacks {
            for input in project.inputs(stack) {
                let id = eval_from_stack_id(eval, stack, &input).map_err(|source| {
                    GraphError::FromStackId {
                        stack: stack.dir.clone(),
                        input: input.name.clone(),
                        source,
                    }
                })?;

                let Some(provider) = project.stack_by_id(&id) else {
                    tracing::warn!(
                        stack = %stack.dir,
                        input = %input.name,
                        from_stack_id = %id,
                        "input references an unknown stack, skipping"
                    );
                    continue;
                };

                if !selected.contains(provider.dir.as_str()) {
                    tracing::debug!(
                        stack = %stack.dir,
                        dependency = %provider.dir,
                        "dependency outside the current stack set, skipping"
                    );
                    continue;
                }

                graph.add_dependency(&stack.dir, &provider.dir);
            }

            for declared in project.external_dependencies(stack) {
                let dep = path::resolve(&stack.dir, &declared);
                if !selected.contains(dep.as_str()) {
                    tracing::debug!(
                        stack = %stack.dir,
                        dependency = %dep,
                        "declared dependency is not a stack in the current set, skipping"
                    );
                    continue;
                }
                graph.add_dependency(&stack.dir, &dep);
            }
        }

        Ok(graph)
    }

    /// Registers a stack with empty adjacency lists.
    pub fn add_stack(&mut self, dir: &str) {
        self.dependencies.entry(dir.to_string()).or_default();
        self.dependents.entry(dir.to_string()).or_default();
    }

    /// Records that `consumer` depends on `provider`. Idempotent.
    pub fn add_dependency(&mut self, consumer: &str, provider: &str) {
        self.add_stack(consumer);
        self.add_stack(provider);

        let deps = self.dependencies.entry(consumer.to_string()).or_default();
        if !deps.iter().any(|d| d == provider) {
            deps.push(provider.to_string());
        }

        let rdeps = self.dependents.entry(provider.to_string()).or_default();
        if !rdeps.iter().any(|d| d == consumer) {
            rdeps.push(consumer.to_string());
        }
    }

    /// Every indexed stack dir, sorted.
    pub fn stacks(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    pub fn direct_dependencies(&self, dir: &str) -> Vec<String> {
        self.dependencies.get(dir).cloned().unwrap_or_default()
    }

    pub fn direct_dependents(&self, dir: &str) -> Vec<String> {
        self.dependents.get(dir).cloned().unwrap_or_default()
    }

    /// Transitive dependencies in first-discovery order, excluding `dir`.
    pub fn all_dependencies(&self, dir: &str) -> Vec<String> {
        closure(&self.dependencies, dir)
    }

    /// Transitive dependents in first-discovery order, excluding `dir`.
    pub fn all_dependents(&self, dir: &str) -> Vec<String> {
        closure(&self.dependents, dir)
    }

    pub fn direct_dependencies_for_stacks(&self, dirs: &[String]) -> Vec<String> {
        union(dirs.iter().map(|d| self.direct_dependencies(d)))
    }

    pub fn direct_dependents_for_stacks(&self, dirs: &[String]) -> Vec<String> {
        union(dirs.iter().map(|d| self.direct_dependents(d)))
    }

    pub fn all_dependencies_for_stacks(&self, dirs: &[String]) -> Vec<String> {
        union(dirs.iter().map(|d| self.all_dependencies(d)))
    }

    pub fn all_dependents_for_stacks(&self, dirs: &[String]) -> Vec<String> {
        union(dirs.iter().map(|d| self.all_dependents(d)))
    }

    /// Finds dependency cycles. Each back edge found during the DFS yields
    /// the path slice from the revisited node to the current tip.
    ///
    /// Advisory: callers decide whether a cycle matters.
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut cycles = Vec::new();

        for start in self.dependencies.keys() {
            let start = start.as_str();
            if !visited.insert(start) {
                continue;
            }

            let mut path: Vec<&str> = vec![start];
            let mut on_path: HashSet<&str> = HashSet::from([start]);
            let mut frames: Vec<(&str, usize)> = vec![(start, 0)];

            while let Some(&(node, idx)) = frames.last() {
                let children = self
                    .dependencies
                    .get(node)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);

                let Some(child) = children.get(idx).map(String::as_str) else {
                    on_path.remove(node);
                    path.pop();
                    frames.pop();
                    continue;
                };

                if let Some(top) = frames.last_mut() {
                    top.1 += 1;
                }

                if on_path.contains(child) {
                    if let Some(pos) = path.iter().position(|p| *p == child) {
                        cycles.push(path[pos..].iter().map(|p| p.to_string()).collect());
                    }
                } else if visited.insert(child) {
                    path.push(child);
                    on_path.insert(child);
                    frames.push((child, 0));
                }
            }
        }

        cycles
    }
}

fn closure(edges: &BTreeMap<String, Vec<String>>, start: &str) -> Vec<String> {
    let mut visited: HashSet<&str> = HashSet::from([start]);
    let mut out = Vec::new();
    let mut stack: Vec<&str> = edges
        .get(start)
        .map(|next| next.iter().rev().map(String::as_str).collect())
        .unwrap_or_default();

    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }
        out.push(node.to_string());
        if let Some(next) = edges.get(node) {
            stack.extend(
                next.iter()
                    .rev()
                    .map(String::as_str)
                    .filter(|n| !visited.contains(n)),
            );
        }
    }

    out
}

fn union(lists: impl Iterator<Item = Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in lists.flatten() {
        if seen.insert(item.clone()) {
            out.push(item);
        }
    }
    out
}
