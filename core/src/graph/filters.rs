use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{FilterError, GraphError};
use crate::eval::{eval_from_stack_id, EvalContext};
use crate::stack::{Project, Stack};

use super::dependencies::DependencyGraph;

/// Selection intents applied on top of a starting stack set.
///
/// `only_*` replaces the selection, `include_*` adds to it and `exclude_*`
/// removes from it, in that order. The two `*_output_dependencies` flags are
/// the older, narrower form and cannot be mixed with the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyFilters {
    pub only_direct_dependencies: bool,
    pub only_all_dependencies: bool,
    pub only_direct_dependents: bool,
    pub only_all_dependents: bool,

    pub include_direct_dependencies: bool,
    pub include_all_dependencies: bool,
    pub include_direct_dependents: bool,
    pub include_all_dependents: bool,

    pub exclude_direct_dependencies: bool,
    pub exclude_all_dependencies: bool,
    pub exclude_direct_dependents: bool,
    pub exclude_all_dependents: bool,

    pub include_output_dependencies: bool,
    pub only_output_dependencies: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closure {
    DirectDependencies,
    AllDependencies,
    DirectDependents,
    AllDependents,
}

impl Closure {
    fn of(self, graph: &DependencyGraph, dirs: &[String]) -> Vec<String> {
        match self {
            Self::DirectDependencies => graph.direct_dependencies_for_stacks(dirs),
            Self::AllDependencies => graph.all_dependencies_for_stacks(dirs),
            Self::DirectDependents => graph.direct_dependents_for_stacks(dirs),
            Self::AllDependents => graph.all_dependents_for_stacks(dirs),
        }
    }
}

impl DependencyFilters {
    fn only(&self) -> Vec<(&'static str, Closure)> {
        flagged([
            (self.only_direct_dependencies, "only-direct-dependencies", Closure::DirectDependencies),
            (self.only_all_dependencies, "only-all-dependencies", Closure::AllDependencies),
            (self.only_direct_dependents, "only-direct-dependents", Closure::DirectDependents),
            (self.only_all_dependents, "only-all-dependents", Closure::AllDependents),
        ])
    }

    fn include(&self) -> Vec<(&'static str, Closure)> {
        flagged([
            (self.include_direct_dependencies, "include-direct-dependencies", Closure::DirectDependencies),
            (self.include_all_dependencies, "include-all-dependencies", Closure::AllDependencies),
            (self.include_direct_dependents, "include-direct-dependents", Closure::DirectDependents),
            (self.include_all_dependents, "include-all-dependents", Closure::AllDependents),
        ])
    }

    fn exclude(&self) -> Vec<(&'static str, Closure)> {
        flagged([
            (self.exclude_direct_dependencies, "exclude-direct-dependencies", Closure::DirectDependencies),
            (self.exclude_all_dependencies, "exclude-all-dependencies", Closure::AllDependencies),
            (self.exclude_direct_dependents, "exclude-direct-dependents", Closure::DirectDependents),
            (self.exclude_all_dependents, "exclude-all-dependents", Closure::AllDependents),
        ])
    }

    fn legacy(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.include_output_dependencies {
            out.push("include-output-dependencies");
        }
        if self.only_output_dependencies {
            out.push("only-output-dependencies");
        }
        out
    }

    /// True when one of the deprecated output-dependency flags is set.
    pub fn is_legacy(&self) -> bool {
        self.include_output_dependencies || self.only_output_dependencies
    }

    /// True when any graph-based flag is set.
    pub fn has_graph_filters(&self) -> bool {
        !(self.only().is_empty() && self.include().is_empty() && self.exclude().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        !self.is_legacy() && !self.has_graph_filters()
    }

    /// Rejects conflicting combinations. Cheap; runs before any traversal.
    pub fn validate(&self) -> Result<(), FilterError> {
        let legacy = self.legacy();
        if legacy.len() > 1 {
            return Err(FilterError::Conflicting(legacy[0], legacy[1]));
        }
        if let Some(old) = legacy.first() {
            let new = self
                .only()
                .into_iter()
                .chain(self.include())
                .chain(self.exclude())
                .map(|(name, _)| name)
                .next();
            if let Some(new) = new {
                return Err(FilterError::Conflicting(old, new));
            }
        }

        let only = self.only();
        if only.len() > 1 {
            return Err(FilterError::MultipleOnly(
                only.into_iter().map(|(name, _)| name).collect(),
            ));
        }
        Ok(())
    }
}

fn flagged<const N: usize>(
    flags: [(bool, &'static str, Closure); N],
) -> Vec<(&'static str, Closure)> {
    flags
        .into_iter()
        .filter(|(set, _, _)| *set)
        .map(|(_, name, closure)| (name, closure))
        .collect()
}

impl DependencyGraph {
    /// Applies the only → include → exclude stages to `start` and returns
    /// the resulting stack dirs sorted lexicographically.
    pub fn apply_filters(
        &self,
        filters: &DependencyFilters,
        start: &[String],
    ) -> Result<Vec<String>, FilterError> {
        filters.validate()?;

        let mut result: BTreeSet<String> = match filters.only().first() {
            Some((_, closure)) => closure.of(self, start).into_iter().collect(),
            None => start.iter().cloned().collect(),
        };

        for (_, closure) in filters.include() {
            result.extend(closure.of(self, start));
        }

        let excludes = filters.exclude();
        if !excludes.is_empty() {
            let base: Vec<String> = result.iter().cloned().collect();
            let removed: HashSet<String> = excludes
                .into_iter()
                .flat_map(|(_, closure)| closure.of(self, &base))
                .collect();
            result.retain(|dir| !removed.contains(dir));
        }

        Ok(result.into_iter().collect())
    }
}

/// Derives a stack selection from `selection` according to `filters`.
///
/// The graph covers every stack of the project so closures can reach stacks
/// outside the starting set. Result paths that no longer map to a stack are
/// dropped with a warning.
pub fn apply_dependency_filters(
    project: &dyn Project,
    eval: &dyn EvalContext,
    filters: &DependencyFilters,
    selection: &[Stack],
) -> Result<Vec<Stack>, FilterError> {
    filters.validate()?;

    if filters.is_legacy() {
        return add_output_dependencies(project, eval, filters, selection);
    }
    if !filters.has_graph_filters() {
        return Ok(selection.to_vec());
    }

    let graph = DependencyGraph::build(project, eval, project.stacks())?;
    let start: Vec<String> = selection.iter().map(|s| s.dir.clone()).collect();
    let dirs = graph.apply_filters(filters, &start)?;

    let mut out = Vec::with_capacity(dirs.len());
    for dir in dirs {
        match project.stack_by_dir(&dir) {
            Some(stack) => out.push(stack.clone()),
            None => tracing::warn!(stack = %dir, "filtered stack not found in project, dropping"),
        }
    }
    Ok(out)
}

/// Legacy selection: only `from_stack_id` references of the selection's
/// inputs count, and only one level deep.
fn add_output_dependencies(
    project: &dyn Project,
    eval: &dyn EvalContext,
    filters: &DependencyFilters,
    selection: &[Stack],
) -> Result<Vec<Stack>, FilterError> {
    let mut found: BTreeMap<String, Stack> = BTreeMap::new();

    for stack in selection {
        for input in project.inputs(stack) {
            let id = eval_from_stack_id(eval, stack, &input).map_err(|source| {
                GraphError::FromStackId {
                    stack: stack.dir.clone(),
                    input: input.name.clone(),
                    source,
                }
            })?;
            let dep = project
                .stack_by_id(&id)
                .ok_or_else(|| FilterError::DependencyNotFound(id.clone()))?;
            found.insert(dep.dir.clone(), dep.clone());
        }
    }

    if filters.only_output_dependencies {
        return Ok(found.into_values().collect());
    }

    let mut out = selection.to_vec();
    for dep in found.into_values() {
        if !out.iter().any(|s| s.dir == dep.dir) {
            out.push(dep);
        }
    }
    Ok(out)
}
