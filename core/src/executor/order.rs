use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::error::DagError;
use crate::graph::DependencyGraph;
use crate::stack::{resolve_refs, Project, Stack};

use super::dag::Dag;

/// Builds the execution DAG for `runs`, keyed by stack dir.
///
/// Edges come from `after`/`before`/`wants`/`wanted_by`, from parent
/// directories (a parent stack runs before its children) and, when given,
/// from the data dependencies in `data`. Stacks referenced by ordering
/// attributes but not part of `runs` are walked so transitive constraints
/// survive, then contracted away.
pub fn build_run_dag<R, F>(
    project: &dyn Project,
    runs: Vec<R>,
    stack_of: F,
    data: Option<&DependencyGraph>,
) -> Result<Dag<R>, DagError>
where
    F: Fn(&R) -> &Stack,
{
    let selected: Vec<Stack> = runs.iter().map(|r| stack_of(r).clone()).collect();
    let selected_dirs: HashSet<&str> = selected.iter().map(|s| s.dir.as_str()).collect();

    let full = ordering_graph(project, &selected, data)?;
    full.validate()?;

    let mut dag = Dag::new();
    for run in runs {
        let dir = stack_of(&run).dir.clone();
        dag.add_node(dir, run)?;
    }

    for stack in &selected {
        for before in nearest_selected_ancestors(&full, &stack.dir, &selected_dirs) {
            dag.add_edge(&before, &stack.dir);
        }
    }

    dag.validate()?;
    Ok(dag)
}

/// Ordering constraints over the selected stacks and everything their
/// ordering attributes reach.
fn ordering_graph(
    project: &dyn Project,
    selected: &[Stack],
    data: Option<&DependencyGraph>,
) -> Result<Dag<()>, DagError> {
    let all = project.stacks();
    // dir -> dirs that must run first
    let mut after: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut queue: VecDeque<Stack> = selected.iter().cloned().collect();
    let mut seen: HashSet<String> = selected.iter().map(|s| s.dir.clone()).collect();

    let mut visit = |dir: &str, queue: &mut VecDeque<Stack>| {
        if seen.insert(dir.to_string()) {
            if let Some(s) = project.stack_by_dir(dir) {
                queue.push_back(s.clone());
            }
        }
    };

    while let Some(stack) = queue.pop_front() {
        after.entry(stack.dir.clone()).or_default();

        for target in resolve_refs(all, &stack, &stack.after)
            .into_iter()
            .chain(resolve_refs(all, &stack, &stack.wants))
        {
            after
                .entry(stack.dir.clone())
                .or_default()
                .insert(target.dir.clone());
            visit(&target.dir, &mut queue);
        }

        for target in resolve_refs(all, &stack, &stack.before)
            .into_iter()
            .chain(resolve_refs(all, &stack, &stack.wanted_by))
        {
            after
                .entry(target.dir.clone())
                .or_default()
                .insert(stack.dir.clone());
            visit(&target.dir, &mut queue);
        }
    }

    for child in selected {
        for parent in selected {
            if parent.is_parent_of(child) {
                after
                    .entry(child.dir.clone())
                    .or_default()
                    .insert(parent.dir.clone());
            }
        }
        if let Some(graph) = data {
            for provider in graph.direct_dependencies(&child.dir) {
                after.entry(child.dir.clone()).or_default().insert(provider);
            }
        }
    }

    let mut dag = Dag::new();
    let nodes: BTreeSet<String> = after
        .iter()
        .flat_map(|(dir, firsts)| std::iter::once(dir.clone()).chain(firsts.iter().cloned()))
        .collect();
    for dir in &nodes {
        dag.add_node(dir.clone(), ())?;
    }
    for (dir, firsts) in &after {
        for first in firsts {
            dag.add_edge(first, dir);
        }
    }
    Ok(dag)
}

/// Selected stacks reachable backwards from `dir`, looking through
/// unselected ones.
fn nearest_selected_ancestors(
    full: &Dag<()>,
    dir: &str,
    selected: &HashSet<&str>,
) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = full.ancestors_of(dir).iter().map(String::as_str).collect();

    while let Some(node) = stack.pop() {
        if !seen.insert(node) {
            continue;
        }
        if selected.contains(node) {
            out.push(node.to_string());
        } else {
            stack.extend(full.ancestors_of(node).iter().map(String::as_str));
        }
    }
    out.sort();
    out
}
