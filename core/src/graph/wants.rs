use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::stack::{resolve_refs, Project, Stack};

/// Expands `selection` with every stack it transitively wants.
///
/// `a.wants = [b]` pulls `b` in whenever `a` is selected and
/// `a.wanted_by = [c]` pulls `a` in whenever `c` is selected. Selected stacks
/// keep their order; added ones follow, sorted by dir.
pub fn add_wanted_of(project: &dyn Project, selection: &[Stack]) -> Vec<Stack> {
    let all = project.stacks();
    let mut wanted: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for stack in all {
        for target in resolve_refs(all, stack, &stack.wants) {
            wanted
                .entry(stack.dir.as_str())
                .or_default()
                .insert(target.dir.as_str());
        }
        for source in resolve_refs(all, stack, &stack.wanted_by) {
            wanted
                .entry(source.dir.as_str())
                .or_default()
                .insert(stack.dir.as_str());
        }
    }

    let mut seen: BTreeSet<&str> = selection.iter().map(|s| s.dir.as_str()).collect();
    let mut queue: VecDeque<&str> = selection.iter().map(|s| s.dir.as_str()).collect();
    let mut added: BTreeSet<&str> = BTreeSet::new();

    while let Some(dir) = queue.pop_front() {
        let Some(targets) = wanted.get(dir) else {
            continue;
        };
        for &target in targets {
            if seen.insert(target) {
                tracing::debug!(stack = %dir, wanted = %target, "adding wanted stack");
                added.insert(target);
                queue.push_back(target);
            }
        }
    }

    let mut out = selection.to_vec();
    out.extend(
        added
            .into_iter()
            .filter_map(|dir| project.stack_by_dir(dir).cloned()),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemProject;

    fn dirs(stacks: &[Stack]) -> Vec<&str> {
        stacks.iter().map(|s| s.dir.as_str()).collect()
    }

    #[test]
    fn test_wants_is_transitive() {
        let project = MemProject::new(vec![
            Stack::new("/app").with_wants(["/db"]),
            Stack::new("/db").with_wants(["../net"]),
            Stack::new("/net"),
            Stack::new("/other"),
        ]);
        let got = add_wanted_of(&project, &project.stacks[..1]);
        assert_eq!(dirs(&got), vec!["/app", "/db", "/net"]);
    }

    #[test]
    fn test_wanted_by_pulls_declaring_stack() {
        let project = MemProject::new(vec![
            Stack::new("/app"),
            Stack::new("/monitoring").with_wanted_by(["/app"]),
        ]);
        let got = add_wanted_of(&project, &project.stacks[..1]);
        assert_eq!(dirs(&got), vec!["/app", "/monitoring"]);
    }

    #[test]
    fn test_wants_cycles_terminate() {
        let project = MemProject::new(vec![
            Stack::new("/a").with_wants(["/b"]),
            Stack::new("/b").with_wants(["/a"]),
        ]);
        let got = add_wanted_of(&project, &project.stacks[..1]);
        assert_eq!(dirs(&got), vec!["/a", "/b"]);
    }
}
