//! Resolution of ordering references (`after`, `before`, `wants`, `wanted_by`).

use super::path;
use super::types::Stack;

const TAG_PREFIX: &str = "tag:";

/// Resolves the references declared by `stack` against `all`.
///
/// A path reference (absolute, or relative to the stack dir) selects the
/// stack at that dir and every stack below it. `tag:` references select
/// stacks by tag query. The declaring stack itself is never returned.
pub fn resolve_refs<'a>(all: &'a [Stack], stack: &Stack, refs: &[String]) -> Vec<&'a Stack> {
    let mut out: Vec<&'a Stack> = Vec::new();
    for reference in refs {
        let matched: Vec<&'a Stack> = match reference.strip_prefix(TAG_PREFIX) {
            Some(query) => {
                let query = TagQuery::parse(query);
                all.iter().filter(|s| query.matches(s)).collect()
            }
            None => {
                let target = path::resolve(&stack.dir, reference);
                all.iter().filter(|s| path::is_within(&s.dir, &target)).collect()
            }
        };

        if matched.is_empty() {
            tracing::warn!(
                stack = %stack.dir,
                reference = %reference,
                "ordering reference matches no stack, ignoring"
            );
            continue;
        }

        for s in matched {
            if s.dir != stack.dir && !out.iter().any(|o| o.dir == s.dir) {
                out.push(s);
            }
        }
    }
    out
}

/// `a:b,c` selects stacks tagged with both `a` and `b`, or with `c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagQuery {
    alternatives: Vec<Vec<String>>,
}

impl TagQuery {
    pub fn parse(query: &str) -> Self {
        let alternatives = query
            .split(',')
            .map(|clause| {
                clause
                    .split(':')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|clause| !clause.is_empty())
            .collect();
        Self { alternatives }
    }

    pub fn matches(&self, stack: &Stack) -> bool {
        self.alternatives
            .iter()
            .any(|clause| clause.iter().all(|t| stack.has_tag(t)))
    }
}
