use std::collections::HashMap;

use crate::error::RunError;
use crate::stack::{Project, Stack};

pub(crate) type Environ = Vec<(String, String)>;

/// The current process environment, skipping entries that are not UTF-8.
pub(crate) fn inherited() -> Environ {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// `base` overlaid with `extra`; later entries replace earlier ones with the
/// same key.
pub(crate) fn overlay(base: &[(String, String)], extra: &[(String, String)]) -> Environ {
    let mut out: Environ = Vec::with_capacity(base.len() + extra.len());
    for (k, v) in base.iter().chain(extra) {
        match out.iter_mut().find(|(key, _)| key == k) {
            Some(entry) => entry.1 = v.clone(),
            None => out.push((k.clone(), v.clone())),
        }
    }
    out
}

pub(crate) fn lookup<'a>(env: &'a [(String, String)], key: &str) -> Option<&'a str> {
    env.iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Loads every stack's environment up front so nothing runs when any of
/// them is broken.
pub(crate) fn load_all_stack_envs(
    project: &dyn Project,
    stacks: &[Stack],
) -> Result<HashMap<String, Environ>, RunError> {
    let mut envs = HashMap::new();
    let mut errs = Vec::new();

    for stack in stacks {
        match project.stack_env(stack) {
            Ok(env) => {
                envs.insert(stack.dir.clone(), env);
            }
            Err(e) => errs.push(e),
        }
    }

    if !errs.is_empty() {
        return Err(RunError::StackEnv(errs));
    }
    Ok(envs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemProject;

    fn pairs(v: &[(&str, &str)]) -> Environ {
        v.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_overlay_replaces_keys() {
        let got = overlay(&pairs(&[("A", "1"), ("B", "2")]), &pairs(&[("B", "3"), ("C", "4")]));
        assert_eq!(got, pairs(&[("A", "1"), ("B", "3"), ("C", "4")]));
        assert_eq!(lookup(&got, "B"), Some("3"));
        assert_eq!(lookup(&got, "Z"), None);
    }

    #[test]
    fn test_load_all_aggregates_errors() {
        let mut project = MemProject::with_ids(&["a", "b", "c"]);
        project.broken_env = vec!["/a".into(), "/c".into()];
        let err = load_all_stack_envs(&project, &project.stacks).unwrap_err();
        match err {
            RunError::StackEnv(errs) => assert_eq!(errs.len(), 2),
            other => panic!("unexpected error {other}"),
        }
    }
}
