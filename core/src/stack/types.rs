use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::path;

/// An independently deployable configuration unit.
///
/// `dir` is a project path (always starting with `/`) and is the unique key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    pub dir: String,

    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub before: Vec<String>,

    #[serde(default)]
    pub wants: Vec<String>,

    #[serde(default)]
    pub wanted_by: Vec<String>,

    #[serde(default)]
    pub watch: Vec<String>,
}

impl Stack {
    pub fn new(dir: impl AsRef<str>) -> Self {
        Self {
            dir: path::normalize(dir.as_ref()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_after<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.after = refs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_before<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.before = refs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_wants<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wants = refs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_wanted_by<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wanted_by = refs.into_iter().map(Into::into).collect();
        self
    }

    /// Directory on the host filesystem where the stack's commands run.
    pub fn host_dir(&self, root: &Path) -> PathBuf {
        root.join(self.dir.trim_start_matches('/'))
    }

    /// True when `other` lives strictly below this stack's directory.
    pub fn is_parent_of(&self, other: &Stack) -> bool {
        self.dir != other.dir && path::is_within(&other.dir, &self.dir)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_dir() {
        assert_eq!(Stack::new("a/b/").dir, "/a/b");
        assert_eq!(Stack::new("/a/./c/../b").dir, "/a/b");
    }

    #[test]
    fn test_host_dir_joins_root() {
        let s = Stack::new("/infra/net");
        assert_eq!(
            s.host_dir(Path::new("/work/repo")),
            PathBuf::from("/work/repo/infra/net")
        );
    }

    #[test]
    fn test_is_parent_of() {
        let parent = Stack::new("/infra");
        assert!(parent.is_parent_of(&Stack::new("/infra/net")));
        assert!(!parent.is_parent_of(&Stack::new("/infra")));
        assert!(!parent.is_parent_of(&Stack::new("/infrastructure")));
        assert!(Stack::new("/").is_parent_of(&Stack::new("/x")));
    }
}
