//! `stackflow.toml`: the project manifest.
//!
//! ```toml
//! [[sharing_backend]]
//! name = "default"
//! command = ["terraform", "output", "-json"]
//!
//! [[stack]]
//! dir = "/network"
//! id = "net"
//! tags = ["core"]
//!
//! [[stack]]
//! dir = "/app"
//! after = ["tag:core"]
//! external_dependencies = ["/dns"]
//!
//! [stack.env]
//! REGION = "${env.AWS_REGION}"
//!
//! [[stack.input]]
//! name = "vpc_id"
//! backend = "default"
//! from_stack_id = "\"net\""
//! value = "outputs.vpc_id.value"
//! mock = "\"vpc-mock\""
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use stackflow_core::api::{Input, Project, ProjectError, SharingBackend, Stack};

use crate::expr::PathEvaluator;

pub const MANIFEST_FILE: &str = "stackflow.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default, rename = "sharing_backend")]
    sharing_backends: Vec<SharingBackend>,

    #[serde(default, rename = "stack")]
    stacks: Vec<StackEntry>,
}

#[derive(Debug, Deserialize)]
struct StackEntry {
    #[serde(flatten)]
    stack: Stack,

    #[serde(default)]
    env: BTreeMap<String, String>,

    #[serde(default, rename = "input")]
    inputs: Vec<Input>,

    #[serde(default)]
    external_dependencies: Vec<String>,
}

/// A project loaded from a manifest file. Stacks are kept sorted by dir.
#[derive(Debug)]
pub struct ManifestProject {
    root: PathBuf,
    stacks: Vec<Stack>,
    env: HashMap<String, BTreeMap<String, String>>,
    inputs: HashMap<String, Vec<Input>>,
    external: HashMap<String, Vec<String>>,
    backends: Vec<SharingBackend>,
    eval: PathEvaluator,
}

impl ManifestProject {
    /// Searches `start` and its ancestors for a manifest.
    pub fn discover(start: &Path) -> Result<Self> {
        let found = start
            .ancestors()
            .map(|dir| dir.join(MANIFEST_FILE))
            .find(|p| p.is_file());
        match found {
            Some(path) => Self::load(&path),
            None => bail!("no {MANIFEST_FILE} found in {} or its parents", start.display()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::parse(&text, root).with_context(|| format!("loading {}", path.display()))
    }

    pub fn parse(text: &str, root: PathBuf) -> Result<Self> {
        let manifest: Manifest = toml::from_str(text)?;
        Self::from_manifest(manifest, root, PathEvaluator::new())
    }

    /// Uses `eval` for stack environment values instead of the process
    /// environment.
    pub fn with_evaluator(mut self, eval: PathEvaluator) -> Self {
        self.eval = eval;
        self
    }

    fn from_manifest(manifest: Manifest, root: PathBuf, eval: PathEvaluator) -> Result<Self> {
        let mut seen_dirs = HashSet::new();
        let mut seen_ids = HashSet::new();
        let mut backend_names = HashSet::new();

        for backend in &manifest.sharing_backends {
            if !backend_names.insert(backend.name.as_str()) {
                bail!("sharing backend {:?} declared twice", backend.name);
            }
            if backend.command.is_empty() {
                bail!("sharing backend {:?} has an empty command", backend.name);
            }
        }

        let mut project = Self {
            root,
            stacks: Vec::with_capacity(manifest.stacks.len()),
            env: HashMap::new(),
            inputs: HashMap::new(),
            external: HashMap::new(),
            backends: manifest.sharing_backends,
            eval,
        };

        for entry in manifest.stacks {
            let StackEntry {
                stack,
                env,
                inputs,
                external_dependencies,
            } = entry;

            if !stack.dir.starts_with('/') {
                bail!("stack dir {:?} must be a project path starting with /", stack.dir);
            }
            let stack = Stack {
                dir: Stack::new(&stack.dir).dir,
                ..stack
            };
            if !seen_dirs.insert(stack.dir.clone()) {
                bail!("stack {} declared twice", stack.dir);
            }
            if !stack.id.is_empty() && !seen_ids.insert(stack.id.clone()) {
                bail!("stack ID {:?} used by more than one stack", stack.id);
            }

            project.env.insert(stack.dir.clone(), env);
            project.inputs.insert(stack.dir.clone(), inputs);
            project
                .external
                .insert(stack.dir.clone(), external_dependencies);
            project.stacks.push(stack);
        }

        project.stacks.sort_by(|a, b| a.dir.cmp(&b.dir));
        tracing::debug!(stacks = project.stacks.len(), root = %project.root.display(), "manifest loaded");
        Ok(project)
    }
}

impl Project for ManifestProject {
    fn root_dir(&self) -> &Path {
        &self.root
    }

    fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    fn inputs(&self, stack: &Stack) -> Vec<Input> {
        self.inputs.get(&stack.dir).cloned().unwrap_or_default()
    }

    fn sharing_backend(&self, name: &str) -> Option<SharingBackend> {
        self.backends.iter().find(|b| b.name == name).cloned()
    }

    /// Values may reference `${env.NAME}` and `${stack.<field>}`.
    fn stack_env(&self, stack: &Stack) -> Result<Vec<(String, String)>, ProjectError> {
        let Some(env) = self.env.get(&stack.dir) else {
            return Ok(Vec::new());
        };
        env.iter()
            .map(|(key, template)| {
                let value = self.eval.interpolate(stack, template).map_err(|e| {
                    ProjectError::StackEnv {
                        stack: stack.dir.clone(),
                        reason: format!("{key}: {e}"),
                    }
                })?;
                Ok((key.clone(), value))
            })
            .collect()
    }

    fn external_dependencies(&self, stack: &Stack) -> Vec<String> {
        self.external.get(&stack.dir).cloned().unwrap_or_default()
    }
}
