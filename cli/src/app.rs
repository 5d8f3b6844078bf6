use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use stackflow_core::api::{
    add_wanted_of, apply_dependency_filters, build_run_dag, AppConfig, CancelSignals, CliError,
    DependencyGraph, ErrorKind, Orchestrator, Project, RunAllOptions, RunError, Stack, StackRun,
    StackRunTask, TagQuery,
};
use stackflow_core::stack::path;
use stackflow_plugins::{ManifestProject, PathEvaluator, TracingHooks};

use crate::commands::cli::{ListArgs, RunArgs, SelectArgs};

/// The loaded project plus where in it the command was started.
pub struct Workspace {
    pub project: Arc<ManifestProject>,
    pub eval: Arc<PathEvaluator>,
    /// Project path of the working directory; selection starts here.
    pub cwd: String,
}

impl Workspace {
    pub fn open(dir: &Path) -> Result<Self, CliError> {
        let project = ManifestProject::discover(dir)
            .with_context(|| format!("opening project from {}", dir.display()))
            .map_err(|e| CliError::Config(format!("{e:#}")))?;
        let rel = dir.strip_prefix(project.root_dir()).unwrap_or(Path::new(""));
        Ok(Self::new(project, &rel.to_string_lossy()))
    }

    pub fn new(project: ManifestProject, cwd: &str) -> Self {
        Self {
            project: Arc::new(project),
            eval: Arc::new(PathEvaluator::new()),
            cwd: path::normalize(&cwd.replace('\\', "/")),
        }
    }

    /// Stacks below the working directory, narrowed by tags, widened by
    /// wants, then passed through the dependency filters.
    pub fn select(&self, args: &SelectArgs) -> Result<Vec<Stack>, CliError> {
        let filters = args.dependency_filters();
        filters.validate()?;

        let tags = args.tags.as_deref().map(TagQuery::parse);
        let no_tags = args.no_tags.as_deref().map(TagQuery::parse);
        let mut selection: Vec<Stack> = self
            .project
            .stacks()
            .iter()
            .filter(|s| path::is_within(&s.dir, &self.cwd))
            .filter(|s| tags.as_ref().map(|q| q.matches(s)).unwrap_or(true))
            .filter(|s| !no_tags.as_ref().map(|q| q.matches(s)).unwrap_or(false))
            .cloned()
            .collect();

        if !args.ignore_wants {
            selection = add_wanted_of(self.project.as_ref(), &selection);
        }

        let selected = apply_dependency_filters(
            self.project.as_ref(),
            self.eval.as_ref(),
            &filters,
            &selection,
        )?;
        tracing::debug!(cwd = %self.cwd, stacks = selected.len(), "stacks selected");
        Ok(selected)
    }

    /// `stacks` in the order a sequential run would visit them.
    pub fn execution_order(&self, stacks: Vec<Stack>) -> Result<Vec<Stack>, CliError> {
        let data = DependencyGraph::build(self.project.as_ref(), self.eval.as_ref(), &stacks)
            .map_err(RunError::from)?;
        let dag = build_run_dag(self.project.as_ref(), stacks, |s| s, Some(&data))
            .map_err(RunError::from)?;
        Ok(dag
            .order()
            .iter()
            .filter_map(|dir| dag.node(dir).cloned())
            .collect())
    }
}

pub async fn run(ws: &Workspace, cfg: &AppConfig, args: RunArgs) -> Result<i32, CliError> {
    let stacks = ws.select(&args.select)?;
    if stacks.is_empty() {
        tracing::warn!(cwd = %ws.cwd, "no stacks selected");
        return Ok(0);
    }

    let task = StackRunTask {
        enable_sharing: args.enable_sharing,
        mock_on_fail: args.mock_on_fail,
        cloud_sync_drift_status: args.detect_drift,
        cloud_sync_preview: args.plan_file.is_some(),
        cloud_plan_file: args.plan_file.clone().unwrap_or_default(),
        ..StackRunTask::new(args.cmd.clone())
    };
    let runs: Vec<StackRun> = stacks
        .into_iter()
        .map(|s| StackRun::new(s, vec![task.clone()]))
        .collect();

    let opts = RunAllOptions {
        quiet: args.quiet || cfg.run.quiet,
        dry_run: args.dry_run,
        reverse: args.reverse || cfg.run.reverse,
        continue_on_error: args.continue_on_error || cfg.run.continue_on_error,
        parallel: args.parallel.unwrap_or(cfg.run.parallel),
        ..Default::default()
    };

    let hooks = Arc::new(TracingHooks::new().with_output_capture(args.capture_output));
    let orch = Orchestrator::new(
        ws.project.clone(),
        ws.eval.clone(),
        hooks.clone(),
        CancelSignals::with_kill_threshold(cfg.run.kill_after_interrupts),
    );

    let res = orch.run_all(runs, &opts).await;
    let summary = hooks.summary();
    tracing::info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        canceled = summary.canceled,
        "run finished"
    );
    res?;
    Ok(0)
}

pub fn list(ws: &Workspace, args: ListArgs) -> Result<i32, CliError> {
    let stacks = ws.execution_order(ws.select(&args.select)?)?;
    for stack in stacks {
        if args.ids && !stack.id.is_empty() {
            println!("{} ({})", stack.dir, stack.id);
        } else {
            println!("{}", stack.dir);
        }
    }
    Ok(0)
}

/// Prints `consumer -> provider` edges. Cycles are reported, not fatal to
/// the listing, but make the exit code 2.
pub fn graph(ws: &Workspace) -> Result<i32, CliError> {
    let graph = DependencyGraph::build(ws.project.as_ref(), ws.eval.as_ref(), ws.project.stacks())
        .map_err(RunError::from)?;

    for dir in graph.stacks() {
        let deps = graph.direct_dependencies(dir);
        if deps.is_empty() {
            println!("{dir}");
        }
        for dep in deps {
            println!("{dir} -> {dep}");
        }
    }

    let cycles = graph.detect_cycles();
    for cycle in &cycles {
        tracing::warn!(cycle = %cycle.join(" -> "), "dependency cycle");
        eprintln!("cycle detected: {}", cycle.join(" -> "));
    }
    Ok(if cycles.is_empty() { 0 } else { 2 })
}

pub fn resolve_dir(chdir: Option<PathBuf>) -> Result<PathBuf, CliError> {
    let cwd = std::env::current_dir()?;
    Ok(match chdir {
        Some(dir) if dir.is_absolute() => dir,
        Some(dir) => cwd.join(dir),
        None => cwd,
    })
}

// 0: success
// 1: a stack failed
// 2: invalid filters or dependency cycles
// 11: config error
// 50: internal/uncategorized
// 130: canceled by interrupt
pub fn exit_code_for_error(e: &CliError) -> i32 {
    match e.kind() {
        ErrorKind::ExecutionFailed | ErrorKind::CommandNotExecuted | ErrorKind::Evaluation => 1,
        ErrorKind::ExecutionCanceled => 130,
        ErrorKind::CycleDetected | ErrorKind::InvalidFilter => 2,
        ErrorKind::Config => 11,
        ErrorKind::Internal => 50,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stackflow_core::api::{DagError, FilterError, StackError, TaskError};

    const MANIFEST: &str = r#"
[[stack]]
dir = "/infra/network"
id = "net"
tags = ["core"]

[[stack]]
dir = "/infra/app"
after = ["/infra/network"]
wants = ["/monitoring"]

[[stack.input]]
name = "vpc"
backend = "default"
from_stack_id = "\"net\""
value = "outputs.vpc"

[[stack]]
dir = "/monitoring"
tags = ["ops"]

[[stack]]
dir = "/other"
"#;

    fn workspace(cwd: &str) -> Workspace {
        let project = ManifestProject::parse(MANIFEST, PathBuf::from("/repo")).unwrap();
        Workspace::new(project, cwd)
    }

    fn dirs(stacks: &[Stack]) -> Vec<&str> {
        stacks.iter().map(|s| s.dir.as_str()).collect()
    }

    #[test]
    fn test_select_from_subdirectory_pulls_wanted() {
        let ws = workspace("infra");
        let got = ws.select(&SelectArgs::default()).unwrap();
        assert_eq!(dirs(&got), vec!["/infra/app", "/infra/network", "/monitoring"]);

        let no_wants = SelectArgs {
            ignore_wants: true,
            ..Default::default()
        };
        let got = ws.select(&no_wants).unwrap();
        assert_eq!(dirs(&got), vec!["/infra/app", "/infra/network"]);
    }

    #[test]
    fn test_select_by_tags() {
        let ws = workspace("/");
        let args = SelectArgs {
            tags: Some("core,ops".into()),
            ..Default::default()
        };
        assert_eq!(dirs(&ws.select(&args).unwrap()), vec!["/infra/network", "/monitoring"]);

        let args = SelectArgs {
            no_tags: Some("core".into()),
            ignore_wants: true,
            ..Default::default()
        };
        assert_eq!(dirs(&ws.select(&args).unwrap()), vec!["/infra/app", "/monitoring", "/other"]);
    }

    #[test]
    fn test_select_with_dependency_filter() {
        let ws = workspace("/");
        let args = SelectArgs {
            tags: Some("core".into()),
            include_direct_dependents: true,
            ..Default::default()
        };
        assert_eq!(dirs(&ws.select(&args).unwrap()), vec!["/infra/app", "/infra/network"]);
    }

    #[test]
    fn test_conflicting_filters_fail_before_selection() {
        let ws = workspace("/");
        let args = SelectArgs {
            only_direct_dependencies: true,
            only_all_dependents: true,
            ..Default::default()
        };
        let err = ws.select(&args).unwrap_err();
        assert_eq!(exit_code_for_error(&err), 2);
    }

    #[test]
    fn test_execution_order() {
        let ws = workspace("/");
        let stacks = ws.select(&SelectArgs::default()).unwrap();
        let ordered = ws.execution_order(stacks).unwrap();
        assert_eq!(
            dirs(&ordered),
            vec!["/infra/network", "/monitoring", "/infra/app", "/other"]
        );
    }

    #[test]
    fn test_open_reports_the_failing_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(stackflow_plugins::MANIFEST_FILE), "[[stack]]\ndir = 3\n").unwrap();

        let err = Workspace::open(dir.path()).err().unwrap();
        let msg = err.to_string();
        assert!(msg.contains("opening project from"), "{msg}");
        assert!(msg.contains("stackflow.toml"), "{msg}");
        assert_eq!(exit_code_for_error(&err), 11);
    }

    #[test]
    fn test_exit_codes() {
        let failed = TaskError::Failed {
            stack: "/a".into(),
            cmd: "false".into(),
            reason: "exit code 1".into(),
        };
        let canceled = TaskError::Canceled {
            stack: "/a".into(),
            cmd: "false".into(),
            reason: "interrupted".into(),
        };
        let stacks = |errors: Vec<TaskError>| {
            CliError::Run(RunError::Stacks(vec![StackError {
                stack: "/a".into(),
                errors,
            }]))
        };

        assert_eq!(exit_code_for_error(&stacks(vec![failed.clone()])), 1);
        assert_eq!(exit_code_for_error(&stacks(vec![canceled.clone()])), 130);
        assert_eq!(exit_code_for_error(&stacks(vec![canceled, failed])), 1);
        assert_eq!(
            exit_code_for_error(&CliError::Run(RunError::Dag(DagError::CycleDetected {
                reason: "/a -> /a".into()
            }))),
            2
        );
        assert_eq!(
            exit_code_for_error(&CliError::Filter(FilterError::DependencyNotFound("x".into()))),
            11
        );
        assert_eq!(exit_code_for_error(&CliError::Config("bad".into())), 11);
    }
}
