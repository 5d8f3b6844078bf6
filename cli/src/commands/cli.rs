use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use stackflow_core::api::DependencyFilters;

#[derive(Parser, Debug)]
#[command(name = "stackflow", version, about = "Run commands across infrastructure stacks in dependency order")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Change to this directory before doing anything.
    #[arg(short = 'C', long, global = true)]
    pub chdir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command in every selected stack.
    Run(RunArgs),
    /// Print the selected stacks in execution order.
    List(ListArgs),
    /// Print data dependencies between stacks and report cycles.
    Graph,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Maximum number of stacks running at the same time.
    #[arg(long, short = 'j')]
    pub parallel: Option<usize>,

    /// Run in reverse dependency order.
    #[arg(long)]
    pub reverse: bool,

    /// Keep going when a stack fails.
    #[arg(long)]
    pub continue_on_error: bool,

    /// Print what would run without running it.
    #[arg(long)]
    pub dry_run: bool,

    /// Do not print progress lines.
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Resolve stack inputs from other stacks' outputs.
    #[arg(long)]
    pub enable_sharing: bool,

    /// Use input mocks when outputs cannot be read.
    #[arg(long, requires = "enable_sharing")]
    pub mock_on_fail: bool,

    /// The command reports drift: exit code 2 means changes detected.
    #[arg(long)]
    pub detect_drift: bool,

    /// Plan file produced by a preview; exit code 2 means changes detected.
    #[arg(long)]
    pub plan_file: Option<String>,

    /// Forward command output to the log as well.
    #[arg(long)]
    pub capture_output: bool,

    /// Command and arguments to run.
    #[arg(last = true, required = true)]
    pub cmd: Vec<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Print stack IDs next to their paths.
    #[arg(long)]
    pub ids: bool,
}

/// Stack selection shared by `run` and `list`.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct SelectArgs {
    /// Only stacks matching the query (`a:b` needs both tags, `a,b` either).
    #[arg(long)]
    pub tags: Option<String>,

    /// Drop stacks matching the query.
    #[arg(long)]
    pub no_tags: Option<String>,

    /// Do not pull in stacks named by `wants`/`wanted_by`.
    #[arg(long)]
    pub ignore_wants: bool,

    #[arg(long, help_heading = "Dependency filters")]
    pub only_direct_dependencies: bool,
    #[arg(long, help_heading = "Dependency filters")]
    pub only_all_dependencies: bool,
    #[arg(long, help_heading = "Dependency filters")]
    pub only_direct_dependents: bool,
    #[arg(long, help_heading = "Dependency filters")]
    pub only_all_dependents: bool,

    #[arg(long, help_heading = "Dependency filters")]
    pub include_direct_dependencies: bool,
    #[arg(long, help_heading = "Dependency filters")]
    pub include_all_dependencies: bool,
    #[arg(long, help_heading = "Dependency filters")]
    pub include_direct_dependents: bool,
    #[arg(long, help_heading = "Dependency filters")]
    pub include_all_dependents: bool,

    #[arg(long, help_heading = "Dependency filters")]
    pub exclude_direct_dependencies: bool,
    #[arg(long, help_heading = "Dependency filters")]
    pub exclude_all_dependencies: bool,
    #[arg(long, help_heading = "Dependency filters")]
    pub exclude_direct_dependents: bool,
    #[arg(long, help_heading = "Dependency filters")]
    pub exclude_all_dependents: bool,

    /// Deprecated form of --include-direct-dependencies limited to output sharing.
    #[arg(long, help_heading = "Dependency filters")]
    pub include_output_dependencies: bool,
    /// Deprecated form of --only-direct-dependencies limited to output sharing.
    #[arg(long, help_heading = "Dependency filters")]
    pub only_output_dependencies: bool,
}

impl SelectArgs {
    pub fn dependency_filters(&self) -> DependencyFilters {
        DependencyFilters {
            only_direct_dependencies: self.only_direct_dependencies,
            only_all_dependencies: self.only_all_dependencies,
            only_direct_dependents: self.only_direct_dependents,
            only_all_dependents: self.only_all_dependents,
            include_direct_dependencies: self.include_direct_dependencies,
            include_all_dependencies: self.include_all_dependencies,
            include_direct_dependents: self.include_direct_dependents,
            include_all_dependents: self.include_all_dependents,
            exclude_direct_dependencies: self.exclude_direct_dependencies,
            exclude_all_dependencies: self.exclude_all_dependencies,
            exclude_direct_dependents: self.exclude_direct_dependents,
            exclude_all_dependents: self.exclude_all_dependents,
            include_output_dependencies: self.include_output_dependencies,
            only_output_dependencies: self.only_output_dependencies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_run() {
        let args = Args::try_parse_from([
            "stackflow",
            "run",
            "--parallel",
            "4",
            "--tags",
            "core",
            "--include-all-dependencies",
            "--",
            "terraform",
            "apply",
            "-auto-approve",
        ])
        .unwrap();
        let Commands::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.parallel, Some(4));
        assert_eq!(run.cmd, vec!["terraform", "apply", "-auto-approve"]);
        assert_eq!(run.select.tags.as_deref(), Some("core"));
        assert!(run.select.dependency_filters().include_all_dependencies);
    }

    #[test]
    fn test_run_requires_command() {
        assert!(Args::try_parse_from(["stackflow", "run"]).is_err());
    }

    #[test]
    fn test_mock_on_fail_requires_sharing() {
        assert!(Args::try_parse_from(["stackflow", "run", "--mock-on-fail", "--", "true"]).is_err());
    }

    #[test]
    fn test_parse_list_with_chdir() {
        let args = Args::try_parse_from(["stackflow", "-C", "infra", "list", "--ids"]).unwrap();
        assert_eq!(args.chdir, Some(PathBuf::from("infra")));
        assert!(matches!(args.command, Commands::List(ListArgs { ids: true, .. })));
    }
}
