use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::Instrument;

use crate::error::{ErrorKind, RunError, StackError, TaskError};
use crate::eval::EvalContext;
use crate::executor::{build_run_dag, Scheduler};
use crate::graph::DependencyGraph;
use crate::stack::{Project, Stack};

use super::env::{self, Environ};
use super::hooks::RunHooks;
use super::log_sync::LogSyncer;
use super::process::{self, ProcessSpec};
use super::sharing::{InputResolver, OutputsCache};
use super::signals::{spawn_interrupt_watcher, CancelSignals};
use super::types::{LogChannel, RunAllOptions, RunResult, StackCloudRun, StackRun, StackRunTask};

/// Drives every `StackRun` of a command through the scheduler.
pub struct Orchestrator {
    project: Arc<dyn Project>,
    eval: Arc<dyn EvalContext>,
    hooks: Arc<dyn RunHooks>,
    signals: CancelSignals,
}

impl Orchestrator {
    pub fn new(
        project: Arc<dyn Project>,
        eval: Arc<dyn EvalContext>,
        hooks: Arc<dyn RunHooks>,
        signals: CancelSignals,
    ) -> Self {
        Self {
            project,
            eval,
            hooks,
            signals,
        }
    }

    pub fn signals(&self) -> &CancelSignals {
        &self.signals
    }

    /// Runs all `runs` in dependency order.
    ///
    /// Nothing starts unless the DAG is valid and every stack environment
    /// loads. Errors of every failed stack are returned together.
    pub async fn run_all(&self, runs: Vec<StackRun>, opts: &RunAllOptions) -> Result<(), RunError> {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("run_all", run_id = %run_id, stacks = runs.len());
        self.run_all_inner(runs, opts).instrument(span).await
    }

    async fn run_all_inner(&self, runs: Vec<StackRun>, opts: &RunAllOptions) -> Result<(), RunError> {
        let stacks: Vec<Stack> = runs.iter().map(|r| r.stack.clone()).collect();
        let data = DependencyGraph::build(self.project.as_ref(), self.eval.as_ref(), &stacks)?;
        let dag = build_run_dag(self.project.as_ref(), runs, |r| &r.stack, Some(&data))?;
        let envs = env::load_all_stack_envs(self.project.as_ref(), &stacks)?;

        tracing::info!(
            stacks = dag.len(),
            parallel = opts.parallel,
            reverse = opts.reverse,
            dry_run = opts.dry_run,
            "starting run"
        );

        let ctx = StackRunner {
            orch: self,
            opts,
            envs,
            base_env: env::inherited(),
            cache: OutputsCache::new(),
        };
        let errors: Mutex<Vec<StackError>> = Mutex::new(Vec::new());

        let scheduler = Scheduler::new(
            dag,
            opts.parallel,
            opts.reverse,
            self.signals.stop_scheduling().clone(),
        );
        let watcher = opts
            .handle_interrupts
            .then(|| spawn_interrupt_watcher(self.signals.clone()));

        let res = scheduler
            .run(|run: StackRun| {
                let (ctx, errors) = (&ctx, &errors);
                async move {
                    let Err(err) = ctx.run_stack(run).await else {
                        return Ok(());
                    };
                    tracing::error!(stack = %err.stack, error.kind = %err.kind(), "stack failed");
                    errors
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(err.clone());
                    if opts.continue_on_error {
                        Ok(())
                    } else {
                        Err(err)
                    }
                }
            })
            .await;

        if let Some(handle) = watcher {
            handle.abort();
        }

        let errors = errors.into_inner().unwrap_or_else(|e| e.into_inner());
        if !errors.is_empty() {
            return Err(RunError::Stacks(errors));
        }
        res.map_err(|e| RunError::Stacks(vec![e]))
    }
}

/// Per-run state shared by every stack visit.
struct StackRunner<'a> {
    orch: &'a Orchestrator,
    opts: &'a RunAllOptions,
    envs: HashMap<String, Environ>,
    base_env: Environ,
    cache: OutputsCache,
}

impl StackRunner<'_> {
    async fn run_stack(&self, run: StackRun) -> Result<(), StackError> {
        let stack = &run.stack;
        let opts = self.opts;
        let hooks = &self.orch.hooks;
        let stop = self.orch.signals.stop_scheduling();

        let stack_env = env::overlay(
            &self.base_env,
            self.envs.get(&stack.dir).map(Vec::as_slice).unwrap_or_default(),
        );
        let mut errors = Vec::new();

        for (idx, task) in run.tasks.iter().enumerate() {
            let mut cloud_run = StackCloudRun {
                stack: stack.clone(),
                task: task.clone(),
                env: stack_env.clone(),
            };

            if stop.is_cancelled() {
                let err = TaskError::Canceled {
                    stack: stack.dir.clone(),
                    cmd: task.cmd_string(),
                    reason: "execution canceled by CTRL-C".into(),
                };
                tracing::debug!(stack = %stack.dir, cmd = %task.cmd_string(), "skipping task, scheduling stopped");
                hooks.after(&cloud_run, &RunResult::not_started(-1), Some(&err));
                errors.push(err);
                continue;
            }

            if !opts.script_run {
                self.print(&format!("{} Entering stack in {}", self.prefix(), stack.dir));
            }

            if task.enable_sharing {
                let resolver = InputResolver {
                    project: self.orch.project.as_ref(),
                    eval: self.orch.eval.as_ref(),
                    cache: &self.cache,
                    kill: self.orch.signals.kill(),
                };
                match resolver.resolve(stack, task.mock_on_fail).await {
                    Ok(vars) => cloud_run.env = env::overlay(&cloud_run.env, &vars),
                    Err(e) => {
                        let (stack_dir, cmd, reason) = (stack.dir.clone(), task.cmd_string(), e.to_string());
                        let err = match e.kind() {
                            ErrorKind::ExecutionCanceled => TaskError::Canceled {
                                stack: stack_dir,
                                cmd,
                                reason,
                            },
                            _ => TaskError::NotExecuted {
                                stack: stack_dir,
                                cmd,
                                reason,
                            },
                        };
                        tracing::error!(stack = %stack.dir, error = %e, "resolving inputs");
                        hooks.after(&cloud_run, &RunResult::not_started(-1), Some(&err));
                        errors.push(err);
                        if opts.continue_on_error {
                            continue;
                        }
                        self.report_skipped_sync_task(&run, idx);
                        break;
                    }
                }
            }

            hooks.before(&cloud_run);
            self.print(&self.command_line(stack, task));

            if opts.dry_run {
                continue;
            }

            let syncer = hooks.log_sync_condition(task, &run).then(|| {
                let hooks = Arc::clone(hooks);
                let run = run.clone();
                LogSyncer::start(move |logs| hooks.sync_logs(&run, &logs))
            });

            let job = ProcessSpec {
                stack: &stack.dir,
                cmd: &task.cmd,
                dir: self.orch.project.host_dir(stack),
                env: &cloud_run.env,
                stdin: opts.stdin,
                stdout: opts.stdout.clone(),
                stderr: opts.stderr.clone(),
                log_tx: syncer.as_ref().and_then(LogSyncer::sender),
            };
            let (result, mut err) = process::execute(job, self.orch.signals.kill()).await;

            if let Some(syncer) = syncer {
                syncer.wait().await;
            }

            if err.is_none() && !task.is_success_exit(result.exit_code) {
                err = Some(TaskError::Failed {
                    stack: stack.dir.clone(),
                    cmd: task.cmd_string(),
                    reason: format!("exit code {}", result.exit_code),
                });
            }
            tracing::info!(
                stack = %stack.dir,
                cmd = %task.cmd_string(),
                exit_code = result.exit_code,
                ok = err.is_none(),
                "task finished"
            );
            hooks.after(&cloud_run, &result, err.as_ref());

            if let Some(err) = err {
                errors.push(err);
                if !opts.continue_on_error {
                    self.report_skipped_sync_task(&run, idx);
                    break;
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(StackError {
                stack: stack.dir.clone(),
                errors,
            })
        }
    }

    /// A sync task that will never run because an earlier task failed still
    /// gets a failed result.
    fn report_skipped_sync_task(&self, run: &StackRun, failed_idx: usize) {
        let Some(sync_idx) = run.sync_task_index else {
            return;
        };
        if failed_idx >= sync_idx {
            return;
        }
        let Some(task) = run.tasks.get(sync_idx) else {
            return;
        };

        let cloud_run = StackCloudRun {
            stack: run.stack.clone(),
            task: task.clone(),
            env: Vec::new(),
        };
        let err = TaskError::Failed {
            stack: run.stack.dir.clone(),
            cmd: task.cmd_string(),
            reason: format!("skipped because task {failed_idx} failed"),
        };
        self.orch.hooks.after(&cloud_run, &RunResult::not_started(1), Some(&err));
    }

    fn prefix(&self) -> &'static str {
        if self.opts.dry_run {
            "stackflow (dry-run):"
        } else {
            "stackflow:"
        }
    }

    fn command_line(&self, stack: &Stack, task: &StackRunTask) -> String {
        if self.opts.script_run {
            format!(
                "{} (script:{} job:{}.{})> {}",
                stack.dir,
                task.script_idx,
                task.script_job_idx,
                task.script_cmd_idx,
                task.cmd_string()
            )
        } else {
            format!("{} Executing command \"{}\"", self.prefix(), task.cmd_string())
        }
    }

    fn print(&self, line: &str) {
        if !self.opts.quiet {
            self.opts.stderr.println(LogChannel::Stderr, line);
        }
    }
}
