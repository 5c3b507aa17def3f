// Build or test modules in dependency order

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use monomind_orchestration::{
    ActionKind, BatchExecutor, ExecutionOrderer, ExecutionSettings, ImpactAnalyzer, ModuleAction,
    ModuleId, RepoGraph, RunReport, TracingObserver,
};
use tracing::{debug, info};

use super::{print_json, Command, CommandContext};
use crate::error::{CliError, CliResult};
use crate::output::render_report;
use crate::progress::{create_progress_bar, ProgressObserver};

/// Flags that override the configured execution settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Only act on modules affected by these files
    pub changed: Vec<PathBuf>,
    pub jobs: Option<usize>,
    pub fail_fast: bool,
    pub keep_going: bool,
    pub dry_run: bool,
    pub no_deps: bool,
    pub json: bool,
}

impl RunOptions {
    /// Configured settings with command-line flags applied on top
    pub fn apply(&self, settings: &ExecutionSettings) -> ExecutionSettings {
        let mut settings = settings.clone();
        if let Some(jobs) = self.jobs {
            settings.max_concurrent = jobs;
        }
        settings.fail_fast |= self.fail_fast;
        settings.continue_on_upstream_failure |= self.keep_going;
        settings.dry_run |= self.dry_run;
        if self.no_deps {
            settings.include_dependencies = false;
        }
        settings
    }
}

/// `mono build` and `mono test`
pub struct RunCommand {
    pub kind: ActionKind,
    pub options: RunOptions,
}

impl RunCommand {
    pub fn new(kind: ActionKind, options: RunOptions) -> Self {
        Self { kind, options }
    }

    /// Every module, or the union of modules affected by `--changed`
    fn targets(&self, graph: &RepoGraph) -> CliResult<BTreeSet<ModuleId>> {
        if self.options.changed.is_empty() {
            return Ok(graph.module_ids().map(str::to_string).collect());
        }
        let affected = ImpactAnalyzer::new(graph).affected_modules(&self.options.changed)?;
        Ok(affected)
    }

    /// Runs `action` over the targets and returns the report
    pub async fn run_with(
        &self,
        context: &CommandContext,
        graph: &RepoGraph,
        targets: &BTreeSet<ModuleId>,
        settings: &ExecutionSettings,
        action: Arc<dyn ModuleAction>,
    ) -> CliResult<RunReport> {
        let config = settings.batch_config();
        let planned = ExecutionOrderer::new(graph)
            .select(targets, config.include_dependencies)?
            .len();

        let observer = if context.quiet || self.options.json {
            Arc::new(ProgressObserver::hidden())
        } else {
            ProgressObserver::shared(create_progress_bar(planned as u64, self.kind.as_str()))
        };

        let report = BatchExecutor::new(config)
            .with_observer(observer.clone())
            .execute(graph, targets, action, context.cancel.clone())
            .await;
        observer.finish();
        Ok(report?)
    }
}

#[async_trait::async_trait]
impl Command for RunCommand {
    async fn execute(&self, context: &CommandContext) -> CliResult<()> {
        let settings = self.options.apply(context.config.settings(self.kind));
        if settings.max_concurrent == 0 {
            return Err(CliError::InvalidArgument {
                message: "--jobs must be at least 1".to_string(),
            });
        }

        let graph = context.scan(TracingObserver::shared()).await?;
        let targets = self.targets(&graph)?;
        if targets.is_empty() {
            info!(action = %self.kind, "No modules to run");
            if self.options.json {
                return print_json(&Vec::<ModuleId>::new());
            }
            if !context.quiet {
                crate::output::print_info("Nothing to do");
            }
            return Ok(());
        }
        debug!(action = %self.kind, targets = ?targets, "Resolved targets");

        let action = Arc::new(settings.command_action(self.kind, &context.root)?);
        let report = self.run_with(context, &graph, &targets, &settings, action).await?;

        if self.options.json {
            print_json(&report)?;
        } else {
            println!("{}", render_report(&context.style(), &report));
        }

        let counts = report.counts();
        if report.is_success() {
            Ok(())
        } else {
            Err(CliError::RunFailed {
                action: report.action.clone(),
                failed: counts.failed,
                skipped: counts.skipped,
            })
        }
    }
}
