//! Incremental execution of module actions in dependency order
//!
//! The executor plans the target set, then runs a coordinator loop that hands
//! eligible modules to a bounded pool of tokio tasks. A module becomes eligible
//! once every one of its internal dependencies has reached a terminal state.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::analyzers::RepoGraph;
use crate::error::{OrchestrationError, Result};
use crate::managers::execution_ordering::{ExecutionOrderer, ExecutionPlan};
use crate::models::{Module, ModuleId, ModuleOutcome, ModuleRunRecord, RunReport, SkipReason};
use crate::observer::{OrchestrationObserver, TracingObserver};

/// Result of running an action against one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// `None` on success, otherwise the failure reason
    pub failure: Option<String>,

    /// Captured tool output
    pub output: Option<String>,
}

impl ActionOutcome {
    pub fn succeeded() -> Self {
        Self {
            failure: None,
            output: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            output: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    fn into_parts(self) -> (ModuleOutcome, Option<String>) {
        let outcome = match self.failure {
            None => ModuleOutcome::Succeeded,
            Some(reason) => ModuleOutcome::Failed { reason },
        };
        (outcome, self.output)
    }
}

/// Per-module work supplied by the caller (build, test, ...)
#[async_trait]
pub trait ModuleAction: Send + Sync {
    /// Short name recorded in the run report
    fn name(&self) -> &str;

    async fn run(&self, module: &Module) -> ActionOutcome;
}

/// Adapts an async function into a [`ModuleAction`]
pub struct FnAction<F> {
    name: String,
    func: F,
}

impl<F, Fut> FnAction<F>
where
    F: Fn(Module) -> Fut + Send + Sync,
    Fut: Future<Output = ActionOutcome> + Send,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F, Fut> ModuleAction for FnAction<F>
where
    F: Fn(Module) -> Fut + Send + Sync,
    Fut: Future<Output = ActionOutcome> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, module: &Module) -> ActionOutcome {
        (self.func)(module.clone()).await
    }
}

/// Hooks invoked around a run
#[async_trait]
pub trait RunHooks: Send + Sync {
    /// Called once the plan is known, before any module is dispatched.
    /// An error aborts the run.
    async fn pre_run(&self, _action: &str, _modules: &[ModuleId]) -> Result<()> {
        Ok(())
    }

    /// Called with the finished report; errors are logged only
    async fn post_run(&self, _report: &RunReport) -> Result<()> {
        Ok(())
    }
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl RunHooks for NoopHooks {}

/// Configuration for batch execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchExecutionConfig {
    /// Maximum number of concurrent module actions (at least 1)
    pub max_concurrent: usize,

    /// Stop dispatching after the first failure
    pub fail_fast: bool,

    /// Attempt modules even when a dependency failed or was skipped
    pub continue_on_upstream_failure: bool,

    /// Close the target set over its transitive internal dependencies
    pub include_dependencies: bool,
}

impl Default for BatchExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            fail_fast: false,
            continue_on_upstream_failure: false,
            include_dependencies: true,
        }
    }
}

/// Executes an action across modules in dependency order
pub struct BatchExecutor {
    config: BatchExecutionConfig,
    observer: Arc<dyn OrchestrationObserver>,
    hooks: Arc<dyn RunHooks>,
}

impl BatchExecutor {
    pub fn new(config: BatchExecutionConfig) -> Self {
        Self {
            config,
            observer: TracingObserver::shared(),
            hooks: Arc::new(NoopHooks),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn OrchestrationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn RunHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &BatchExecutionConfig {
        &self.config
    }

    /// Runs `action` for the targets and returns a report covering every planned module
    ///
    /// # Arguments
    ///
    /// * `graph` - Repository graph, shared read-only
    /// * `targets` - Module ids to act on; unknown ids fail before anything runs
    /// * `action` - Per-module work
    /// * `cancel` - Stops dispatch when triggered; in-flight actions finish
    ///
    /// # Returns
    ///
    /// A `RunReport` whose entries appear in the order modules reached a
    /// terminal state. Modules in a dependency cycle are reported as skipped
    /// and listed in `cycles`.
    pub async fn execute<I, S>(
        &self,
        graph: &RepoGraph,
        targets: I,
        action: Arc<dyn ModuleAction>,
        cancel: CancellationToken,
    ) -> Result<RunReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.config.max_concurrent == 0 {
            return Err(OrchestrationError::ConfigurationError(
                "max_concurrent must be at least 1".to_string(),
            ));
        }

        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let plan = ExecutionOrderer::new(graph).plan(targets, self.config.include_dependencies)?;

        let mut planned: Vec<ModuleId> = plan.order.clone();
        planned.extend(plan.blocked.iter().flat_map(|b| b.modules.iter().cloned()));
        self.hooks.pre_run(action.name(), &planned).await?;

        info!(
            run_id = %run_id,
            action = %action.name(),
            modules = plan.total_modules,
            max_concurrent = self.config.max_concurrent,
            "Starting run"
        );

        let ticks = Arc::new(AtomicU64::new(0));
        let entries = Arc::new(Mutex::new(Vec::with_capacity(plan.total_modules)));
        let sink = RecordSink {
            entries: Arc::clone(&entries),
            ticks: Arc::clone(&ticks),
            observer: Arc::clone(&self.observer),
        };

        for component in &plan.blocked {
            let members = component.cycle_members();
            for module in &component.modules {
                let reason = SkipReason::CyclicDependency {
                    members: members.clone(),
                };
                sink.skip(module, reason).await;
            }
        }

        let cancelled = self.dispatch(graph, &plan, &action, &sink, &cancel).await;

        let report = RunReport {
            run_id,
            action: action.name().to_string(),
            entries: std::mem::take(&mut *entries.lock().await),
            cycles: plan.cycles(),
            started_at,
            finished_at: Utc::now(),
            cancelled,
        };

        let counts = report.counts();
        info!(
            run_id = %report.run_id,
            succeeded = counts.succeeded,
            failed = counts.failed,
            skipped = counts.skipped,
            "Run finished"
        );

        if let Err(e) = self.hooks.post_run(&report).await {
            warn!(error = %e, "Post-run hook failed");
        }

        Ok(report)
    }

    /// Coordinator loop; returns whether dispatch was stopped early
    async fn dispatch(
        &self,
        graph: &RepoGraph,
        plan: &ExecutionPlan,
        action: &Arc<dyn ModuleAction>,
        sink: &RecordSink,
        cancel: &CancellationToken,
    ) -> bool {
        let mut state = DispatchState::new(plan);
        let mut workers: JoinSet<(ModuleId, bool)> = JoinSet::new();
        let mut stopped = false;

        loop {
            if !stopped && cancel.is_cancelled() {
                stopped = true;
                self.observer.dispatch_stopped("cancelled");
            }

            if !stopped {
                let mut deferred = Vec::new();
                while let Some(id) = state.ready.pop_first() {
                    if !self.config.continue_on_upstream_failure {
                        if let Some(upstream) = state.failed_upstream(&id) {
                            sink.skip(&id, SkipReason::UpstreamFailure { upstream }).await;
                            state.complete(&id, false);
                            continue;
                        }
                    }

                    if workers.len() >= self.config.max_concurrent {
                        deferred.push(id);
                        continue;
                    }

                    let Some(module) = graph.module(&id) else {
                        sink.finish(&id, ActionOutcome::failed("module missing from graph"), None, None)
                            .await;
                        state.complete(&id, false);
                        continue;
                    };

                    let dispatched_at = sink.ticks.fetch_add(1, Ordering::SeqCst);
                    self.observer.module_dispatched(&id);
                    state.dispatched.insert(id.clone());
                    workers.spawn(run_module(
                        module.clone(),
                        Arc::clone(action),
                        sink.clone(),
                        dispatched_at,
                    ));
                }
                state.ready.extend(deferred);
            }

            if workers.is_empty() {
                break;
            }

            tokio::select! {
                joined = workers.join_next() => match joined {
                    Some(Ok((id, ok))) => {
                        state.complete(&id, ok);
                        if !ok && self.config.fail_fast && !stopped {
                            stopped = true;
                            self.observer.dispatch_stopped("fail-fast");
                        }
                    }
                    Some(Err(e)) => warn!(error = %e, action = %action.name(), "Worker task ended abnormally"),
                    None => {}
                },
                _ = cancel.cancelled(), if !stopped => {
                    stopped = true;
                    self.observer.dispatch_stopped("cancelled");
                }
            }
        }

        for id in &plan.order {
            if state.terminal.contains_key(id.as_str()) {
                continue;
            }
            if !state.dispatched.contains(id) {
                sink.skip(id, SkipReason::Cancelled).await;
            } else if !sink.contains(id).await {
                let outcome = ActionOutcome::failed("worker task ended abnormally");
                sink.finish(id, outcome, None, None).await;
            }
        }

        stopped
    }
}

/// Runs `action` with the default configuration and a fresh cancellation token
pub async fn schedule<I, S>(
    graph: &RepoGraph,
    targets: I,
    action: Arc<dyn ModuleAction>,
    max_concurrent: usize,
) -> Result<RunReport>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let config = BatchExecutionConfig {
        max_concurrent,
        ..BatchExecutionConfig::default()
    };
    BatchExecutor::new(config)
        .execute(graph, targets, action, CancellationToken::new())
        .await
}

async fn run_module(
    module: Module,
    action: Arc<dyn ModuleAction>,
    sink: RecordSink,
    dispatched_at: u64,
) -> (ModuleId, bool) {
    let started = Instant::now();
    let outcome = AssertUnwindSafe(action.run(&module))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| ActionOutcome::failed("action panicked"));
    let ok = outcome.is_success();
    sink.finish(&module.id, outcome, Some(started.elapsed()), Some(dispatched_at))
        .await;
    (module.id, ok)
}

/// Shared report accumulator; ticks are taken under the lock so entry order matches tick order
#[derive(Clone)]
struct RecordSink {
    entries: Arc<Mutex<Vec<ModuleRunRecord>>>,
    ticks: Arc<AtomicU64>,
    observer: Arc<dyn OrchestrationObserver>,
}

impl RecordSink {
    async fn contains(&self, module: &str) -> bool {
        self.entries.lock().await.iter().any(|e| e.module == module)
    }

    async fn skip(&self, module: &str, reason: SkipReason) {
        let outcome = ModuleOutcome::Skipped { reason };
        self.push(module, outcome, None, None, None).await;
    }

    async fn finish(
        &self,
        module: &str,
        outcome: ActionOutcome,
        duration: Option<std::time::Duration>,
        dispatched_at: Option<u64>,
    ) {
        let (outcome, output) = outcome.into_parts();
        self.push(module, outcome, output, duration, dispatched_at).await;
    }

    async fn push(
        &self,
        module: &str,
        outcome: ModuleOutcome,
        output: Option<String>,
        duration: Option<std::time::Duration>,
        dispatched_at: Option<u64>,
    ) {
        self.observer.module_finished(module, &outcome);
        let mut entries = self.entries.lock().await;
        let finished_at = self.ticks.fetch_add(1, Ordering::SeqCst);
        entries.push(ModuleRunRecord {
            module: module.to_string(),
            outcome,
            output,
            duration,
            dispatched_at,
            finished_at,
        });
    }
}

/// Coordinator-side bookkeeping; only the coordinator touches it
struct DispatchState<'p> {
    dependencies: &'p std::collections::BTreeMap<ModuleId, BTreeSet<ModuleId>>,
    dependents: HashMap<&'p str, Vec<&'p str>>,
    pending: HashMap<&'p str, usize>,
    terminal: HashMap<String, bool>,
    dispatched: BTreeSet<ModuleId>,
    ready: BTreeSet<ModuleId>,
}

impl<'p> DispatchState<'p> {
    fn new(plan: &'p ExecutionPlan) -> Self {
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for (id, deps) in &plan.dependencies {
            for dep in deps {
                dependents.entry(dep.as_str()).or_default().push(id.as_str());
            }
        }
        let pending: HashMap<&str, usize> = plan
            .dependencies
            .iter()
            .map(|(id, deps)| (id.as_str(), deps.len()))
            .collect();
        let ready = plan
            .dependencies
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(id, _)| id.clone())
            .collect();

        Self {
            dependencies: &plan.dependencies,
            dependents,
            pending,
            terminal: HashMap::new(),
            dispatched: BTreeSet::new(),
            ready,
        }
    }

    /// First dependency (by id) that did not succeed
    fn failed_upstream(&self, id: &str) -> Option<ModuleId> {
        self.dependencies
            .get(id)?
            .iter()
            .find(|dep| self.terminal.get(dep.as_str()) != Some(&true))
            .cloned()
    }

    /// Marks `id` terminal and releases dependents whose dependencies are all terminal
    fn complete(&mut self, id: &str, ok: bool) {
        self.dispatched.remove(id);
        self.terminal.insert(id.to_string(), ok);
        for dependent in self.dependents.get(id).into_iter().flatten() {
            if let Some(count) = self.pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    self.ready.insert(dependent.to_string());
                }
            }
        }
    }
}
