//! Unit tests for BatchExecutor
//! Tests ordering, concurrency limits, failure propagation, cycles and cancellation

use async_trait::async_trait;
use monomind_orchestration::{
    ActionOutcome, BatchExecutionConfig, BatchExecutor, Language, Module, ModuleAction,
    ModuleOutcome, NullObserver, OrchestrationError, RepoGraph, Result, RunHooks, RunReport,
    SkipReason,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn create_test_module(id: &str, deps: &[&str]) -> Module {
    Module {
        id: id.to_string(),
        name: id.to_string(),
        path: PathBuf::from(id),
        language: Language::Python,
        dependencies: deps.iter().map(|d| d.to_string()).collect(),
        last_modified: None,
        file_count: 1,
    }
}

fn graph(modules: Vec<Module>) -> RepoGraph {
    RepoGraph::from_modules("/repo", modules, &NullObserver)
}

fn executor(config: BatchExecutionConfig) -> BatchExecutor {
    BatchExecutor::new(config).with_observer(Arc::new(NullObserver))
}

#[derive(Default)]
struct TestOperation {
    executed: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    started: Mutex<Vec<String>>,
    should_fail_on: HashSet<String>,
    delay: Option<Duration>,
}

impl TestOperation {
    fn failing_on(names: &[&str]) -> Self {
        Self {
            should_fail_on: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModuleAction for TestOperation {
    fn name(&self) -> &str {
        "build"
    }

    async fn run(&self, module: &Module) -> ActionOutcome {
        self.started.lock().unwrap().push(module.id.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.executed.fetch_add(1, Ordering::SeqCst);

        if self.should_fail_on.contains(&module.id) {
            ActionOutcome::failed(format!("Intentional failure on {}", module.id))
        } else {
            ActionOutcome::succeeded()
        }
    }
}

fn assert_every_module_once(report: &RunReport, expected: &[&str]) {
    let mut seen: Vec<&str> = report.completion_order();
    seen.sort();
    let mut expected = expected.to_vec();
    expected.sort();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_single_concurrency_runs_one_at_a_time() {
    let graph = graph(vec![
        create_test_module("a", &[]),
        create_test_module("b", &[]),
        create_test_module("c", &[]),
    ]);
    let operation = Arc::new(TestOperation::default().with_delay(Duration::from_millis(5)));
    let config = BatchExecutionConfig {
        max_concurrent: 1,
        ..BatchExecutionConfig::default()
    };

    let report = executor(config)
        .execute(&graph, ["a", "b", "c"], operation.clone(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.counts().succeeded, 3);
    assert_eq!(operation.peak.load(Ordering::SeqCst), 1);
    // Each entry finishes before the next is dispatched
    for pair in report.entries.windows(2) {
        assert!(pair[0].finished_at < pair[1].dispatched_at.unwrap());
    }
}

#[tokio::test]
async fn test_diamond_respects_dependencies() {
    let graph = graph(vec![
        create_test_module("base", &[]),
        create_test_module("left", &["base"]),
        create_test_module("right", &["base"]),
        create_test_module("top", &["left", "right"]),
    ]);
    let operation = Arc::new(TestOperation::default().with_delay(Duration::from_millis(2)));

    let report = executor(BatchExecutionConfig::default())
        .execute(&graph, ["top"], operation.clone(), CancellationToken::new())
        .await
        .unwrap();

    assert_every_module_once(&report, &["base", "left", "right", "top"]);
    for (dep, module) in [("base", "left"), ("base", "right"), ("left", "top"), ("right", "top")] {
        let dep = report.entry(dep).unwrap();
        let module = report.entry(module).unwrap();
        assert!(dep.finished_at < module.dispatched_at.unwrap());
    }
    assert_eq!(operation.started()[0], "base");
    assert_eq!(operation.started()[3], "top");
}

#[tokio::test]
async fn test_failure_isolated_to_downstream() {
    let graph = graph(vec![
        create_test_module("core", &[]),
        create_test_module("api", &["core"]),
        create_test_module("cli", &["api"]),
        create_test_module("docs", &[]),
    ]);
    let operation = Arc::new(TestOperation::failing_on(&["core"]));

    let report = executor(BatchExecutionConfig::default())
        .execute(&graph, ["cli", "docs"], operation.clone(), CancellationToken::new())
        .await
        .unwrap();

    assert_every_module_once(&report, &["api", "cli", "core", "docs"]);
    assert!(report.outcome("core").unwrap().is_failure());
    assert!(report.outcome("docs").unwrap().is_success());
    assert_eq!(
        report.outcome("api"),
        Some(&ModuleOutcome::Skipped {
            reason: SkipReason::UpstreamFailure {
                upstream: "core".to_string()
            }
        })
    );
    // Skips propagate through skipped modules too
    assert_eq!(
        report.outcome("cli"),
        Some(&ModuleOutcome::Skipped {
            reason: SkipReason::UpstreamFailure {
                upstream: "api".to_string()
            }
        })
    );
    assert_eq!(operation.executed.load(Ordering::SeqCst), 2);
    assert!(!report.cancelled);
}

#[tokio::test]
async fn test_fail_fast_stops_dispatch() {
    let graph = graph(vec![
        create_test_module("a", &[]),
        create_test_module("b", &["a"]),
        create_test_module("c", &["b"]),
    ]);
    let operation = Arc::new(TestOperation::failing_on(&["a"]));
    let config = BatchExecutionConfig {
        fail_fast: true,
        continue_on_upstream_failure: true,
        ..BatchExecutionConfig::default()
    };

    let report = executor(config)
        .execute(&graph, ["c"], operation.clone(), CancellationToken::new())
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_every_module_once(&report, &["a", "b", "c"]);
    assert!(report.outcome("a").unwrap().is_failure());
    for module in ["b", "c"] {
        assert_eq!(
            report.outcome(module),
            Some(&ModuleOutcome::Skipped {
                reason: SkipReason::Cancelled
            })
        );
    }
    assert_eq!(operation.executed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cycle_fails_only_its_subgraph() {
    let graph = graph(vec![
        create_test_module("a", &["b"]),
        create_test_module("b", &["a"]),
        create_test_module("x", &[]),
        create_test_module("y", &["x"]),
    ]);
    let operation = Arc::new(TestOperation::default());

    let report = executor(BatchExecutionConfig::default())
        .execute(&graph, ["a", "y"], operation.clone(), CancellationToken::new())
        .await
        .unwrap();

    assert_every_module_once(&report, &["a", "b", "x", "y"]);
    assert!(report.outcome("x").unwrap().is_success());
    assert!(report.outcome("y").unwrap().is_success());
    assert!(report.outcome("a").unwrap().is_skipped());
    assert_eq!(report.cycles, vec![vec!["a".to_string(), "b".to_string()]]);

    let errors = report.cycle_errors();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        OrchestrationError::CircularDependency { members } if members == &["a", "b"]
    ));
}

#[tokio::test]
async fn test_cycle_does_not_block_shared_dependency() {
    let graph = graph(vec![
        create_test_module("a", &["b"]),
        create_test_module("b", &["a", "core"]),
        create_test_module("c", &["core"]),
        create_test_module("core", &[]),
    ]);
    let operation = Arc::new(TestOperation::default());

    let report = executor(BatchExecutionConfig::default())
        .execute(&graph, ["a", "c"], operation.clone(), CancellationToken::new())
        .await
        .unwrap();

    assert_every_module_once(&report, &["a", "b", "c", "core"]);
    assert!(report.outcome("core").unwrap().is_success());
    assert!(report.outcome("c").unwrap().is_success());
    for module in ["a", "b"] {
        assert_eq!(
            report.outcome(module),
            Some(&ModuleOutcome::Skipped {
                reason: SkipReason::CyclicDependency {
                    members: vec!["a".to_string(), "b".to_string()]
                }
            })
        );
    }
    assert_eq!(operation.started(), vec!["core", "c"]);
}

#[tokio::test]
async fn test_cancellation_marks_unstarted_modules() {
    let graph = graph(vec![
        create_test_module("first", &[]),
        create_test_module("second", &["first"]),
        create_test_module("third", &["second"]),
    ]);
    let cancel = CancellationToken::new();
    let operation = Arc::new(TestOperation::default().with_delay(Duration::from_millis(50)));

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let report = executor(BatchExecutionConfig::default())
        .execute(&graph, ["third"], operation.clone(), cancel)
        .await
        .unwrap();

    assert!(report.cancelled);
    // The in-flight action was allowed to finish
    assert!(report.outcome("first").unwrap().is_success());
    for module in ["second", "third"] {
        assert_eq!(
            report.outcome(module),
            Some(&ModuleOutcome::Skipped {
                reason: SkipReason::Cancelled
            })
        );
    }
}

#[tokio::test]
async fn test_already_cancelled_runs_nothing() {
    let graph = graph(vec![create_test_module("a", &[]), create_test_module("b", &[])]);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let operation = Arc::new(TestOperation::default());

    let report = executor(BatchExecutionConfig::default())
        .execute(&graph, ["a", "b"], operation.clone(), cancel)
        .await
        .unwrap();

    assert_eq!(report.counts().skipped, 2);
    assert_eq!(operation.executed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_without_dependencies_only_targets_run() {
    let graph = graph(vec![
        create_test_module("lib", &[]),
        create_test_module("app", &["lib"]),
    ]);
    let config = BatchExecutionConfig {
        include_dependencies: false,
        ..BatchExecutionConfig::default()
    };

    let report = executor(config)
        .execute(&graph, ["app"], Arc::new(TestOperation::default()), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.completion_order(), vec!["app"]);
}

#[tokio::test]
async fn test_unknown_target_fails_up_front() {
    let graph = graph(vec![create_test_module("a", &[])]);
    let operation = Arc::new(TestOperation::default());

    let result = executor(BatchExecutionConfig::default())
        .execute(&graph, ["ghost"], operation.clone(), CancellationToken::new())
        .await;

    assert!(matches!(result, Err(OrchestrationError::ModuleNotFound(_))));
    assert_eq!(operation.executed.load(Ordering::SeqCst), 0);
}

struct PanickingOperation {
    panic_on: &'static str,
    inner: TestOperation,
}

#[async_trait]
impl ModuleAction for PanickingOperation {
    fn name(&self) -> &str {
        "build"
    }

    async fn run(&self, module: &Module) -> ActionOutcome {
        if module.id == self.panic_on {
            panic!("action blew up on {}", module.id);
        }
        self.inner.run(module).await
    }
}

#[tokio::test]
async fn test_panicking_action_only_fails_its_subgraph() {
    let graph = graph(vec![
        create_test_module("core", &[]),
        create_test_module("api", &["core"]),
        create_test_module("docs", &[]),
    ]);
    let operation = Arc::new(PanickingOperation {
        panic_on: "core",
        inner: TestOperation::default(),
    });

    let report = executor(BatchExecutionConfig::default())
        .execute(&graph, ["api", "docs"], operation.clone(), CancellationToken::new())
        .await
        .unwrap();

    assert_every_module_once(&report, &["api", "core", "docs"]);
    assert_eq!(
        report.outcome("core"),
        Some(&ModuleOutcome::Failed {
            reason: "action panicked".to_string()
        })
    );
    assert_eq!(
        report.outcome("api"),
        Some(&ModuleOutcome::Skipped {
            reason: SkipReason::UpstreamFailure {
                upstream: "core".to_string()
            }
        })
    );
    assert!(report.outcome("docs").unwrap().is_success());
    assert_eq!(operation.inner.started(), vec!["docs"]);
}

#[derive(Default)]
struct RecordingHooks {
    pre: Mutex<Vec<String>>,
    post: AtomicUsize,
}

#[async_trait]
impl RunHooks for RecordingHooks {
    async fn pre_run(&self, action: &str, modules: &[String]) -> Result<()> {
        let mut pre = self.pre.lock().unwrap();
        pre.push(action.to_string());
        pre.extend(modules.iter().cloned());
        Ok(())
    }

    async fn post_run(&self, report: &RunReport) -> Result<()> {
        self.post.fetch_add(report.entries.len(), Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_hooks_wrap_the_run() {
    let graph = graph(vec![create_test_module("a", &[]), create_test_module("b", &["a"])]);
    let hooks = Arc::new(RecordingHooks::default());

    executor(BatchExecutionConfig::default())
        .with_hooks(hooks.clone())
        .execute(&graph, ["b"], Arc::new(TestOperation::default()), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(*hooks.pre.lock().unwrap(), vec!["build", "a", "b"]);
    assert_eq!(hooks.post.load(Ordering::SeqCst), 2);
}
