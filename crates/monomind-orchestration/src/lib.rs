//! # monomind-orchestration
//!
//! **Purpose**: Dependency graph, impact analysis and incremental build/test
//! scheduling for polyglot monorepos
//!
//! ## Features
//!
//! - **Graph Construction**: one module per source directory, imports extracted
//!   per language and resolved to internal or external edges
//! - **Impact Analysis**: changed file → owning module → transitive dependents
//!   and their test targets
//! - **Incremental Scheduling**: dependency-ordered execution with a bounded
//!   worker pool, upstream-failure skipping, fail-fast and cancellation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use monomind_orchestration::{
//!     ActionKind, BatchExecutionConfig, BatchExecutor, CommandAction, ImpactAnalyzer,
//!     WorkspaceScanner,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = WorkspaceScanner::new("/path/to/repo").scan()?;
//!
//! let affected = ImpactAnalyzer::new(&graph).affected_modules(["libs/auth/token.py"])?;
//!
//! let action = Arc::new(CommandAction::new(ActionKind::Test, graph.root()));
//! let report = BatchExecutor::new(BatchExecutionConfig::default())
//!     .execute(&graph, &affected, action, CancellationToken::new())
//!     .await?;
//! println!("{} modules tested", report.counts().total);
//! # Ok(())
//! # }
//! ```

pub mod analyzers;
pub mod config;
pub mod error;
pub mod managers;
pub mod models;
pub mod observer;

pub use analyzers::{
    build_graph, ExplicitTestMapping, GraphSummary, IdentityTestMapping, IgnoreRules,
    ImpactAnalyzer, ImportExtractor, ImportStrategy, RepoGraph, TestTargetMapping, WalkControl,
    WorkspaceScanner,
};
pub use config::{ConfigManager, ExecutionSettings, MonoConfig};
pub use error::{OrchestrationError, Result};
pub use managers::{
    schedule, ActionKind, ActionOutcome, BatchExecutionConfig, BatchExecutor, CommandAction,
    CommandSpec, ExecutionOrderer, ExecutionPlan, FnAction, ModuleAction, NoopHooks, RunHooks,
};
pub use models::{
    DependencyEdge, EdgeTarget, ImpactResult, Language, Module, ModuleId, ModuleOutcome,
    ModuleRunRecord, RunCounts, RunReport, SkipReason,
};
pub use observer::{NullObserver, OrchestrationObserver, TracingObserver};
