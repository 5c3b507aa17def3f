//! Ordering and execution of per-module actions

pub mod action_runner;
pub mod batch_executor;
pub mod execution_ordering;

pub use action_runner::{ActionKind, CommandAction, CommandSpec, Invocation, WorkingDir};
pub use batch_executor::{
    schedule, ActionOutcome, BatchExecutionConfig, BatchExecutor, FnAction, ModuleAction, NoopHooks,
    RunHooks,
};
pub use execution_ordering::{BlockedComponent, ExecutionLevel, ExecutionOrderer, ExecutionPlan};
