//! Observation hooks for graph construction and scheduling
//!
//! Components never log through a process-wide handle. They receive an
//! `Arc<dyn OrchestrationObserver>` and report events to it; the default
//! [`TracingObserver`] turns those events into structured `tracing` records.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::models::{Language, ModuleOutcome};

/// Receives events from the graph builder and the scheduler
///
/// Every method has an empty default so implementors only override what they
/// care about.
pub trait OrchestrationObserver: Send + Sync {
    /// A directory entry or file could not be read and was skipped
    fn entry_skipped(&self, _path: &Path, _error: &str) {}

    /// A file's language disagrees with the language already recorded for its module
    fn language_conflict(&self, _module: &str, _kept: Language, _ignored: Language, _file: &Path) {}

    /// A raw dependency matched several modules by basename and was left external
    fn ambiguous_dependency(&self, _module: &str, _raw: &str, _candidates: &[String]) {}

    /// The graph builder finished its walk
    fn scan_completed(&self, _modules: usize, _internal_edges: usize, _skipped_entries: usize) {}

    /// A module action was handed to a worker
    fn module_dispatched(&self, _module: &str) {}

    /// A module reached a terminal state
    fn module_finished(&self, _module: &str, _outcome: &ModuleOutcome) {}

    /// The scheduler stopped dispatching new work
    fn dispatch_stopped(&self, _reason: &str) {}
}

/// Observer that forwards every event to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn shared() -> Arc<dyn OrchestrationObserver> {
        Arc::new(TracingObserver)
    }
}

impl OrchestrationObserver for TracingObserver {
    fn entry_skipped(&self, path: &Path, error: &str) {
        warn!(path = %path.display(), error = %error, "Skipping unreadable entry");
    }

    fn language_conflict(&self, module: &str, kept: Language, ignored: Language, file: &Path) {
        warn!(
            module = %module,
            kept = %kept,
            ignored = %ignored,
            file = %file.display(),
            "Mixed-language module, keeping first language"
        );
    }

    fn ambiguous_dependency(&self, module: &str, raw: &str, candidates: &[String]) {
        debug!(
            module = %module,
            dependency = %raw,
            candidates = ?candidates,
            "Ambiguous dependency left external"
        );
    }

    fn scan_completed(&self, modules: usize, internal_edges: usize, skipped_entries: usize) {
        info!(
            modules,
            internal_edges, skipped_entries, "Repository analysis completed"
        );
    }

    fn module_dispatched(&self, module: &str) {
        debug!(module = %module, "Dispatching module action");
    }

    fn module_finished(&self, module: &str, outcome: &ModuleOutcome) {
        match outcome {
            ModuleOutcome::Succeeded => info!(module = %module, "Module succeeded"),
            ModuleOutcome::Failed { reason } => {
                warn!(module = %module, reason = %reason, "Module failed")
            }
            ModuleOutcome::Skipped { reason } => {
                info!(module = %module, reason = %reason, "Module skipped")
            }
        }
    }

    fn dispatch_stopped(&self, reason: &str) {
        warn!(reason = %reason, "No further modules will be dispatched");
    }
}

/// Observer that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl OrchestrationObserver for NullObserver {}
