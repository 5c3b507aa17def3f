//! Data model shared by the graph builder, impact analyzer and scheduler

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Module identity: repo-relative directory path with `/` separators (`.` for the root)
pub type ModuleId = String;

/// Languages the graph builder understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    JavaScript,
    TypeScript,
    Python,
    Unsupported,
}

impl Language {
    /// Every language that has an import extraction strategy
    pub const SUPPORTED: [Language; 4] = [
        Language::Go,
        Language::JavaScript,
        Language::TypeScript,
        Language::Python,
    ];

    /// Converts to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Go => "go",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Python => "python",
            Language::Unsupported => "unsupported",
        }
    }

    /// Parses a language tag, returning `Unsupported` for unknown tags
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "go" | "golang" => Language::Go,
            "javascript" | "js" => Language::JavaScript,
            "typescript" | "ts" => Language::TypeScript,
            "python" | "py" => Language::Python,
            _ => Language::Unsupported,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Language::Unsupported)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of compilable/testable code: one directory holding recognized source files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Repo-relative path, used as the module's identity
    pub id: ModuleId,

    /// Directory basename; not unique across a repository
    pub name: String,

    /// Repo-relative directory path
    pub path: PathBuf,

    /// Language of the first source file seen in the directory
    pub language: Language,

    /// Raw imported identifiers from every file, in scan order, duplicates kept
    pub dependencies: Vec<String>,

    /// Latest modification time among the module's files
    pub last_modified: Option<DateTime<Utc>>,

    /// Number of source files that contributed to this module
    pub file_count: usize,
}

/// Where a dependency edge points
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EdgeTarget {
    /// The identifier resolved to a module in this repository
    Internal { module: ModuleId },
    /// Third-party or otherwise unresolved identifier
    External,
}

/// One outgoing dependency of a module
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// The identifier as written in the import statement
    pub raw: String,
    pub target: EdgeTarget,
}

impl DependencyEdge {
    pub fn internal_module(&self) -> Option<&str> {
        match &self.target {
            EdgeTarget::Internal { module } => Some(module.as_str()),
            EdgeTarget::External => None,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.internal_module().is_some()
    }
}

/// Outcome of analysing a single changed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactResult {
    /// The path as supplied by the caller
    pub changed_file: PathBuf,

    /// Module that owns the changed file
    pub owning_module: ModuleId,

    /// Owning module first, then transitive dependents in breadth-first order
    pub affected_modules: Vec<ModuleId>,

    /// Test targets of every affected module, sorted and de-duplicated
    pub affected_tests: Vec<String>,
}

impl ImpactResult {
    pub fn is_affected(&self, module: &str) -> bool {
        self.affected_modules.iter().any(|m| m == module)
    }
}

/// Why a module was not attempted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// A direct dependency failed or was itself skipped
    UpstreamFailure { upstream: ModuleId },
    /// Cancellation or fail-fast stopped dispatch before the module started
    Cancelled,
    /// The module sits in a dependency component that contains a cycle
    CyclicDependency { members: Vec<ModuleId> },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UpstreamFailure { upstream } => {
                write!(f, "upstream failure ({})", upstream)
            }
            SkipReason::Cancelled => f.write_str("cancelled"),
            SkipReason::CyclicDependency { members } => {
                write!(f, "cyclic dependency ({})", members.join(", "))
            }
        }
    }
}

/// Terminal state of one scheduled module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModuleOutcome {
    Succeeded,
    Failed { reason: String },
    Skipped { reason: SkipReason },
}

impl ModuleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ModuleOutcome::Succeeded)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ModuleOutcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ModuleOutcome::Skipped { .. })
    }
}

impl fmt::Display for ModuleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleOutcome::Succeeded => f.write_str("succeeded"),
            ModuleOutcome::Failed { reason } => write!(f, "failed: {}", reason),
            ModuleOutcome::Skipped { reason } => write!(f, "skipped: {}", reason),
        }
    }
}

/// One entry of a run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRunRecord {
    pub module: ModuleId,
    pub outcome: ModuleOutcome,

    /// Captured tool output, if the action produced any
    pub output: Option<String>,

    /// Wall-clock time spent in the action; `None` when never dispatched
    pub duration: Option<Duration>,

    /// Logical tick at which the action was dispatched
    pub dispatched_at: Option<u64>,

    /// Logical tick at which the module reached its terminal state
    pub finished_at: u64,
}

/// Aggregate counts over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Ordered record of per-module outcomes for one build or test run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique identifier of the run
    pub run_id: String,

    /// Name of the action that was run (e.g. "build", "test")
    pub action: String,

    /// Entries in the order modules reached a terminal state
    pub entries: Vec<ModuleRunRecord>,

    /// Cycles that prevented part of the target set from running
    pub cycles: Vec<Vec<ModuleId>>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Whether the run was cancelled (externally or by fail-fast)
    pub cancelled: bool,
}

impl RunReport {
    pub fn counts(&self) -> RunCounts {
        let mut counts = RunCounts {
            total: self.entries.len(),
            ..RunCounts::default()
        };
        for entry in &self.entries {
            match entry.outcome {
                ModuleOutcome::Succeeded => counts.succeeded += 1,
                ModuleOutcome::Failed { .. } => counts.failed += 1,
                ModuleOutcome::Skipped { .. } => counts.skipped += 1,
            }
        }
        counts
    }

    /// True when every module succeeded
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|e| e.outcome.is_success())
    }

    pub fn entry(&self, module: &str) -> Option<&ModuleRunRecord> {
        self.entries.iter().find(|e| e.module == module)
    }

    pub fn outcome(&self, module: &str) -> Option<&ModuleOutcome> {
        self.entry(module).map(|e| &e.outcome)
    }

    /// Modules in the order they reached a terminal state
    pub fn completion_order(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.module.as_str()).collect()
    }

    /// One `CircularDependency` error per detected cycle
    pub fn cycle_errors(&self) -> Vec<crate::error::OrchestrationError> {
        self.cycles
            .iter()
            .map(|members| crate::error::OrchestrationError::CircularDependency {
                members: members.clone(),
            })
            .collect()
    }
}
