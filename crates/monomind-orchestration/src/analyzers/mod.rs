//! Graph construction and read-only analysis

pub mod dependency_graph;
pub mod impact_analyzer;
pub mod import_extractor;
pub mod language;
pub mod workspace_scanner;

pub use dependency_graph::{GraphSummary, ModuleSummary, RepoGraph};
pub use impact_analyzer::{ExplicitTestMapping, IdentityTestMapping, ImpactAnalyzer, TestTargetMapping};
pub use import_extractor::{
    EcmaScriptStrategy, GoStrategy, ImportExtractor, ImportStrategy, PythonStrategy, ScanState,
};
pub use language::classify;
pub use workspace_scanner::{
    build_graph, walk_tree, IgnoreRules, WalkControl, WalkStats, WorkspaceScanner,
};
