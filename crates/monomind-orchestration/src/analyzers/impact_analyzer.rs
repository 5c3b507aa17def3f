//! Impact analysis for changed files

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::analyzers::dependency_graph::RepoGraph;
use crate::error::{OrchestrationError, Result};
use crate::models::{ImpactResult, Module, ModuleId};

/// Relation from a module to the test targets that cover it
pub trait TestTargetMapping: Send + Sync {
    fn test_targets(&self, module: &Module) -> Vec<String>;
}

/// Each module's own directory is its test target
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTestMapping;

impl TestTargetMapping for IdentityTestMapping {
    fn test_targets(&self, module: &Module) -> Vec<String> {
        vec![module.id.clone()]
    }
}

/// Explicit module → targets table, falling back to identity for unmapped modules
#[derive(Debug, Default, Clone)]
pub struct ExplicitTestMapping {
    targets: BTreeMap<ModuleId, Vec<String>>,
}

impl ExplicitTestMapping {
    pub fn new(targets: BTreeMap<ModuleId, Vec<String>>) -> Self {
        Self { targets }
    }

    pub fn insert(&mut self, module: impl Into<ModuleId>, targets: Vec<String>) {
        self.targets.insert(module.into(), targets);
    }
}

impl TestTargetMapping for ExplicitTestMapping {
    fn test_targets(&self, module: &Module) -> Vec<String> {
        match self.targets.get(&module.id) {
            Some(targets) => targets.clone(),
            None => IdentityTestMapping.test_targets(module),
        }
    }
}

/// Maps changed files to the modules and tests they affect
pub struct ImpactAnalyzer<'g> {
    graph: &'g RepoGraph,
    tests: Arc<dyn TestTargetMapping>,
}

impl<'g> ImpactAnalyzer<'g> {
    /// Creates an analyzer using the identity test mapping
    pub fn new(graph: &'g RepoGraph) -> Self {
        Self {
            graph,
            tests: Arc::new(IdentityTestMapping),
        }
    }

    pub fn with_test_mapping(mut self, tests: Arc<dyn TestTargetMapping>) -> Self {
        self.tests = tests;
        self
    }

    /// Finds the module whose path is the longest component-wise prefix of `path`
    ///
    /// Relative paths are taken as repo-relative; absolute paths must live under
    /// the graph root.
    pub fn owning_module(&self, path: &Path) -> Option<&'g Module> {
        let parts = self.relative_components(path)?;
        (0..=parts.len()).rev().find_map(|len| {
            let id = if len == 0 {
                ".".to_string()
            } else {
                parts[..len].join("/")
            };
            self.graph.module(&id)
        })
    }

    /// Analyzes the impact of one changed file
    ///
    /// # Returns
    ///
    /// The owning module followed by its transitive dependents in breadth-first
    /// order, plus the sorted test targets of all of them.
    pub fn analyze(&self, changed_file: impl AsRef<Path>) -> Result<ImpactResult> {
        let changed_file = changed_file.as_ref();
        let owner = self.owning_module(changed_file).ok_or_else(|| {
            OrchestrationError::UnresolvedModule {
                path: changed_file.to_path_buf(),
            }
        })?;

        let affected_modules = self.affected_from(&owner.id);
        let affected_tests: BTreeSet<String> = affected_modules
            .iter()
            .filter_map(|id| self.graph.module(id))
            .flat_map(|module| self.tests.test_targets(module))
            .collect();

        debug!(
            file = %changed_file.display(),
            owner = %owner.id,
            affected = affected_modules.len(),
            "Impact analysed"
        );

        Ok(ImpactResult {
            changed_file: changed_file.to_path_buf(),
            owning_module: owner.id.clone(),
            affected_modules,
            affected_tests: affected_tests.into_iter().collect(),
        })
    }

    /// Analyzes each path in turn, failing on the first unresolved one
    pub fn analyze_files<I, P>(&self, changed_files: I) -> Result<Vec<ImpactResult>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        changed_files.into_iter().map(|p| self.analyze(p)).collect()
    }

    /// Union of affected modules over several changed files
    pub fn affected_modules<I, P>(&self, changed_files: I) -> Result<BTreeSet<ModuleId>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut union = BTreeSet::new();
        for result in self.analyze_files(changed_files)? {
            union.extend(result.affected_modules);
        }
        Ok(union)
    }

    /// Breadth-first walk over dependents starting at `start`, each module once
    fn affected_from(&self, start: &str) -> Vec<ModuleId> {
        let mut affected = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        visited.insert(start.to_string());
        queue.push_back(start.to_string());

        while let Some(current) = queue.pop_front() {
            for dependent in self.graph.dependents_of(&current) {
                if visited.insert(dependent.to_string()) {
                    queue.push_back(dependent.to_string());
                }
            }
            affected.push(current);
        }

        affected
    }

    /// Lexically normalised repo-relative components, `None` if outside the root
    fn relative_components(&self, path: &Path) -> Option<Vec<String>> {
        let relative: PathBuf = if path.is_absolute() {
            match path.strip_prefix(self.graph.root()) {
                Ok(rest) => rest.to_path_buf(),
                Err(_) => {
                    let root = self.graph.root().canonicalize().ok()?;
                    path.strip_prefix(&root).ok()?.to_path_buf()
                }
            }
        } else {
            path.to_path_buf()
        };

        let mut parts: Vec<String> = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                Component::ParentDir => {
                    parts.pop()?;
                }
                Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(parts)
    }
}
