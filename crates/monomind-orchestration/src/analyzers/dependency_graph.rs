//! Repository dependency graph and its read-only query layer

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DependencyEdge, EdgeTarget, Language, Module, ModuleId};
use crate::observer::OrchestrationObserver;

/// Directed graph of module → dependency edges
///
/// Built once by the graph builder and never mutated afterwards; all
/// downstream consumers borrow it read-only.
#[derive(Debug, Clone)]
pub struct RepoGraph {
    /// Repository root the module paths are relative to
    root: PathBuf,

    /// All modules keyed by id
    modules: BTreeMap<ModuleId, Module>,

    /// Adjacency list: every raw dependency of a module, resolved
    edges: BTreeMap<ModuleId, Vec<DependencyEdge>>,

    /// Reverse adjacency over internal edges only
    dependents: HashMap<ModuleId, BTreeSet<ModuleId>>,
}

impl RepoGraph {
    /// Assembles a graph, resolving every raw dependency to an internal or external edge
    pub fn from_modules(
        root: impl Into<PathBuf>,
        modules: impl IntoIterator<Item = Module>,
        observer: &dyn OrchestrationObserver,
    ) -> Self {
        let modules: BTreeMap<ModuleId, Module> =
            modules.into_iter().map(|m| (m.id.clone(), m)).collect();

        let resolver = EdgeResolver::new(&modules);
        let mut edges = BTreeMap::new();
        for module in modules.values() {
            let resolved: Vec<DependencyEdge> = module
                .dependencies
                .iter()
                .map(|raw| resolver.resolve(module, raw, observer))
                .collect();
            edges.insert(module.id.clone(), resolved);
        }

        // Single pass over the adjacency map so dependents_of is a lookup
        let mut dependents: HashMap<ModuleId, BTreeSet<ModuleId>> = HashMap::new();
        for (from, targets) in &edges {
            for target in targets.iter().filter_map(DependencyEdge::internal_module) {
                dependents
                    .entry(target.to_string())
                    .or_default()
                    .insert(from.clone());
            }
        }

        Self {
            root: root.into(),
            modules,
            edges,
            dependents,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Gets a module by id
    pub fn module(&self, id: &str) -> Option<&Module> {
        self.modules.get(id)
    }

    pub fn has_module(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    /// All modules, ordered by id
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn module_ids(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Modules whose directory basename equals `name`
    pub fn modules_named(&self, name: &str) -> Vec<&Module> {
        self.modules.values().filter(|m| m.name == name).collect()
    }

    /// Resolves a module by id, falling back to a unique basename
    pub fn lookup(&self, id_or_name: &str) -> Option<&Module> {
        if let Some(module) = self.modules.get(id_or_name) {
            return Some(module);
        }
        match self.modules_named(id_or_name).as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Number of edges, counting duplicates
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Direct dependencies in scan order, duplicates kept; empty for unknown modules
    pub fn dependencies_of(&self, id: &str) -> &[DependencyEdge] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct internal dependency targets of a module
    pub fn internal_dependencies_of(&self, id: &str) -> BTreeSet<&str> {
        self.dependencies_of(id)
            .iter()
            .filter_map(DependencyEdge::internal_module)
            .collect()
    }

    /// Distinct third-party identifiers a module imports
    pub fn external_dependencies_of(&self, id: &str) -> BTreeSet<&str> {
        self.dependencies_of(id)
            .iter()
            .filter(|e| !e.is_internal())
            .map(|e| e.raw.as_str())
            .collect()
    }

    /// Every module with at least one internal edge pointing at `id`
    pub fn dependents_of(&self, id: &str) -> BTreeSet<&str> {
        self.dependents
            .get(id)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// All modules reachable by following internal dependency edges
    pub fn transitive_dependencies(&self, id: &str) -> BTreeSet<ModuleId> {
        self.closure(id, |current| self.internal_dependencies_of(current))
    }

    /// All modules that transitively depend on `id`
    pub fn transitive_dependents(&self, id: &str) -> BTreeSet<ModuleId> {
        self.closure(id, |current| self.dependents_of(current))
    }

    /// Breadth-first closure that excludes the start unless a cycle leads back to it
    fn closure<'a, F>(&'a self, start: &str, next: F) -> BTreeSet<ModuleId>
    where
        F: Fn(&str) -> BTreeSet<&'a str>,
    {
        let mut reached = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(start.to_string());

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            for neighbor in next(&current) {
                reached.insert(neighbor.to_string());
                if !visited.contains(neighbor) {
                    queue.push_back(neighbor.to_string());
                }
            }
        }

        reached
    }

    /// Checks if one module can reach another through internal dependency edges
    pub fn can_reach(&self, from: &str, to: &str) -> bool {
        from == to || self.transitive_dependencies(from).contains(to)
    }

    /// The set of (dependent, dependency) pairs over internal edges
    pub fn internal_edges(&self) -> BTreeSet<(ModuleId, ModuleId)> {
        self.edges
            .iter()
            .flat_map(|(from, targets)| {
                targets
                    .iter()
                    .filter_map(DependencyEdge::internal_module)
                    .map(move |to| (from.clone(), to.to_string()))
            })
            .collect()
    }

    /// Serializable view for renderers
    pub fn summary(&self) -> GraphSummary {
        let modules = self
            .modules
            .values()
            .map(|m| ModuleSummary {
                id: m.id.clone(),
                name: m.name.clone(),
                language: m.language,
                file_count: m.file_count,
                last_modified: m.last_modified,
                internal_dependencies: self
                    .internal_dependencies_of(&m.id)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                external_dependencies: self
                    .external_dependencies_of(&m.id)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                dependents: self
                    .dependents_of(&m.id)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            })
            .collect();

        GraphSummary {
            root: self.root.clone(),
            internal_edge_count: self.internal_edges().len(),
            modules,
        }
    }
}

/// Flattened graph for renderers and JSON output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub root: PathBuf,
    pub internal_edge_count: usize,
    pub modules: Vec<ModuleSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub id: ModuleId,
    pub name: String,
    pub language: Language,
    pub file_count: usize,
    pub last_modified: Option<DateTime<Utc>>,
    pub internal_dependencies: Vec<ModuleId>,
    pub external_dependencies: Vec<String>,
    pub dependents: Vec<ModuleId>,
}

/// Turns raw import identifiers into internal or external edges
struct EdgeResolver<'a> {
    ids: Vec<&'a str>,
    by_name: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> EdgeResolver<'a> {
    fn new(modules: &'a BTreeMap<ModuleId, Module>) -> Self {
        let mut by_name: HashMap<&str, Vec<&str>> = HashMap::new();
        for module in modules.values() {
            by_name
                .entry(module.name.as_str())
                .or_default()
                .push(module.id.as_str());
        }
        Self {
            ids: modules.keys().map(String::as_str).collect(),
            by_name,
        }
    }

    fn resolve(&self, from: &Module, raw: &str, observer: &dyn OrchestrationObserver) -> DependencyEdge {
        let target = match self.candidates(from, raw) {
            Candidates::One(module) => EdgeTarget::Internal {
                module: module.to_string(),
            },
            Candidates::Many(candidates) => {
                let candidates: Vec<String> = candidates.iter().map(|c| c.to_string()).collect();
                observer.ambiguous_dependency(&from.id, raw, &candidates);
                EdgeTarget::External
            }
            Candidates::None => EdgeTarget::External,
        };

        DependencyEdge {
            raw: raw.to_string(),
            target,
        }
    }

    fn candidates(&self, from: &Module, raw: &str) -> Candidates<'a> {
        let normalized = match from.language {
            Language::Python => raw.replace('.', "/"),
            _ => raw.to_string(),
        };
        let normalized = normalized.trim_end_matches('/');
        let from_id = from.id.as_str();
        let ids = &self.ids;
        let others = move || {
            ids.iter()
                .copied()
                .filter(move |id| *id != from_id && *id != ".")
        };

        // 1. exact module path
        if let Some(id) = others().find(|id| *id == normalized) {
            return Candidates::One(id);
        }

        // 2a. import path ends with a module path, e.g. example.com/mono/libs/auth
        if let Some(id) = others()
            .filter(|id| normalized.ends_with(&format!("/{}", id)))
            .max_by_key(|id| id.len())
        {
            return Candidates::One(id);
        }

        // 2b. module path ends with the import path, e.g. services/billing for billing
        let nested: Vec<&str> = others()
            .filter(|id| id.ends_with(&format!("/{}", normalized)))
            .collect();
        match nested.len() {
            0 => {}
            1 => return Candidates::One(nested[0]),
            _ => return Candidates::Many(nested),
        }

        // 3. unique directory basename
        let basename = normalized.rsplit('/').next().unwrap_or(normalized);
        let named: Vec<&str> = self
            .by_name
            .get(basename)
            .map(|ids| ids.iter().copied().filter(|id| *id != from.id).collect())
            .unwrap_or_default();
        match named.len() {
            0 => Candidates::None,
            1 => Candidates::One(named[0]),
            _ => Candidates::Many(named),
        }
    }
}

enum Candidates<'a> {
    None,
    One(&'a str),
    Many(Vec<&'a str>),
}
