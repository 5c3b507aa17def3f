//! Execution ordering over the dependency graph
//!
//! Orders a target set (optionally closed over its internal dependencies) with
//! Kahn's algorithm and groups it into waves. Cycle members and their
//! dependents are set aside as blocked; their own dependencies and unrelated
//! modules still run.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::analyzers::RepoGraph;
use crate::error::{OrchestrationError, Result};
use crate::models::ModuleId;

/// A wave of modules whose dependencies all sit in earlier waves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLevel {
    /// Level number (0 is first)
    pub level: usize,

    /// Modules at this level, sorted by id
    pub modules: Vec<ModuleId>,
}

/// Modules that cannot run: cycle members plus everything in the plan that
/// transitively depends on them, grouped by weak connectivity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedComponent {
    /// Each strongly connected group of two or more modules, members sorted
    pub cycles: Vec<Vec<ModuleId>>,

    /// Every module of the component, sorted
    pub modules: Vec<ModuleId>,
}

impl BlockedComponent {
    /// All modules that sit on a cycle in this component
    pub fn cycle_members(&self) -> Vec<ModuleId> {
        let members: BTreeSet<&ModuleId> = self.cycles.iter().flatten().collect();
        members.into_iter().cloned().collect()
    }
}

/// Execution plan for a set of modules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Topological order of the runnable modules, ties broken by module id
    pub order: Vec<ModuleId>,

    /// Waves of the runnable modules
    pub levels: Vec<ExecutionLevel>,

    /// Internal dependencies of each runnable module, restricted to the plan
    pub dependencies: BTreeMap<ModuleId, BTreeSet<ModuleId>>,

    /// Components that were not ordered because they contain a cycle
    pub blocked: Vec<BlockedComponent>,

    /// Runnable plus blocked modules
    pub total_modules: usize,

    /// Largest wave
    pub max_parallelism: usize,
}

impl ExecutionPlan {
    pub fn is_acyclic(&self) -> bool {
        self.blocked.is_empty()
    }

    /// Every detected cycle across all blocked components
    pub fn cycles(&self) -> Vec<Vec<ModuleId>> {
        self.blocked
            .iter()
            .flat_map(|b| b.cycles.iter().cloned())
            .collect()
    }
}

/// Determines execution order and parallelization points
pub struct ExecutionOrderer<'g> {
    graph: &'g RepoGraph,
}

impl<'g> ExecutionOrderer<'g> {
    pub fn new(graph: &'g RepoGraph) -> Self {
        Self { graph }
    }

    /// Resolves the module set to act on
    ///
    /// Every target must exist. With `include_dependencies` the set is closed
    /// over transitive internal dependencies.
    pub fn select<I, S>(&self, targets: I, include_dependencies: bool) -> Result<BTreeSet<ModuleId>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selected = BTreeSet::new();
        for target in targets {
            let target = target.as_ref();
            if !self.graph.has_module(target) {
                return Err(OrchestrationError::ModuleNotFound(target.to_string()));
            }
            if include_dependencies {
                selected.extend(self.graph.transitive_dependencies(target));
            }
            selected.insert(target.to_string());
        }
        Ok(selected)
    }

    /// Creates a plan for the targets
    pub fn plan<I, S>(&self, targets: I, include_dependencies: bool) -> Result<ExecutionPlan>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let nodes = self.select(targets, include_dependencies)?;
        let dependencies: BTreeMap<ModuleId, BTreeSet<ModuleId>> = nodes
            .iter()
            .map(|id| {
                let deps = self
                    .graph
                    .internal_dependencies_of(id)
                    .into_iter()
                    .filter(|dep| nodes.contains(*dep))
                    .map(str::to_string)
                    .collect();
                (id.clone(), deps)
            })
            .collect();

        // Kahn never reaches a cycle member or anything that depends on one,
        // so the leftover set is exactly what the cycles block.
        let first_pass = kahn(&dependencies);
        let blocked_nodes = first_pass.leftover;
        let mut blocked = Vec::new();
        if !blocked_nodes.is_empty() {
            let cycles: Vec<Vec<ModuleId>> = strongly_connected(&dependencies, &blocked_nodes)
                .into_iter()
                .filter(|group| group.len() > 1)
                .collect();

            let blocked_graph: BTreeMap<ModuleId, BTreeSet<ModuleId>> = dependencies
                .iter()
                .filter(|(id, _)| blocked_nodes.contains(*id))
                .map(|(id, deps)| {
                    let deps = deps.iter().filter(|d| blocked_nodes.contains(*d)).cloned().collect();
                    (id.clone(), deps)
                })
                .collect();

            for component in weak_components(&blocked_graph) {
                let component_cycles: Vec<Vec<ModuleId>> = cycles
                    .iter()
                    .filter(|group| component.contains(&group[0]))
                    .cloned()
                    .collect();
                blocked.push(BlockedComponent {
                    cycles: component_cycles,
                    modules: component.into_iter().collect(),
                });
            }
        }

        let runnable: BTreeMap<ModuleId, BTreeSet<ModuleId>> = dependencies
            .into_iter()
            .filter(|(id, _)| !blocked_nodes.contains(id))
            .collect();
        let ordered = kahn(&runnable);

        let mut by_level: BTreeMap<usize, Vec<ModuleId>> = BTreeMap::new();
        for (id, level) in &ordered.depth {
            by_level.entry(*level).or_default().push(id.clone());
        }
        let levels: Vec<ExecutionLevel> = by_level
            .into_iter()
            .map(|(level, modules)| ExecutionLevel { level, modules })
            .collect();
        let max_parallelism = levels.iter().map(|l| l.modules.len()).max().unwrap_or(0);

        Ok(ExecutionPlan {
            order: ordered.order,
            levels,
            total_modules: runnable.len() + blocked_nodes.len(),
            dependencies: runnable,
            blocked,
            max_parallelism,
        })
    }

    /// Strict topological order; fails if the selected set contains any cycle
    pub fn determine_order<I, S>(&self, targets: I, include_dependencies: bool) -> Result<Vec<ModuleId>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let plan = self.plan(targets, include_dependencies)?;
        match plan.blocked.first() {
            Some(component) => Err(OrchestrationError::CircularDependency {
                members: component.cycle_members(),
            }),
            None => Ok(plan.order),
        }
    }
}

struct KahnResult {
    order: Vec<ModuleId>,
    depth: BTreeMap<ModuleId, usize>,
    leftover: BTreeSet<ModuleId>,
}

/// Kahn's algorithm with the smallest ready id dequeued first
fn kahn(dependencies: &BTreeMap<ModuleId, BTreeSet<ModuleId>>) -> KahnResult {
    let mut remaining: HashMap<&str, usize> = dependencies
        .iter()
        .map(|(id, deps)| (id.as_str(), deps.len()))
        .collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for (id, deps) in dependencies {
        for dep in deps {
            dependents.entry(dep.as_str()).or_default().push(id.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(dependencies.len());
    let mut depth: BTreeMap<ModuleId, usize> = BTreeMap::new();

    while let Some(next) = ready.pop_first() {
        let level = dependencies
            .get(next)
            .into_iter()
            .flatten()
            .filter_map(|dep| depth.get(dep))
            .map(|level| level + 1)
            .max()
            .unwrap_or(0);
        depth.insert(next.to_string(), level);
        order.push(next.to_string());

        for dependent in dependents.get(next).into_iter().flatten() {
            if let Some(count) = remaining.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    let leftover = dependencies
        .keys()
        .filter(|id| !depth.contains_key(*id))
        .cloned()
        .collect();

    KahnResult {
        order,
        depth,
        leftover,
    }
}

/// Tarjan's strongly connected components restricted to `nodes`
fn strongly_connected(
    dependencies: &BTreeMap<ModuleId, BTreeSet<ModuleId>>,
    nodes: &BTreeSet<ModuleId>,
) -> Vec<Vec<ModuleId>> {
    let mut tarjan = Tarjan {
        dependencies,
        nodes,
        next_index: 0,
        index: HashMap::new(),
        lowlink: HashMap::new(),
        stack: Vec::new(),
        on_stack: HashSet::new(),
        components: Vec::new(),
    };
    for node in nodes {
        if !tarjan.index.contains_key(node.as_str()) {
            tarjan.visit(node);
        }
    }
    tarjan.components.sort();
    tarjan.components
}

struct Tarjan<'a> {
    dependencies: &'a BTreeMap<ModuleId, BTreeSet<ModuleId>>,
    nodes: &'a BTreeSet<ModuleId>,
    next_index: usize,
    index: HashMap<&'a str, usize>,
    lowlink: HashMap<&'a str, usize>,
    stack: Vec<&'a str>,
    on_stack: HashSet<&'a str>,
    components: Vec<Vec<ModuleId>>,
}

impl<'a> Tarjan<'a> {
    fn visit(&mut self, node: &'a str) {
        self.index.insert(node, self.next_index);
        self.lowlink.insert(node, self.next_index);
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack.insert(node);

        let dependencies = self.dependencies;
        let nodes = self.nodes;
        for dep in dependencies.get(node).into_iter().flatten() {
            if !nodes.contains(dep) {
                continue;
            }
            let dep = dep.as_str();
            let candidate = match self.index.get(dep).copied() {
                None => {
                    self.visit(dep);
                    self.lowlink.get(dep).copied()
                }
                Some(index) if self.on_stack.contains(dep) => Some(index),
                Some(_) => None,
            };
            if let (Some(candidate), Some(low)) = (candidate, self.lowlink.get_mut(node)) {
                *low = (*low).min(candidate);
            }
        }

        if self.lowlink.get(node) == self.index.get(node) {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack.remove(member);
                component.push(member.to_string());
                if member == node {
                    break;
                }
            }
            component.sort();
            self.components.push(component);
        }
    }
}

/// Weakly connected components, each sorted, in order of their smallest id
fn weak_components(dependencies: &BTreeMap<ModuleId, BTreeSet<ModuleId>>) -> Vec<BTreeSet<ModuleId>> {
    let mut neighbors: HashMap<&str, Vec<&str>> = HashMap::new();
    for (id, deps) in dependencies {
        neighbors.entry(id.as_str()).or_default();
        for dep in deps {
            neighbors.entry(id.as_str()).or_default().push(dep.as_str());
            neighbors.entry(dep.as_str()).or_default().push(id.as_str());
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut components = Vec::new();
    for start in dependencies.keys() {
        if !seen.insert(start.as_str()) {
            continue;
        }
        let mut component = BTreeSet::new();
        let mut queue = VecDeque::from([start.as_str()]);
        while let Some(current) = queue.pop_front() {
            component.insert(current.to_string());
            for next in neighbors.get(current).into_iter().flatten() {
                if seen.insert(*next) {
                    queue.push_back(*next);
                }
            }
        }
        components.push(component);
    }
    components
}
