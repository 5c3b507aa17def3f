//! Workspace scanning and graph construction
//!
//! The scanner walks the repository once, groups recognized source files into
//! one module per directory, extracts each file's imports and hands the result
//! to [`RepoGraph::from_modules`] for edge resolution.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::analyzers::dependency_graph::RepoGraph;
use crate::analyzers::import_extractor::ImportExtractor;
use crate::analyzers::language::classify;
use crate::error::{OrchestrationError, Result};
use crate::models::{Language, Module, ModuleId};
use crate::observer::{OrchestrationObserver, TracingObserver};

/// Directory names skipped when no other rules are configured
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    "vendor",
    "target",
    "build",
    "dist",
    "__pycache__",
    ".venv",
];

/// Directory names whose whole subtree is skipped during the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRules {
    dir_names: BTreeSet<String>,
}

impl IgnoreRules {
    pub fn new<I, S>(dir_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dir_names: dir_names.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds another directory name to skip
    pub fn with_dir(mut self, name: impl Into<String>) -> Self {
        self.dir_names.insert(name.into());
        self
    }

    pub fn is_ignored(&self, dir_name: &str) -> bool {
        self.dir_names.contains(dir_name)
    }
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_DIRS.iter().copied())
    }
}

/// Control signal returned by a walk visitor for each entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkControl {
    /// Keep walking, descending into the entry if it is a directory
    Continue,
    /// Do not descend into this directory
    SkipSubtree,
    /// Stop the walk immediately
    Abort,
}

/// Counters collected while walking
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkStats {
    pub visited: usize,
    pub skipped_entries: usize,
    pub aborted: bool,
}

/// Walks `root` in file-name order, letting `visit` steer the traversal
///
/// Unreadable entries below the root are reported to the observer and skipped;
/// failing to read the root itself is fatal.
pub fn walk_tree<F>(root: &Path, observer: &dyn OrchestrationObserver, mut visit: F) -> Result<WalkStats>
where
    F: FnMut(&DirEntry) -> WalkControl,
{
    let metadata = std::fs::metadata(root)?;
    if !metadata.is_dir() {
        return Err(OrchestrationError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("not a directory: {}", root.display()),
        )));
    }

    let mut stats = WalkStats::default();
    let mut entries = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = entries.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(err.into()),
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                observer.entry_skipped(&path, &err.to_string());
                stats.skipped_entries += 1;
                continue;
            }
        };

        stats.visited += 1;
        match visit(&entry) {
            WalkControl::Continue => {}
            WalkControl::SkipSubtree => {
                if entry.file_type().is_dir() {
                    entries.skip_current_dir();
                }
            }
            WalkControl::Abort => {
                stats.aborted = true;
                break;
            }
        }
    }

    Ok(stats)
}

/// Scans a repository and builds its dependency graph
pub struct WorkspaceScanner {
    root: PathBuf,
    ignore: IgnoreRules,
    languages: BTreeSet<Language>,
    extractor: ImportExtractor,
    observer: Arc<dyn OrchestrationObserver>,
    cancel: Option<CancellationToken>,
}

impl WorkspaceScanner {
    /// Creates a scanner for the given repository root with default rules
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore: IgnoreRules::default(),
            languages: Language::SUPPORTED.into_iter().collect(),
            extractor: ImportExtractor::with_default_strategies(),
            observer: TracingObserver::shared(),
            cancel: None,
        }
    }

    pub fn with_ignore_rules(mut self, ignore: IgnoreRules) -> Self {
        self.ignore = ignore;
        self
    }

    /// Restricts scanning to the given languages
    pub fn with_languages(mut self, languages: impl IntoIterator<Item = Language>) -> Self {
        self.languages = languages.into_iter().filter(Language::is_supported).collect();
        self
    }

    pub fn with_extractor(mut self, extractor: ImportExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn OrchestrationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Aborts the walk when the token is cancelled
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walks the repository and assembles the graph
    pub fn scan(&self) -> Result<RepoGraph> {
        debug!(root = %self.root.display(), "Scanning workspace");

        let mut modules: BTreeMap<ModuleId, Module> = BTreeMap::new();
        let mut skipped_files = 0usize;
        let observer = self.observer.as_ref();

        let stats = walk_tree(&self.root, observer, |entry| {
            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return WalkControl::Abort;
            }

            if entry.file_type().is_dir() {
                let ignored = entry.depth() > 0
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| self.ignore.is_ignored(name));
                return if ignored {
                    WalkControl::SkipSubtree
                } else {
                    WalkControl::Continue
                };
            }

            if entry.file_type().is_file() && !self.add_file(entry, &mut modules) {
                skipped_files += 1;
            }
            WalkControl::Continue
        })?;

        if stats.aborted {
            return Err(OrchestrationError::Cancelled);
        }

        let graph = RepoGraph::from_modules(self.root.clone(), modules.into_values(), observer);
        observer.scan_completed(
            graph.module_count(),
            graph.internal_edges().len(),
            stats.skipped_entries + skipped_files,
        );
        Ok(graph)
    }

    /// Records one file; returns false if the file was unreadable
    fn add_file(&self, entry: &DirEntry, modules: &mut BTreeMap<ModuleId, Module>) -> bool {
        let path = entry.path();
        let language = classify(path);
        if !self.languages.contains(&language) {
            return true;
        }

        let modified = match entry.metadata() {
            Ok(metadata) => metadata.modified().ok().map(DateTime::<Utc>::from),
            Err(err) => {
                self.observer.entry_skipped(path, &err.to_string());
                return false;
            }
        };

        let imports = match self.extractor.extract_file(path, language) {
            Ok(imports) => imports,
            Err(err) => {
                self.observer.entry_skipped(path, &err.to_string());
                return false;
            }
        };

        let dir = path.parent().unwrap_or(&self.root);
        let relative = dir.strip_prefix(&self.root).unwrap_or(dir);
        let id = module_id(relative);

        let module = modules.entry(id.clone()).or_insert_with(|| Module {
            name: self.module_name(relative),
            path: relative.to_path_buf(),
            id,
            language,
            dependencies: Vec::new(),
            last_modified: None,
            file_count: 0,
        });

        if module.language != language {
            self.observer
                .language_conflict(&module.id, module.language, language, path);
        }

        module.dependencies.extend(imports);
        module.last_modified = module.last_modified.max(modified);
        module.file_count += 1;
        true
    }

    fn module_name(&self, relative: &Path) -> String {
        if let Some(name) = relative.file_name() {
            return name.to_string_lossy().into_owned();
        }
        self.root
            .canonicalize()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| ".".to_string())
    }
}

/// Converts a repo-relative directory into a module id
pub fn module_id(relative: &Path) -> ModuleId {
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Builds a graph for `root` using the given ignore rules and default settings
pub fn build_graph(root: impl Into<PathBuf>, ignore: IgnoreRules) -> Result<RepoGraph> {
    WorkspaceScanner::new(root).with_ignore_rules(ignore).scan()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NullObserver;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingObserver {
        skipped: Mutex<Vec<PathBuf>>,
        conflicts: Mutex<Vec<(String, Language, Language, PathBuf)>>,
    }

    impl OrchestrationObserver for RecordingObserver {
        fn entry_skipped(&self, path: &Path, _error: &str) {
            self.skipped.lock().unwrap().push(path.to_path_buf());
        }

        fn language_conflict(&self, module: &str, kept: Language, ignored: Language, file: &Path) {
            self.conflicts
                .lock()
                .unwrap()
                .push((module.to_string(), kept, ignored, file.to_path_buf()));
        }
    }

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn scanner(root: &Path) -> WorkspaceScanner {
        WorkspaceScanner::new(root).with_observer(Arc::new(NullObserver))
    }

    #[test]
    fn test_module_id() {
        assert_eq!(module_id(Path::new("")), ".");
        assert_eq!(module_id(Path::new("libs/auth")), "libs/auth");
        assert_eq!(module_id(Path::new("./libs/auth")), "libs/auth");
    }

    #[test]
    fn test_scan_groups_files_by_directory() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "libs/auth/token.py", "import jwt\n");
        write(dir.path(), "libs/auth/session.py", "import redis\nimport jwt\n");
        write(dir.path(), "services/api/app.py", "from auth import token\n");
        write(dir.path(), "services/api/README.md", "docs");

        let graph = scanner(dir.path()).scan().unwrap();

        assert_eq!(graph.module_count(), 2);
        let auth = graph.module("libs/auth").unwrap();
        assert_eq!(auth.name, "auth");
        assert_eq!(auth.language, Language::Python);
        assert_eq!(auth.file_count, 2);
        // session.py sorts before token.py
        assert_eq!(auth.dependencies, vec!["jwt", "redis", "jwt"]);
        assert!(auth.last_modified.is_some());

        assert_eq!(
            graph.internal_dependencies_of("services/api"),
            BTreeSet::from(["libs/auth"])
        );
    }

    #[test]
    fn test_ignored_directories_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "web/index.js", "import x from 'react';\n");
        write(dir.path(), "web/node_modules/react/index.js", "module.exports = {};\n");
        write(dir.path(), "dist/bundle.js", "require('react');\n");

        let graph = scanner(dir.path()).scan().unwrap();
        let ids: Vec<&str> = graph.module_ids().collect();
        assert_eq!(ids, vec!["web"]);

        let graph = scanner(dir.path())
            .with_ignore_rules(IgnoreRules::new(["node_modules"]))
            .scan()
            .unwrap();
        let ids: Vec<&str> = graph.module_ids().collect();
        assert_eq!(ids, vec!["dist", "web"]);
    }

    #[test]
    fn test_first_language_wins() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "mixed/a.go", "package mixed\n");
        write(dir.path(), "mixed/b.py", "import requests\n");

        let graph = scanner(dir.path()).scan().unwrap();
        let module = graph.module("mixed").unwrap();
        assert_eq!(module.language, Language::Go);
        assert_eq!(module.dependencies, vec!["requests"]);
    }

    #[test]
    fn test_language_conflict_is_reported() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "mixed/a.go", "package mixed\n");
        write(dir.path(), "mixed/b.py", "import requests\n");
        write(dir.path(), "pure/c.py", "import os\n");

        let observer = Arc::new(RecordingObserver::default());
        WorkspaceScanner::new(dir.path())
            .with_observer(observer.clone())
            .scan()
            .unwrap();

        let conflicts = observer.conflicts.lock().unwrap();
        assert_eq!(conflicts.len(), 1);
        let (module, kept, ignored, file) = &conflicts[0];
        assert_eq!(module, "mixed");
        assert_eq!(*kept, Language::Go);
        assert_eq!(*ignored, Language::Python);
        assert!(file.ends_with("mixed/b.py"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_entries_are_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        write(dir.path(), "libs/auth/token.py", "import jwt\n");
        write(dir.path(), "libs/auth/secret.py", "import vault\n");
        write(dir.path(), "locked/hidden.py", "import os\n");
        write(dir.path(), "services/api/app.py", "from auth import token\n");

        let locked = dir.path().join("locked");
        let secret = dir.path().join("libs/auth/secret.py");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits do not apply to privileged users
        let enforced = fs::read_dir(&locked).is_err();
        let observer = Arc::new(RecordingObserver::default());
        let result = WorkspaceScanner::new(dir.path())
            .with_observer(observer.clone())
            .scan();

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o644)).unwrap();

        let graph = result.unwrap();
        let auth = graph.module("libs/auth").unwrap();
        assert!(graph.module("services/api").is_some());
        assert_eq!(
            graph.internal_dependencies_of("services/api"),
            BTreeSet::from(["libs/auth"])
        );
        if !enforced {
            return;
        }

        assert!(graph.module("locked").is_none());
        assert_eq!(auth.file_count, 1);
        assert_eq!(auth.dependencies, vec!["jwt"]);
        let skipped = observer.skipped.lock().unwrap();
        assert!(skipped.contains(&locked));
        assert!(skipped.contains(&secret));
    }

    #[test]
    fn test_build_graph_applies_ignore_rules() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app/main.go", "package main\n");
        write(dir.path(), "generated/stubs.go", "package stubs\n");

        let graph = build_graph(dir.path(), IgnoreRules::new(["generated"])).unwrap();
        let ids: Vec<&str> = graph.module_ids().collect();
        assert_eq!(ids, vec!["app"]);
    }

    #[test]
    fn test_language_filter() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "go/main.go", "package main\n");
        write(dir.path(), "py/main.py", "print('hi')\n");

        let graph = scanner(dir.path())
            .with_languages([Language::Python])
            .scan()
            .unwrap();
        let ids: Vec<&str> = graph.module_ids().collect();
        assert_eq!(ids, vec!["py"]);
    }

    #[test]
    fn test_root_files_form_root_module() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "setup.py", "import setuptools\n");

        let graph = scanner(dir.path()).scan().unwrap();
        let root = graph.module(".").unwrap();
        assert_eq!(root.path, PathBuf::from(""));
        assert_eq!(root.dependencies, vec!["setuptools"]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = scanner(&dir.path().join("nope")).scan();
        assert!(matches!(result, Err(OrchestrationError::IoError(_))));
    }

    #[test]
    fn test_cancelled_scan() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a/main.py", "\n");
        let token = CancellationToken::new();
        token.cancel();

        let result = scanner(dir.path()).with_cancellation(token).scan();
        assert!(matches!(result, Err(OrchestrationError::Cancelled)));
    }

    #[test]
    fn test_walk_control_skip_and_abort() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a/one.txt", "");
        write(dir.path(), "b/two.txt", "");
        write(dir.path(), "c/three.txt", "");

        let mut seen = Vec::new();
        let stats = walk_tree(dir.path(), &NullObserver, |entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            seen.push(name.clone());
            match name.as_str() {
                "a" => WalkControl::SkipSubtree,
                "c" => WalkControl::Abort,
                _ => WalkControl::Continue,
            }
        })
        .unwrap();

        assert!(stats.aborted);
        assert!(!seen.contains(&"one.txt".to_string()));
        assert!(seen.contains(&"two.txt".to_string()));
        assert!(!seen.contains(&"three.txt".to_string()));
    }
}
