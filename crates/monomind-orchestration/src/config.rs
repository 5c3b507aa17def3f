//! Configuration loading and validation

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzers::impact_analyzer::ExplicitTestMapping;
use crate::analyzers::workspace_scanner::{IgnoreRules, DEFAULT_IGNORED_DIRS};
use crate::error::{OrchestrationError, Result};
use crate::managers::action_runner::{ActionKind, CommandAction, CommandSpec};
use crate::managers::batch_executor::BatchExecutionConfig;
use crate::models::{Language, ModuleId};

/// File names tried, in order, when no explicit config path is given
pub const CONFIG_CANDIDATES: &[&str] = &[
    "configs/config.yaml",
    "configs/config.yml",
    "config.yaml",
    "config.yml",
    ".mono.yaml",
    ".mono.yml",
    ".mono.toml",
];

/// Environment prefix; nested keys use `__`, e.g. `MONO_BUILD__MAX_CONCURRENT=8`
pub const ENV_PREFIX: &str = "MONO";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonoConfig {
    /// Default log level for the CLI (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: Option<String>,

    pub analyzer: AnalyzerSettings,
    pub build: ExecutionSettings,
    pub test: ExecutionSettings,

    /// Module id → test targets; unmapped modules are their own target
    pub test_targets: BTreeMap<ModuleId, Vec<String>>,
}

impl Default for MonoConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            analyzer: AnalyzerSettings::default(),
            build: ExecutionSettings::default(),
            test: ExecutionSettings::default(),
            test_targets: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    /// Language tags to scan
    pub languages: Vec<String>,

    /// Directory names skipped during the walk
    pub ignore_dirs: Vec<String>,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            languages: Language::SUPPORTED.iter().map(|l| l.as_str().to_string()).collect(),
            ignore_dirs: DEFAULT_IGNORED_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// Settings shared by `build` and `test`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    pub max_concurrent: usize,
    pub fail_fast: bool,
    pub continue_on_upstream_failure: bool,
    pub include_dependencies: bool,
    pub dry_run: bool,
    pub timeout_secs: Option<u64>,

    /// Language tag → command replacing the built-in default
    pub commands: BTreeMap<String, CommandSpec>,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            fail_fast: false,
            continue_on_upstream_failure: false,
            include_dependencies: true,
            dry_run: false,
            timeout_secs: None,
            commands: BTreeMap::new(),
        }
    }
}

impl ExecutionSettings {
    pub fn batch_config(&self) -> BatchExecutionConfig {
        BatchExecutionConfig {
            max_concurrent: self.max_concurrent,
            fail_fast: self.fail_fast,
            continue_on_upstream_failure: self.continue_on_upstream_failure,
            include_dependencies: self.include_dependencies,
        }
    }

    /// Builds the command action for `kind` rooted at `root`
    pub fn command_action(&self, kind: ActionKind, root: &Path) -> Result<CommandAction> {
        let mut action = CommandAction::new(kind, root)
            .with_dry_run(self.dry_run)
            .with_timeout(self.timeout_secs.map(Duration::from_secs));
        for (tag, spec) in &self.commands {
            action = action.with_override(parse_language(tag)?, spec.clone());
        }
        Ok(action)
    }

    fn validate(&self, section: &str) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(OrchestrationError::ConfigurationError(format!(
                "{}.max_concurrent must be greater than 0",
                section
            )));
        }
        if self.timeout_secs == Some(0) {
            return Err(OrchestrationError::ConfigurationError(format!(
                "{}.timeout_secs must be greater than 0",
                section
            )));
        }
        for (tag, spec) in &self.commands {
            parse_language(tag)?;
            if spec.argv.first().map_or(true, |program| program.trim().is_empty()) {
                return Err(OrchestrationError::ConfigurationError(format!(
                    "{}.commands.{} must name a program",
                    section, tag
                )));
            }
        }
        Ok(())
    }
}

impl MonoConfig {
    /// Checks invariants the rest of the system relies on
    pub fn validate(&self) -> Result<()> {
        if self.analyzer.languages.is_empty() {
            return Err(OrchestrationError::ConfigurationError(
                "analyzer.languages must not be empty".to_string(),
            ));
        }
        self.languages()?;
        self.build.validate("build")?;
        self.test.validate("test")?;
        Ok(())
    }

    /// Parsed language list
    pub fn languages(&self) -> Result<Vec<Language>> {
        self.analyzer.languages.iter().map(|tag| parse_language(tag)).collect()
    }

    pub fn ignore_rules(&self) -> IgnoreRules {
        IgnoreRules::new(self.analyzer.ignore_dirs.iter().cloned())
    }

    pub fn test_mapping(&self) -> Arc<ExplicitTestMapping> {
        Arc::new(ExplicitTestMapping::new(self.test_targets.clone()))
    }

    pub fn settings(&self, kind: ActionKind) -> &ExecutionSettings {
        match kind {
            ActionKind::Build => &self.build,
            ActionKind::Test => &self.test,
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| OrchestrationError::ConfigurationError(e.to_string()))
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn parse_language(tag: &str) -> Result<Language> {
    match Language::from_tag(tag) {
        Language::Unsupported => Err(OrchestrationError::ConfigurationError(format!(
            "unknown language: {}",
            tag
        ))),
        language => Ok(language),
    }
}

/// Loads configuration from a file plus `MONO_*` environment variables
pub struct ConfigManager {
    /// Explicit configuration file; when unset the candidates are tried in order
    config_path: Option<PathBuf>,

    /// Directory the candidates are resolved against
    search_dir: PathBuf,

    /// Environment prefix
    env_prefix: String,
}

impl ConfigManager {
    /// Looks for the default candidate files under `search_dir`
    pub fn new(search_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_path: None,
            search_dir: search_dir.into(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Uses one explicit file, which must exist
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// The file that will be read, if any
    pub fn resolve_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            return Some(path.clone());
        }
        CONFIG_CANDIDATES
            .iter()
            .map(|candidate| self.search_dir.join(candidate))
            .find(|path| path.is_file())
    }

    /// Loads and validates the configuration
    pub fn load(&self) -> Result<MonoConfig> {
        let mut builder = Config::builder();
        let path = self.resolve_path();

        match &path {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration file");
                builder = builder.add_source(File::from(path.as_path()).required(true));
            }
            None => debug!(dir = %self.search_dir.display(), "No configuration file found, using defaults"),
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let mut config: MonoConfig = settings.try_deserialize()?;
        // The config crate lowercases table keys; module ids are case-sensitive
        if let Some(targets) = path.as_deref().map(read_test_targets).transpose()?.flatten() {
            config.test_targets = targets;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Default, Deserialize)]
struct TestTargetsTable {
    #[serde(default)]
    test_targets: Option<BTreeMap<ModuleId, Vec<String>>>,
}

/// Reads the `test_targets` table straight from the file, keys as written
fn read_test_targets(path: &Path) -> Result<Option<BTreeMap<ModuleId, Vec<String>>>> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    let table: TestTargetsTable = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content)
            .map_err(|e| OrchestrationError::ConfigurationError(e.to_string()))?,
        _ => serde_yaml::from_str(&content)?,
    };
    Ok(table.test_targets)
}
