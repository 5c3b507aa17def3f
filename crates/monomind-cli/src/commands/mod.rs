// Command handlers for the mono CLI

pub mod analyze;
pub mod config;
pub mod impact;
pub mod run;

pub use analyze::AnalyzeCommand;
pub use config::{ConfigCommand, ConfigFormat};
pub use impact::ImpactCommand;
pub use run::{RunCommand, RunOptions};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use monomind_orchestration::{
    ConfigManager, MonoConfig, OrchestrationObserver, RepoGraph, WorkspaceScanner,
};
use tokio_util::sync::CancellationToken;

use crate::error::{CliError, CliResult};
use crate::output::OutputStyle;

/// Trait for command handlers
#[async_trait::async_trait]
pub trait Command: Send + Sync {
    /// Execute the command
    async fn execute(&self, context: &CommandContext) -> CliResult<()>;
}

/// Everything a command needs to know about the repository it runs in
pub struct CommandContext {
    /// Canonical repository root
    pub root: PathBuf,

    /// Effective configuration (file, then environment)
    pub config: MonoConfig,

    /// Configuration file that was read, if any
    pub config_source: Option<PathBuf>,

    /// Suppress progress and informational output
    pub quiet: bool,

    /// Cancelled on Ctrl-C
    pub cancel: CancellationToken,
}

impl CommandContext {
    /// Resolves the root and loads configuration
    ///
    /// `root` defaults to the current directory; relative config paths are
    /// resolved against the current directory, not the root.
    pub fn load(root: Option<&Path>, config_path: Option<&Path>) -> CliResult<Self> {
        let root = match root {
            Some(root) => root.to_path_buf(),
            None => std::env::current_dir()?,
        };
        let root = root.canonicalize().map_err(|e| CliError::InvalidArgument {
            message: format!("repository root {}: {}", root.display(), e),
        })?;
        if !root.is_dir() {
            return Err(CliError::InvalidArgument {
                message: format!("repository root {} is not a directory", root.display()),
            });
        }

        let mut manager = ConfigManager::new(&root);
        if let Some(path) = config_path {
            if !path.is_file() {
                return Err(CliError::Config(format!(
                    "configuration file {} does not exist",
                    path.display()
                )));
            }
            manager = manager.with_path(path);
        }
        let config_source = manager.resolve_path();
        let config = manager.load()?;

        Ok(Self {
            root,
            config,
            config_source,
            quiet: false,
            cancel: CancellationToken::new(),
        })
    }

    /// Context over an already loaded configuration
    pub fn with_config(root: impl Into<PathBuf>, config: MonoConfig) -> Self {
        Self {
            root: root.into(),
            config,
            config_source: None,
            quiet: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Style for stdout
    pub fn style(&self) -> OutputStyle {
        OutputStyle::default()
    }

    /// Scans the repository off the async runtime
    pub async fn scan(&self, observer: Arc<dyn OrchestrationObserver>) -> CliResult<RepoGraph> {
        let scanner = WorkspaceScanner::new(self.root.clone())
            .with_ignore_rules(self.config.ignore_rules())
            .with_languages(self.config.languages()?)
            .with_observer(observer)
            .with_cancellation(self.cancel.clone());

        let graph = tokio::task::spawn_blocking(move || scanner.scan())
            .await
            .map_err(|e| CliError::Internal(format!("scan task failed: {}", e)))??;
        Ok(graph)
    }
}

/// Writes a value as pretty JSON on stdout
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
