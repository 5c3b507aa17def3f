//! Build and test actions backed by external tools

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{OrchestrationError, Result};
use crate::managers::batch_executor::{ActionOutcome, ModuleAction};
use crate::models::{Language, Module};

/// Placeholder expanded to the module's repo-relative path
pub const PATH_PLACEHOLDER: &str = "{path}";

/// What a [`CommandAction`] does to a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Build,
    Test,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Build => "build",
            ActionKind::Test => "test",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directory a command runs in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkingDir {
    /// The repository root
    #[default]
    Root,
    /// The module's own directory
    Module,
}

/// A command line template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program followed by its arguments; `{path}` is expanded per module
    pub argv: Vec<String>,

    #[serde(default)]
    pub working_dir: WorkingDir,
}

impl CommandSpec {
    pub fn new<I, S>(argv: I, working_dir: WorkingDir) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            working_dir,
        }
    }

    /// Default command for a language, if there is one
    pub fn default_for(kind: ActionKind, language: Language) -> Option<Self> {
        let (root, module_dir) = (WorkingDir::Root, WorkingDir::Module);

        let spec = match (kind, language) {
            (ActionKind::Build, Language::Go) => Self::new(["go", "build", "./{path}"], root),
            (ActionKind::Build, Language::JavaScript | Language::TypeScript) => {
                Self::new(["npm", "run", "build"], module_dir)
            }
            (ActionKind::Build, Language::Python) => Self::new(["python", "setup.py", "build"], module_dir),
            (ActionKind::Build, Language::Unsupported) => return None,
            (ActionKind::Test, Language::Go) => Self::new(["go", "test", "./{path}/..."], root),
            (ActionKind::Test, Language::JavaScript | Language::TypeScript) => {
                Self::new(["npm", "test"], module_dir)
            }
            (ActionKind::Test, Language::Python) => Self::new(["python", "-m", "pytest"], module_dir),
            (ActionKind::Test, Language::Unsupported) => Self::new(["make", "test"], module_dir),
        };
        Some(spec)
    }

    /// Expands `{path}`; for the root module `./{path}` collapses to `.`
    fn expand(&self, relative: &str) -> Vec<String> {
        self.argv
            .iter()
            .map(|arg| {
                let arg = if relative == "." {
                    arg.replace("./{path}", ".")
                } else {
                    arg.clone()
                };
                arg.replace(PATH_PLACEHOLDER, relative)
            })
            .collect()
    }
}

/// A fully resolved invocation for one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: PathBuf,
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        write!(f, " (in {})", self.current_dir.display())
    }
}

/// Runs the per-language build or test tool for a module
#[derive(Debug, Clone)]
pub struct CommandAction {
    kind: ActionKind,
    root: PathBuf,
    overrides: BTreeMap<Language, CommandSpec>,
    dry_run: bool,
    timeout: Option<Duration>,
}

impl CommandAction {
    pub fn new(kind: ActionKind, root: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            root: root.into(),
            overrides: BTreeMap::new(),
            dry_run: false,
            timeout: None,
        }
    }

    /// Replaces the default command for one language
    pub fn with_override(mut self, language: Language, spec: CommandSpec) -> Self {
        self.overrides.insert(language, spec);
        self
    }

    /// Report success without spawning anything
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Resolves the command for a module, rejecting paths outside the repository
    pub fn invocation_for(&self, module: &Module) -> Result<Invocation> {
        let relative = checked_relative_path(module)?;

        let spec = match self.overrides.get(&module.language) {
            Some(spec) => spec.clone(),
            None => CommandSpec::default_for(self.kind, module.language).ok_or_else(|| {
                OrchestrationError::ActionFailed {
                    module: module.id.clone(),
                    reason: format!("no {} command for language {}", self.kind, module.language),
                }
            })?,
        };

        let mut argv = spec.expand(&relative).into_iter();
        let program = argv.next().ok_or_else(|| OrchestrationError::ActionFailed {
            module: module.id.clone(),
            reason: "empty command".to_string(),
        })?;

        let current_dir = match spec.working_dir {
            WorkingDir::Root => self.root.clone(),
            WorkingDir::Module => self.root.join(&module.path),
        };

        Ok(Invocation {
            program,
            args: argv.collect(),
            current_dir,
        })
    }

    async fn spawn(&self, module: &Module, invocation: &Invocation) -> ActionOutcome {
        debug!(
            module = %module.id,
            command = %invocation.program,
            args = ?invocation.args,
            "Spawning process"
        );

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.current_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(output) => output,
                Err(_) => {
                    return ActionOutcome::failed(format!(
                        "{} timed out after {}s",
                        invocation.program,
                        limit.as_secs_f64()
                    ))
                }
            },
            None => cmd.output().await,
        };

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                return ActionOutcome::failed(format!("failed to spawn {}: {}", invocation.program, e))
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            ActionOutcome::succeeded().with_output(combined)
        } else {
            ActionOutcome::failed(format!("{} exited with {}", invocation.program, output.status))
                .with_output(combined)
        }
    }
}

#[async_trait]
impl ModuleAction for CommandAction {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn run(&self, module: &Module) -> ActionOutcome {
        let invocation = match self.invocation_for(module) {
            Ok(invocation) => invocation,
            Err(e) => return ActionOutcome::failed(e.to_string()),
        };

        if self.dry_run {
            info!(module = %module.id, command = %invocation, "Dry run");
            return ActionOutcome::succeeded().with_output(format!("dry run: {}", invocation));
        }

        self.spawn(module, &invocation).await
    }
}

/// The module path as a `/`-joined relative string (`.` for the root)
fn checked_relative_path(module: &Module) -> Result<String> {
    let mut parts = Vec::new();
    for component in module.path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(OrchestrationError::ActionFailed {
                    module: module.id.clone(),
                    reason: format!("invalid module path: {}", module.path.display()),
                })
            }
        }
    }

    Ok(if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    })
}
