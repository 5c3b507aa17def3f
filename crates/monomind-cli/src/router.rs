// Command routing and dispatch

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use monomind_orchestration::ActionKind;
use tracing::debug;

use crate::commands::*;
use crate::error::{CliError, CliResult};

/// mono - dependency-aware builds and tests for polyglot monorepos
#[derive(Parser, Debug)]
#[command(name = "mono")]
#[command(bin_name = "mono")]
#[command(about = "Dependency graph, change impact and incremental builds for polyglot monorepos")]
#[command(
    long_about = "mono scans a repository of Go, JavaScript/TypeScript and Python modules, builds their dependency graph and uses it to decide what a change affects.\n\nQuick start:\n  • mono analyze                 List modules and their dependencies\n  • mono impact libs/auth/a.py   Show what a change affects\n  • mono test --changed FILE     Test only affected modules\n  • mono build --jobs 8          Build everything in dependency order"
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Repository root (default: current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Configuration file (default: first of configs/config.yaml, config.yaml, .mono.yaml, ...)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Only print results and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Scan the repository and list modules with their dependencies
    Analyze {
        /// Print the graph as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the modules and tests affected by changed files
    Impact {
        /// Changed files, relative to the repository root
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build modules in dependency order
    Build(RunArgs),

    /// Test modules in dependency order
    Test(RunArgs),

    /// Print the effective configuration
    Config {
        /// Output format
        #[arg(long, value_enum, default_value_t = ConfigFormat::Toml)]
        format: ConfigFormat,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArgs {
    /// Only run modules affected by this file (repeatable)
    #[arg(long, value_name = "FILE")]
    pub changed: Vec<PathBuf>,

    /// Maximum number of modules running at once
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Stop dispatching after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Run modules even when a dependency failed
    #[arg(long)]
    pub keep_going: bool,

    /// Print the commands instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Do not pull in dependencies of the targets
    #[arg(long)]
    pub no_deps: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl From<RunArgs> for RunOptions {
    fn from(args: RunArgs) -> Self {
        RunOptions {
            changed: args.changed,
            jobs: args.jobs,
            fail_fast: args.fail_fast,
            keep_going: args.keep_going,
            dry_run: args.dry_run,
            no_deps: args.no_deps,
            json: args.json,
        }
    }
}

/// Command router
pub struct CommandRouter;

impl CommandRouter {
    /// Prepares logging, configuration and Ctrl-C handling, then executes
    pub async fn run(cli: &Cli) -> CliResult<()> {
        if let Commands::Completions { shell } = &cli.command {
            return crate::completion::generate_completions(shell)
                .map_err(|message| CliError::InvalidArgument { message });
        }

        let context = CommandContext::load(cli.root.as_deref(), cli.config.as_deref())?
            .with_quiet(cli.quiet);
        crate::logging::init_logging(cli.debug, cli.quiet, context.config.log_level.as_deref());
        debug!(root = %context.root.display(), "Workspace ready");

        let cancel = context.cancel.clone();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("Interrupt received, cancelling");
                cancel.cancel();
            }
        });

        let result = Self::execute(&cli.command, &context).await;
        ctrl_c.abort();
        result
    }

    /// Execute a command
    pub async fn execute(command: &Commands, context: &CommandContext) -> CliResult<()> {
        match command {
            Commands::Analyze { json } => AnalyzeCommand::new(*json).execute(context).await,
            Commands::Impact { files, json } => {
                ImpactCommand::new(files.clone(), *json).execute(context).await
            }
            Commands::Build(args) => {
                RunCommand::new(ActionKind::Build, args.clone().into())
                    .execute(context)
                    .await
            }
            Commands::Test(args) => {
                RunCommand::new(ActionKind::Test, args.clone().into())
                    .execute(context)
                    .await
            }
            Commands::Config { format } => ConfigCommand::new(*format).execute(context).await,
            Commands::Completions { shell } => crate::completion::generate_completions(shell)
                .map_err(|message| CliError::InvalidArgument { message }),
        }
    }
}
