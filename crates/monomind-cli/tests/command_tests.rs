//! Command handler tests against temporary repositories

use std::fs;
use std::path::Path;

use clap::Parser;
use monomind_cli::commands::{
    AnalyzeCommand, Command, CommandContext, ConfigCommand, ConfigFormat, RunCommand, RunOptions,
};
use monomind_cli::{Cli, CliError, Commands};
use monomind_orchestration::{ActionKind, MonoConfig};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn sample_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "libs/core/core.py", "import json\n");
    write(dir.path(), "services/api/app.py", "from core import helpers\n");
    dir
}

#[tokio::test]
async fn test_context_loads_config_from_root() {
    let dir = sample_repo();
    write(dir.path(), ".mono.toml", "[test]\nmax_concurrent = 2\nfail_fast = true\n");

    let context = CommandContext::load(Some(dir.path()), None).unwrap();
    assert_eq!(context.config.test.max_concurrent, 2);
    assert!(context.config.test.fail_fast);
    assert_eq!(
        context.config_source.unwrap().file_name().unwrap(),
        ".mono.toml"
    );
}

#[tokio::test]
async fn test_context_rejects_missing_config_file() {
    let dir = sample_repo();
    let missing = dir.path().join("nope.yaml");
    let result = CommandContext::load(Some(dir.path()), Some(&missing));
    assert!(matches!(result, Err(CliError::Config(_))));
}

#[tokio::test]
async fn test_context_rejects_missing_root() {
    let dir = TempDir::new().unwrap();
    let result = CommandContext::load(Some(&dir.path().join("absent")), None);
    assert!(matches!(result, Err(CliError::InvalidArgument { .. })));
}

#[tokio::test]
async fn test_dry_run_build_succeeds_without_tools() {
    let dir = sample_repo();
    let context = CommandContext::with_config(dir.path(), MonoConfig::default()).with_quiet(true);

    let options = RunOptions {
        dry_run: true,
        json: true,
        ..RunOptions::default()
    };
    let result = RunCommand::new(ActionKind::Build, options).execute(&context).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_failing_override_reports_run_failure() {
    let dir = sample_repo();
    let mut config = MonoConfig::default();
    config.test.commands.insert(
        "python".to_string(),
        monomind_orchestration::CommandSpec::new(
            ["sh", "-c", "test {path} != libs/core"],
            Default::default(),
        ),
    );
    let context = CommandContext::with_config(dir.path(), config).with_quiet(true);

    let options = RunOptions {
        json: true,
        ..RunOptions::default()
    };
    let err = RunCommand::new(ActionKind::Test, options)
        .execute(&context)
        .await
        .unwrap_err();

    match err {
        CliError::RunFailed {
            action,
            failed,
            skipped,
        } => {
            assert_eq!(action, "test");
            assert_eq!(failed, 1);
            assert_eq!(skipped, 1);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_changed_file_is_an_error() {
    let dir = sample_repo();
    let context = CommandContext::with_config(dir.path(), MonoConfig::default()).with_quiet(true);

    let options = RunOptions {
        changed: vec!["docs/intro.md".into()],
        dry_run: true,
        ..RunOptions::default()
    };
    let result = RunCommand::new(ActionKind::Test, options).execute(&context).await;
    assert!(matches!(result, Err(CliError::Orchestration(_))));
}

#[tokio::test]
async fn test_analyze_and_config_commands_run() {
    let dir = sample_repo();
    let context = CommandContext::with_config(dir.path(), MonoConfig::default()).with_quiet(true);

    assert!(AnalyzeCommand::new(true).execute(&context).await.is_ok());
    assert!(ConfigCommand::new(ConfigFormat::Yaml).execute(&context).await.is_ok());
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::parse_from(["mono", "analyze", "--json", "--debug", "--root", "/tmp/x"]);
    assert!(cli.debug);
    assert!(matches!(cli.command, Commands::Analyze { json: true }));
}
