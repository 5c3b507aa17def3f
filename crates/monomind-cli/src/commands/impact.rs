// Report which modules and tests a change affects

use std::path::PathBuf;

use monomind_orchestration::{ImpactAnalyzer, TracingObserver};

use super::{print_json, Command, CommandContext};
use crate::error::{CliError, CliResult};
use crate::output::render_impact;

/// Changed files → owning module → transitive dependents and test targets
///
/// Relative paths are taken as relative to the repository root.
pub struct ImpactCommand {
    pub files: Vec<PathBuf>,
    pub json: bool,
}

impl ImpactCommand {
    pub fn new(files: Vec<PathBuf>, json: bool) -> Self {
        Self { files, json }
    }
}

#[async_trait::async_trait]
impl Command for ImpactCommand {
    async fn execute(&self, context: &CommandContext) -> CliResult<()> {
        if self.files.is_empty() {
            return Err(CliError::InvalidArgument {
                message: "at least one changed file is required".to_string(),
            });
        }

        let graph = context.scan(TracingObserver::shared()).await?;
        let results = ImpactAnalyzer::new(&graph)
            .with_test_mapping(context.config.test_mapping())
            .analyze_files(&self.files)?;

        if self.json {
            print_json(&results)
        } else {
            println!("{}", render_impact(&context.style(), &results));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monomind_orchestration::{MonoConfig, OrchestrationError};
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_unowned_file_is_reported() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib/a.py"), "import json\n").unwrap();
        let context = CommandContext::with_config(dir.path(), MonoConfig::default()).with_quiet(true);

        let err = ImpactCommand::new(vec![PathBuf::from("docs/a.md")], true)
            .execute(&context)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CliError::Orchestration(OrchestrationError::UnresolvedModule { .. })
        ));
    }

    #[tokio::test]
    async fn test_requires_files() {
        let dir = TempDir::new().unwrap();
        let context = CommandContext::with_config(dir.path(), MonoConfig::default());
        let err = ImpactCommand::new(vec![], false).execute(&context).await.unwrap_err();
        assert!(matches!(err, CliError::InvalidArgument { .. }));
    }
}
