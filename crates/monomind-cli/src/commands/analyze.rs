// Scan the repository and print its module graph

use monomind_orchestration::TracingObserver;

use super::{print_json, Command, CommandContext};
use crate::error::CliResult;
use crate::output::render_summary;
use crate::progress::create_spinner;

/// Print modules, their languages and their dependency edges
pub struct AnalyzeCommand {
    pub json: bool,
}

impl AnalyzeCommand {
    pub fn new(json: bool) -> Self {
        Self { json }
    }
}

#[async_trait::async_trait]
impl Command for AnalyzeCommand {
    async fn execute(&self, context: &CommandContext) -> CliResult<()> {
        let spinner = (!self.json && !context.quiet).then(|| create_spinner("Scanning repository"));
        let graph = context.scan(TracingObserver::shared()).await;
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        let summary = graph?.summary();
        if self.json {
            print_json(&summary)
        } else {
            println!("{}", render_summary(&context.style(), &summary));
            Ok(())
        }
    }
}
