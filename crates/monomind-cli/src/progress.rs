// Progress indicators for scans and runs

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use monomind_orchestration::{Language, ModuleOutcome, OrchestrationObserver, TracingObserver};

/// Create a spinner for long-running operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|e| {
            eprintln!("Failed to create spinner template: {}", e);
            ProgressStyle::default_spinner()
        });
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Create a progress bar for operations with known length
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|e| {
            eprintln!("Failed to create progress bar template: {}", e);
            ProgressStyle::default_bar()
        })
        .progress_chars("=>-");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Observer that advances a progress bar and forwards events to tracing
pub struct ProgressObserver {
    bar: ProgressBar,
    inner: TracingObserver,
}

impl ProgressObserver {
    pub fn new(bar: ProgressBar) -> Self {
        Self {
            bar,
            inner: TracingObserver,
        }
    }

    /// Observer whose bar never draws
    pub fn hidden() -> Self {
        Self::new(ProgressBar::hidden())
    }

    pub fn shared(bar: ProgressBar) -> Arc<Self> {
        Arc::new(Self::new(bar))
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl OrchestrationObserver for ProgressObserver {
    fn entry_skipped(&self, path: &Path, error: &str) {
        self.inner.entry_skipped(path, error);
    }

    fn language_conflict(&self, module: &str, kept: Language, ignored: Language, file: &Path) {
        self.inner.language_conflict(module, kept, ignored, file);
    }

    fn ambiguous_dependency(&self, module: &str, raw: &str, candidates: &[String]) {
        self.inner.ambiguous_dependency(module, raw, candidates);
    }

    fn scan_completed(&self, modules: usize, internal_edges: usize, skipped_entries: usize) {
        self.inner.scan_completed(modules, internal_edges, skipped_entries);
    }

    fn module_dispatched(&self, module: &str) {
        self.bar.set_message(module.to_string());
        self.inner.module_dispatched(module);
    }

    fn module_finished(&self, module: &str, outcome: &ModuleOutcome) {
        self.bar.inc(1);
        self.bar.suspend(|| self.inner.module_finished(module, outcome));
    }

    fn dispatch_stopped(&self, reason: &str) {
        self.bar.suspend(|| self.inner.dispatch_stopped(reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_advances_once_per_finished_module() {
        let observer = ProgressObserver::hidden();
        observer.bar().set_length(3);

        observer.module_dispatched("libs/auth");
        observer.module_finished("libs/auth", &ModuleOutcome::Succeeded);
        observer.module_finished(
            "web",
            &ModuleOutcome::Failed {
                reason: "exit 1".to_string(),
            },
        );

        assert_eq!(observer.bar().position(), 2);
        assert_eq!(observer.bar().message(), "libs/auth");
    }
}
