// Output formatting and styling

use colored::Colorize;
use monomind_orchestration::{
    GraphSummary, ImpactResult, ModuleOutcome, RunReport,
};

/// Output styling configuration
pub struct OutputStyle {
    pub use_colors: bool,
}

impl Default for OutputStyle {
    fn default() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}

impl OutputStyle {
    /// Style without colors, for tests and piped output
    pub fn plain() -> Self {
        Self { use_colors: false }
    }

    /// Format success message
    pub fn success(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "✓".green().bold(), msg)
        } else {
            format!("✓ {}", msg)
        }
    }

    /// Format error message
    pub fn error(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "✗".red().bold(), msg)
        } else {
            format!("✗ {}", msg)
        }
    }

    /// Format warning message
    pub fn warning(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "⚠".yellow(), msg)
        } else {
            format!("⚠ {}", msg)
        }
    }

    /// Format info message
    pub fn info(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "ℹ".blue(), msg)
        } else {
            format!("ℹ {}", msg)
        }
    }

    pub fn code(&self, code: &str) -> String {
        if self.use_colors {
            code.cyan().to_string()
        } else {
            code.to_string()
        }
    }

    /// Format a section header
    pub fn section(&self, title: &str) -> String {
        if self.use_colors {
            format!("\n{}\n{}", title.bold().underline(), "─".repeat(title.chars().count()))
        } else {
            format!("\n{}\n{}", title, "─".repeat(title.chars().count()))
        }
    }

    /// Format a list item
    pub fn list_item(&self, item: &str) -> String {
        format!("  • {}", item)
    }

    /// Format a key-value pair
    pub fn key_value(&self, key: &str, value: &str) -> String {
        if self.use_colors {
            format!("  {}: {}", key.bold(), value)
        } else {
            format!("  {}: {}", key, value)
        }
    }

    /// One line per module outcome
    pub fn outcome(&self, module: &str, outcome: &ModuleOutcome) -> String {
        let line = format!("{} {}", self.code(module), outcome);
        match outcome {
            ModuleOutcome::Succeeded => self.success(&line),
            ModuleOutcome::Failed { .. } => self.error(&line),
            ModuleOutcome::Skipped { .. } => self.warning(&line),
        }
    }
}

/// Human-readable module listing
pub fn render_summary(style: &OutputStyle, summary: &GraphSummary) -> String {
    let mut out = style.section(&format!(
        "{} modules, {} internal edges ({})",
        summary.modules.len(),
        summary.internal_edge_count,
        summary.root.display()
    ));

    for module in &summary.modules {
        out.push('\n');
        out.push_str(&style.list_item(&format!(
            "{} [{}] {} file(s)",
            style.code(&module.id),
            module.language,
            module.file_count
        )));
        if !module.internal_dependencies.is_empty() {
            out.push('\n');
            out.push_str(&style.key_value("  depends on", &module.internal_dependencies.join(", ")));
        }
        if !module.dependents.is_empty() {
            out.push('\n');
            out.push_str(&style.key_value("  used by", &module.dependents.join(", ")));
        }
        if !module.external_dependencies.is_empty() {
            out.push('\n');
            out.push_str(&style.key_value("  external", &module.external_dependencies.join(", ")));
        }
    }
    out
}

pub fn render_impact(style: &OutputStyle, results: &[ImpactResult]) -> String {
    let mut out = String::new();
    for result in results {
        out.push_str(&style.section(&result.changed_file.display().to_string()));
        out.push('\n');
        out.push_str(&style.key_value("owner", &result.owning_module));
        out.push('\n');
        out.push_str(&style.key_value("affected", &result.affected_modules.join(", ")));
        out.push('\n');
        out.push_str(&style.key_value("tests", &result.affected_tests.join(", ")));
    }
    out
}

/// Outcome per module in completion order, then totals and any captured
/// output of failed modules
pub fn render_report(style: &OutputStyle, report: &RunReport) -> String {
    let mut out = style.section(&format!("{} run {}", report.action, report.run_id));
    for entry in &report.entries {
        out.push('\n');
        out.push_str(&style.outcome(&entry.module, &entry.outcome));
    }

    for cycle in &report.cycles {
        out.push('\n');
        out.push_str(&style.warning(&format!("cycle: {}", cycle.join(" → "))));
    }

    for entry in report.entries.iter().filter(|e| e.outcome.is_failure()) {
        if let Some(output) = entry.output.as_deref().filter(|o| !o.trim().is_empty()) {
            out.push_str(&style.section(&format!("output of {}", entry.module)));
            out.push('\n');
            out.push_str(output.trim_end());
        }
    }

    let counts = report.counts();
    let totals = format!(
        "{} succeeded, {} failed, {} skipped",
        counts.succeeded, counts.failed, counts.skipped
    );
    out.push_str("\n\n");
    if report.is_success() {
        out.push_str(&style.success(&totals));
    } else {
        out.push_str(&style.error(&totals));
    }
    if report.cancelled {
        out.push('\n');
        out.push_str(&style.warning("run was cancelled before every module was dispatched"));
    }
    out
}

/// Print formatted output
pub fn print_success(msg: &str) {
    let style = OutputStyle::default();
    println!("{}", style.success(msg));
}

pub fn print_error(msg: &str) {
    let style = OutputStyle {
        use_colors: atty::is(atty::Stream::Stderr),
    };
    eprintln!("{}", style.error(msg));
}

pub fn print_warning(msg: &str) {
    let style = OutputStyle::default();
    println!("{}", style.warning(msg));
}

pub fn print_info(msg: &str) {
    let style = OutputStyle::default();
    println!("{}", style.info(msg));
}
