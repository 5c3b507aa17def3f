// Shell completion generation

use crate::router::Cli;
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io;

/// Parses a shell name
pub fn parse_shell(shell: &str) -> Result<Shell, String> {
    match shell.to_lowercase().as_str() {
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "fish" => Ok(Shell::Fish),
        "powershell" | "pwsh" => Ok(Shell::PowerShell),
        "elvish" => Ok(Shell::Elvish),
        _ => Err(format!("Unknown shell: {}", shell)),
    }
}

/// Generate shell completions on stdout
pub fn generate_completions(shell: &str) -> Result<(), String> {
    let shell = parse_shell(shell)?;
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "mono", &mut io::stdout());
    Ok(())
}
