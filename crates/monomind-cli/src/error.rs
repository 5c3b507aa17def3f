// CLI error types

use monomind_orchestration::OrchestrationError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{action} finished with {failed} failed and {skipped} skipped modules")]
    RunFailed {
        action: String,
        failed: usize,
        skipped: usize,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            CliError::InvalidArgument { message } => {
                format!("Invalid argument: {}\n\nRun 'mono --help' for usage information.", message)
            }
            CliError::Io(e) => {
                format!("File operation failed: {}", e)
            }
            CliError::Config(msg) => {
                format!("Configuration error: {}\n\nRun 'mono config' to inspect the effective configuration.", msg)
            }
            CliError::Orchestration(OrchestrationError::UnresolvedModule { path }) => {
                format!(
                    "No module owns {}.\n\nRun 'mono analyze' to list the modules of this repository.",
                    path.display()
                )
            }
            CliError::Orchestration(OrchestrationError::ConfigurationError(msg)) => {
                format!("Configuration error: {}\n\nRun 'mono config' to inspect the effective configuration.", msg)
            }
            CliError::Orchestration(e) => e.to_string(),
            CliError::Serialization(e) => {
                format!("Could not render output: {}", e)
            }
            CliError::RunFailed { .. } => self.to_string(),
            CliError::Internal(msg) => {
                format!("Internal error: {}\n\nPlease report this issue.", msg)
            }
        }
    }

    /// Get technical details for debug mode
    pub fn technical_details(&self) -> String {
        format!("{:?}", self)
    }
}

pub type CliResult<T> = Result<T, CliError>;
