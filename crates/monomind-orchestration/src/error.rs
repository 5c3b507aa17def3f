//! Error types for the orchestration module

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during graph construction, impact analysis and scheduling
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to walk {path}: {message}")]
    WalkError { path: PathBuf, message: String },

    #[error("No module owns changed file: {}", path.display())]
    UnresolvedModule { path: PathBuf },

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Circular dependency detected between: {}", members.join(", "))]
    CircularDependency { members: Vec<String> },

    #[error("Action failed for module {module}: {reason}")]
    ActionFailed { module: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(String),
}

impl From<serde_yaml::Error> for OrchestrationError {
    fn from(err: serde_yaml::Error) -> Self {
        OrchestrationError::YamlError(err.to_string())
    }
}

impl From<config::ConfigError> for OrchestrationError {
    fn from(err: config::ConfigError) -> Self {
        OrchestrationError::ConfigurationError(err.to_string())
    }
}

impl From<walkdir::Error> for OrchestrationError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(PathBuf::from).unwrap_or_default();
        OrchestrationError::WalkError {
            path,
            message: err.to_string(),
        }
    }
}

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;
