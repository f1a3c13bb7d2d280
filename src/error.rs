//! Error types for Maverick

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Maverick operations
pub type Result<T> = std::result::Result<T, MaverickError>;

/// Maverick error types
#[derive(Error, Debug)]
pub enum MaverickError {
    #[error("A valid Maverick project could not be found: {0}")]
    ProjectNotFound(String),

    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No Maverick configuration was found. Run `maverick init` to get started")]
    NoValidConfig,

    #[error("Refusing to overwrite existing file: {}", .0.display())]
    ConfigExists(PathBuf),

    #[error("A duplicate name was found when transformed to a URL safe string: {0}")]
    DuplicateName(String),

    #[error("Template cycle detected while resolving {field}({unit})")]
    TemplateCycle { field: String, unit: String },

    #[error("Invalid template function: {0}")]
    UnknownTemplateField(String),

    #[error("Failed to find {field} for {unit}")]
    UnknownTemplateTarget { field: String, unit: String },

    #[error("Referenced a(n) {field} field that does not exist on {unit}")]
    MissingTemplateValue { field: String, unit: String },

    #[error("Dependency resolution error: {0}")]
    DependencyResolution(String),

    #[error("Command failed: {command} (exit code {code:?})")]
    CommandFailed { command: String, code: Option<i32> },

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Setup error: {0}")]
    Setup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
