// probeflow-core/src/infrastructure/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum StateStoreError {
    #[error("SQLite Engine Error: {0}")]
    #[diagnostic(
        code(probeflow::infra::state::sqlite),
        help("An error occurred inside the task store.")
    )]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    // --- TASK STORE (Abstracted) ---
    #[error(transparent)]
    #[diagnostic(transparent)]
    State(#[from] StateStoreError),

    // --- FILESYSTEM (IO) ---
    #[error("File System Error: {0}")]
    #[diagnostic(
        code(probeflow::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),

    // --- CONFIG / YAML ---
    #[error("YAML Parsing Error: {0}")]
    #[diagnostic(
        code(probeflow::infra::yaml),
        help("Check your YAML syntax (indentation, types).")
    )]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON Parsing Error: {0}")]
    #[diagnostic(
        code(probeflow::infra::json),
        help("Check the JSON document syntax.")
    )]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("Scope file not found at '{0}'")]
    #[diagnostic(code(probeflow::infra::scope_missing))]
    ScopeNotFound(String),

    // --- SUBPROCESS ---
    #[error("Command parse error: {0}")]
    #[diagnostic(code(probeflow::infra::command))]
    CommandParse(String),

    #[error("Timeout after {secs}s: {command}")]
    #[diagnostic(
        code(probeflow::infra::command_timeout),
        help("The probe exceeded its wall-clock ceiling and was killed.")
    )]
    CommandTimeout { secs: u64, command: String },

    // --- TEMPLATING ---
    #[error("Template Rendering Error: {0}")]
    #[diagnostic(
        code(probeflow::infra::template),
        help("Check the report template syntax ({{ ... }}).")
    )]
    TemplateError(#[from] minijinja::Error),
}

// Manual implementation for shortcuts (e.g. `?` operator on rusqlite calls)
impl From<rusqlite::Error> for InfrastructureError {
    fn from(err: rusqlite::Error) -> Self {
        InfrastructureError::State(StateStoreError::Sqlite(err))
    }
}
