//! Error types for E2E testing

use thiserror::Error;

use crate::report::Status;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Invalid state transition for '{name}': {from} -> {to}")]
    InvalidState {
        name: String,
        from: Status,
        to: Status,
    },

    #[error("Suite parse error: {0}")]
    SuiteParse(String),

    #[error("Check not found: {0}")]
    CheckNotFound(String),

    #[error("Snippet error: {0}")]
    Snippet(String),

    #[error("Snippet execution failed: {0}")]
    Execution(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Verification failed: {0}")]
    Verification(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
