//! Error types for chorehub
//!
//! Every engine error is synchronous and leaves the snapshot untouched.
//! Kinds map onto HTTP statuses for the request layer and onto exit
//! codes for the CLI:
//! - Validation: 400 / exit 2
//! - NotFound: 404 / exit 2
//! - Forbidden: 403 / exit 3
//! - Conflict (no effect): 409 / exit 3
//! - Internal: 500 / exit 4

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the chorehub CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Coarse error classification shared by the HTTP and CLI front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Conflict,
    Internal,
}

/// Main error type for chorehub operations
#[derive(Error, Debug)]
pub enum Error {
    // Validation
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Not found
    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Subtask not found: {0}")]
    SubtaskNotFound(String),

    // Forbidden
    #[error("{actor} may not {action} task {task}")]
    Forbidden {
        actor: String,
        task: String,
        action: String,
    },

    // Conflict / no effect
    #[error("Action {action} has no effect on task {task} in its current state")]
    NoEffect { task: String, action: String },

    #[error("Task {0} is in the recycle bin; only restore or purge are allowed")]
    TaskDeleted(String),

    // Internal
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::InvalidArgument(_) | Error::InvalidConfig(_) => {
                ErrorKind::Validation
            }

            Error::MemberNotFound(_) | Error::TaskNotFound(_) | Error::SubtaskNotFound(_) => {
                ErrorKind::NotFound
            }

            Error::Forbidden { .. } => ErrorKind::Forbidden,

            Error::NoEffect { .. } | Error::TaskDeleted(_) => ErrorKind::Conflict,

            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status for the request layer
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Forbidden => 403,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::NotFound => exit_codes::USER_ERROR,
            ErrorKind::Forbidden | ErrorKind::Conflict => exit_codes::BLOCKED,
            ErrorKind::Internal => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured fields for JSON error bodies.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::Forbidden {
                actor,
                task,
                action,
            } => Some(serde_json::json!({
                "actor": actor,
                "task": task,
                "action": action,
            })),
            Error::NoEffect { task, action } => Some(serde_json::json!({
                "task": task,
                "action": action,
            })),
            Error::TaskDeleted(task) => Some(serde_json::json!({ "task": task })),
            Error::MemberNotFound(id) | Error::TaskNotFound(id) | Error::SubtaskNotFound(id) => {
                Some(serde_json::json!({ "id": id }))
            }
            Error::Validation(message) | Error::InvalidConfig(message) => {
                Some(serde_json::json!({ "message": message }))
            }
            _ => None,
        }
    }
}

/// Result type alias for chorehub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub kind: ErrorKind,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            kind: err.kind(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
