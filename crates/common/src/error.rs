//! Common error types
//!
//! Every failure the engine can observe while driving the external tools maps
//! onto one of these variants. "Already in the requested state" is not an
//! error and never appears here; operations fold it into a successful outcome.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("Permission denied running '{command}': {detail}")]
    PermissionDenied { command: String, detail: String },

    #[error("Command '{command}' timed out after {seconds:.1}s")]
    Timeout { command: String, seconds: f64 },

    #[error("Device {busid} not found")]
    DeviceNotFound { busid: String },

    #[error("Device {busid} is not published")]
    NotPublished { busid: String },

    #[error("Unrecognized output: {0}")]
    ParseFailure(String),

    #[error("'{command}' failed (exit code {code}): {stderr}")]
    ToolFailure {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Copyable classification of an [`Error`], suitable for serializing into
/// operation outcomes handed to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ToolNotFound,
    PermissionDenied,
    Timeout,
    DeviceNotFound,
    NotPublished,
    ParseFailure,
    ToolFailure,
    InvalidInput,
    Config,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ToolNotFound { .. } => ErrorKind::ToolNotFound,
            Error::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::DeviceNotFound { .. } => ErrorKind::DeviceNotFound,
            Error::NotPublished { .. } => ErrorKind::NotPublished,
            Error::ParseFailure(_) => ErrorKind::ParseFailure,
            Error::ToolFailure { .. } => ErrorKind::ToolFailure,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether calling again later may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::ToolFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
