/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for synchronization operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Status code reported by completion events. Zero means success.
pub type Status = i32;

/// Successful completion status
pub const STATUS_SUCCESS: Status = 0;

/// Generic failure status stored by producers that hit an error
pub const STATUS_ERROR: Status = -1;

/// Synchronization errors
///
/// Parameter misuse, substrate failures and deterministic deadlock detection
/// are reported here. Lost lazy-creation races are never errors.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum SyncError {
    #[error("Bad parameter: {0}")]
    #[diagnostic(
        code(sync::bad_param),
        help("The primitive was used in a state that does not permit this operation.")
    )]
    BadParam(&'static str),

    #[error("{op} failed in the {backend} backend (code {code})")]
    #[diagnostic(
        code(sync::substrate),
        help("The native lock or condition primitive reported an error.")
    )]
    Substrate {
        backend: &'static str,
        op: &'static str,
        code: i32,
    },

    #[error("Non-recursive mutex relocked by its owner")]
    #[diagnostic(
        code(sync::would_deadlock),
        help("Create the mutex with `Mutex::new_recursive` if nested locking is intended.")
    )]
    WouldDeadlock,

    #[error("Mutex is not held by the calling context")]
    #[diagnostic(
        code(sync::not_owner),
        help("Only the context that locked a mutex may unlock it or wait on a condition with it.")
    )]
    NotOwner,

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(sync::configuration),
        help("Invalid configuration. Review configuration parameters.")
    )]
    Configuration(String),
}

impl SyncError {
    /// Numeric status matching the error, for callers that report plain codes
    pub fn status(&self) -> Status {
        match self {
            SyncError::BadParam(_) => -5,
            SyncError::Substrate { code, .. } if *code != 0 => *code,
            _ => STATUS_ERROR,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Configuration(err.to_string())
    }
}

/// Serializable error representation for diagnostics export
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SerializableError {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl SerializableError {
    /// Create a new serializable error
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Create a new serializable error with details
    pub fn with_details(
        error_type: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }
}

impl From<SyncError> for SerializableError {
    fn from(err: SyncError) -> Self {
        let error_type = match &err {
            SyncError::BadParam(_) => "bad_param",
            SyncError::Substrate { .. } => "substrate",
            SyncError::WouldDeadlock => "would_deadlock",
            SyncError::NotOwner => "not_owner",
            SyncError::Configuration(_) => "configuration",
        };
        match &err {
            SyncError::Substrate { backend, op, .. } => {
                SerializableError::with_details(error_type, err.to_string(), format!("{backend}::{op}"))
            }
            _ => SerializableError::new(error_type, err.to_string()),
        }
    }
}
