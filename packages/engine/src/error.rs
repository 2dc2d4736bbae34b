//! Engine Errors

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recovery::ErrorCategory;

/// ENOSPC / ERROR_DISK_FULL
const NO_SPACE_OS_ERRORS: [i32; 2] = [28, 112];

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("{stage} output failed validation: {message}")]
    Validation { stage: &'static str, message: String },

    #[error("filesystem error on {path}: {source}")]
    Filesystem {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("permission denied on {path}: {source}")]
    Permission {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("no space left writing {path}: {source}")]
    Capacity {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("integrity check failed for {path}: expected hash {expected}, found {actual}")]
    Integrity {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("rule {pattern} failed: {message}")]
    RuleApplication { pattern: String, message: String },

    #[error("circuit breaker open for {category} operations")]
    CircuitOpen { category: ErrorCategory },

    #[error("conflicting edits at byte {offset}")]
    EditConflict { offset: u32 },

    #[error("{path} is excluded by the include/exclude configuration")]
    Excluded { path: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backup error: {0}")]
    Backup(String),
}

impl EngineError {
    /// Wrap an I/O failure, routing permission and capacity failures to their
    /// own variants so classification does not depend on message text.
    pub fn io(path: &Path, source: io::Error) -> Self {
        let path = path.display().to_string();
        if source.kind() == io::ErrorKind::PermissionDenied {
            return EngineError::Permission { path, source };
        }
        if source
            .raw_os_error()
            .is_some_and(|code| NO_SPACE_OS_ERRORS.contains(&code))
        {
            return EngineError::Capacity { path, source };
        }
        EngineError::Filesystem { path, source }
    }

    pub fn parse(path: &Path, message: impl Into<String>) -> Self {
        EngineError::Parse {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    pub fn validation(stage: &'static str, message: impl Into<String>) -> Self {
        EngineError::Validation {
            stage,
            message: message.into(),
        }
    }

    /// Stable machine-readable name used in structured results.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Parse { .. } => "parse",
            EngineError::Validation { .. } => "validation",
            EngineError::Filesystem { .. } => "filesystem",
            EngineError::Permission { .. } => "permission",
            EngineError::Capacity { .. } => "capacity",
            EngineError::Integrity { .. } => "integrity",
            EngineError::RuleApplication { .. } => "rule-application",
            EngineError::CircuitOpen { .. } => "circuit-open",
            EngineError::EditConflict { .. } => "edit-conflict",
            EngineError::Excluded { .. } => "excluded",
            EngineError::Config(_) => "config",
            EngineError::Serialization(_) => "serialization",
            EngineError::Backup(_) => "backup",
        }
    }
}

/// Serializable projection of an [`EngineError`] for result documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
}

impl From<&EngineError> for ErrorInfo {
    fn from(error: &EngineError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

impl ErrorInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}
