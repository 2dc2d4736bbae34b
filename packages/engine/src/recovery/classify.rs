//! Error classification
//!
//! Maps an [`EngineError`] onto a recovery category. Typed information wins:
//! the error variant and the wrapped `io::ErrorKind` are consulted first, the
//! ordered message tables only when neither is conclusive.

use std::fmt;
use std::io;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
    Io,
    Network,
    Crypto,
    Compression,
    Validation,
    Permission,
    Capacity,
    Memory,
    Timeout,
    DataIntegrity,
    Unknown,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 11] = [
        ErrorCategory::Io,
        ErrorCategory::Network,
        ErrorCategory::Crypto,
        ErrorCategory::Compression,
        ErrorCategory::Validation,
        ErrorCategory::Permission,
        ErrorCategory::Capacity,
        ErrorCategory::Memory,
        ErrorCategory::Timeout,
        ErrorCategory::DataIntegrity,
        ErrorCategory::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Io => "io",
            ErrorCategory::Network => "network",
            ErrorCategory::Crypto => "crypto",
            ErrorCategory::Compression => "compression",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Capacity => "capacity",
            ErrorCategory::Memory => "memory",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::DataIntegrity => "data-integrity",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Fixed category to severity map.
    pub fn severity(self) -> Severity {
        match self {
            ErrorCategory::Validation => Severity::Low,
            ErrorCategory::Io
            | ErrorCategory::Network
            | ErrorCategory::Compression
            | ErrorCategory::Timeout
            | ErrorCategory::Unknown => Severity::Medium,
            ErrorCategory::Permission | ErrorCategory::Capacity => Severity::High,
            ErrorCategory::Crypto | ErrorCategory::Memory | ErrorCategory::DataIntegrity => {
                Severity::Critical
            }
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Message patterns, tried in order. The first match wins.
static MESSAGE_PATTERNS: Lazy<Vec<(Regex, ErrorCategory)>> = Lazy::new(|| {
    [
        (
            r"(?i)\b(enospc|no space left|disk full|quota exceeded)",
            ErrorCategory::Capacity,
        ),
        (
            r"(?i)\b(eacces|eperm|permission denied|access denied|read-only file system)",
            ErrorCategory::Permission,
        ),
        (
            r"(?i)\b(enomem|out of memory|heap limit|allocation failed)",
            ErrorCategory::Memory,
        ),
        (
            r"(?i)\b(etimedout|timed out|timeout|deadline exceeded)",
            ErrorCategory::Timeout,
        ),
        (
            r"(?i)\b(econnrefused|econnreset|ehostunreach|enotfound|network|socket|dns)",
            ErrorCategory::Network,
        ),
        (
            r"(?i)\b(checksum|hash mismatch|integrity|corrupt)",
            ErrorCategory::DataIntegrity,
        ),
        (
            r"(?i)\b(decrypt|encrypt|cipher|signature|certificate|crypto)",
            ErrorCategory::Crypto,
        ),
        (
            r"(?i)\b(gzip|deflate|zlib|brotli|compress|decompress)",
            ErrorCategory::Compression,
        ),
        (
            r"(?i)\b(invalid|validation|parse|syntax|unexpected token|malformed)",
            ErrorCategory::Validation,
        ),
        (
            r"(?i)\b(enoent|eexist|eisdir|enotdir|ebusy|emfile|no such file|i/o error)",
            ErrorCategory::Io,
        ),
    ]
    .into_iter()
    .filter_map(|(pattern, category)| Regex::new(pattern).ok().map(|re| (re, category)))
    .collect()
});

pub fn classify(error: &EngineError) -> ErrorCategory {
    match error {
        EngineError::Permission { .. } => ErrorCategory::Permission,
        EngineError::Capacity { .. } => ErrorCategory::Capacity,
        EngineError::Integrity { .. } => ErrorCategory::DataIntegrity,
        EngineError::Parse { .. }
        | EngineError::Validation { .. }
        | EngineError::EditConflict { .. }
        | EngineError::Serialization(_) => ErrorCategory::Validation,
        EngineError::CircuitOpen { category } => *category,
        EngineError::Filesystem { source, .. } => {
            classify_io_kind(source.kind()).unwrap_or_else(|| {
                match classify_message(&source.to_string()) {
                    ErrorCategory::Unknown => ErrorCategory::Io,
                    category => category,
                }
            })
        }
        other => classify_message(&other.to_string()),
    }
}

fn classify_io_kind(kind: io::ErrorKind) -> Option<ErrorCategory> {
    use io::ErrorKind::*;
    let category = match kind {
        PermissionDenied => ErrorCategory::Permission,
        TimedOut => ErrorCategory::Timeout,
        OutOfMemory => ErrorCategory::Memory,
        InvalidData => ErrorCategory::DataIntegrity,
        ConnectionRefused | ConnectionReset | ConnectionAborted | NotConnected | AddrInUse
        | AddrNotAvailable => ErrorCategory::Network,
        NotFound | AlreadyExists | Interrupted | UnexpectedEof | WriteZero | BrokenPipe
        | WouldBlock => ErrorCategory::Io,
        _ => return None,
    };
    Some(category)
}

/// Classify free-form text with the ordered message tables.
pub fn classify_message(message: &str) -> ErrorCategory {
    MESSAGE_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(message))
        .map(|(_, category)| *category)
        .unwrap_or(ErrorCategory::Unknown)
}
