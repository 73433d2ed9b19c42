//! Crate-wide error type

use std::io;

use thiserror::Error;

use crate::common::path_security::PathSecurityError;
use crate::report::ReportError;

#[cfg(feature = "ai-assistant")]
use crate::analysis::ai::AiError;

/// Result type alias for toolkit operations
pub type ToolkitResult<T> = Result<T, ToolkitError>;

/// Errors surfaced to the operator by menu actions
#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("no case is open; create or open a case first")]
    NoActiveCase,

    #[error("case '{0}' already exists")]
    CaseExists(String),

    #[error("case '{0}' not found")]
    CaseNotFound(String),

    #[error("invalid case name '{0}': use a single folder name without path separators")]
    InvalidCaseName(String),

    #[error("external tool '{tool}' could not be started: {source}")]
    ToolUnavailable {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("external tool '{tool}' is not configured")]
    ToolNotConfigured { tool: String },

    #[error("{tool} failed with {status}{}", tail_suffix(.tail))]
    ToolFailed {
        tool: String,
        status: String,
        tail: String,
    },

    #[error("no authorized device: {0}")]
    NoDevice(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    PathSecurity(#[from] PathSecurityError),

    #[error("Android backup error: {0}")]
    BackupFormat(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("case metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[cfg(feature = "ai-assistant")]
    #[error(transparent)]
    Ai(#[from] AiError),
}

fn tail_suffix(tail: &str) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!(": {}", tail)
    }
}

impl ToolkitError {
    /// Short category used as the action label when a failure is journaled
    pub fn category(&self) -> &'static str {
        match self {
            ToolkitError::Io(_) => "io",
            ToolkitError::NoActiveCase => "no-case",
            ToolkitError::CaseExists(_) | ToolkitError::CaseNotFound(_) => "case",
            ToolkitError::InvalidCaseName(_) | ToolkitError::InvalidInput(_) => "input",
            ToolkitError::ToolUnavailable { .. }
            | ToolkitError::ToolNotConfigured { .. }
            | ToolkitError::ToolFailed { .. } => "tool",
            ToolkitError::NoDevice(_) => "device",
            ToolkitError::PathSecurity(_) => "security",
            ToolkitError::BackupFormat(_) => "backup-format",
            ToolkitError::Integrity(_) => "integrity",
            ToolkitError::Database(_) => "database",
            ToolkitError::Metadata(_) => "metadata",
            ToolkitError::Config(_) => "config",
            ToolkitError::Report(_) => "report",
            #[cfg(feature = "ai-assistant")]
            ToolkitError::Ai(_) => "ai",
        }
    }
}
