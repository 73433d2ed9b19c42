//! Error types for report generation

use std::fmt;
use std::io;

/// Result type alias for report operations
pub type ReportResult<T> = Result<T, ReportError>;

/// Errors that can occur during report generation
#[derive(Debug)]
pub enum ReportError {
    /// I/O error (file read/write)
    Io(io::Error),
    /// Template rendering error
    Template(tera::Error),
    /// PDF layout or rendering error
    Pdf(String),
    /// No usable TrueType font family
    FontsNotFound(Vec<String>),
    /// Serialization of the report context failed
    Serialization(serde_json::Error),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "I/O error: {}", e),
            ReportError::Template(e) => write!(f, "Template error: {}", e),
            ReportError::Pdf(e) => write!(f, "PDF generation error: {}", e),
            ReportError::FontsNotFound(tried) => write!(
                f,
                "No suitable fonts found for the PDF report (tried: {}). \
                 Set report.fonts_dir and report.font_family in the configuration",
                tried.join(", ")
            ),
            ReportError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Io(e) => Some(e),
            ReportError::Template(e) => Some(e),
            ReportError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ReportError {
    fn from(err: io::Error) -> Self {
        ReportError::Io(err)
    }
}

impl From<tera::Error> for ReportError {
    fn from(err: tera::Error) -> Self {
        ReportError::Template(err)
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Serialization(err)
    }
}
