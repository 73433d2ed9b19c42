//! Report data model
//!
//! A [`CaseReport`] is a snapshot of a case at generation time. It is
//! rebuilt from disk every time a report is produced and never edited.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::case::journal::JournalLine;
use crate::case::EvidenceItem;

/// A file present in the case folder when the report was generated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportFile {
    pub name: String,
    /// Relative to the case directory, '/' separated
    pub relative_path: String,
    pub size: u64,
    pub sha256: String,
}

/// Everything rendered into the PDF and Markdown reports
#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub title: String,
    pub case_name: String,
    pub case_id: Uuid,
    pub investigator: String,
    pub analyst: String,
    pub created_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub generated_by: String,
    pub evidence: Vec<EvidenceItem>,
    pub files: Vec<ReportFile>,
    pub journal: Vec<JournalLine>,
}

impl CaseReport {
    /// Generation time in the form printed on the report
    pub fn generated_label(&self) -> String {
        self.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Journal lines rendered back to text
    pub fn journal_text(&self) -> Vec<String> {
        self.journal.iter().map(JournalLine::text).collect()
    }
}
