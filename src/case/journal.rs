//! Per-case activity journal
//!
//! `journal.log` holds one line per operator action:
//!
//! ```text
//! [2024-05-02 14:03:11] [Android Backup] Full backup completed: Android_Acquisition/full_backup.ab | SHA-256: 3f9a...
//! ```
//!
//! The file is only ever appended to. Lines that do not match the format
//! (hand edits, older tool versions) are kept verbatim when read back.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::Serialize;

use crate::common::audit;
use crate::common::hash::is_valid_sha256;

/// Timestamp layout used in journal lines
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const HASH_MARKER: &str = " | SHA-256: ";

/// One parsed journal line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: NaiveDateTime,
    pub action: String,
    pub message: String,
    pub sha256: Option<String>,
}

impl LogEntry {
    /// Entry stamped with the current local time
    pub fn now(action: &str, message: &str, sha256: Option<&str>) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            action: action.to_string(),
            message: message.to_string(),
            sha256: sha256.map(str::to_string),
        }
    }

    /// Render as a single journal line (no trailing newline)
    pub fn to_line(&self) -> String {
        // Newlines in free text would split the entry
        let message = self.message.replace(['\r', '\n'], " ");
        let mut line = format!(
            "[{}] [{}] {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.action,
            message
        );
        if let Some(hash) = &self.sha256 {
            line.push_str(HASH_MARKER);
            line.push_str(hash);
        }
        line
    }

    /// Parse a journal line, `None` if it does not follow the format
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('[')?;
        let (stamp, rest) = rest.split_once("] [")?;
        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
        let (action, rest) = rest.split_once(']')?;
        let body = rest.strip_prefix(' ').unwrap_or(rest);

        let (message, sha256) = match body.rsplit_once(HASH_MARKER) {
            Some((message, hash)) if is_valid_sha256(hash.trim()) => {
                (message.to_string(), Some(hash.trim().to_string()))
            }
            _ => (body.to_string(), None),
        };

        Some(Self {
            timestamp,
            action: action.to_string(),
            message,
            sha256,
        })
    }
}

/// A journal line as read back from disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JournalLine {
    Entry(LogEntry),
    Raw { text: String },
}

impl JournalLine {
    pub fn text(&self) -> String {
        match self {
            JournalLine::Entry(entry) => entry.to_line(),
            JournalLine::Raw { text } => text.clone(),
        }
    }
}

/// Append-only writer over a case's `journal.log`
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
    case_name: String,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>, case_name: &str) -> Self {
        Self {
            path: path.into(),
            case_name: case_name.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry and mirror it to the audit trail
    pub fn append(&self, entry: &LogEntry) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", entry.to_line())?;
        file.flush()?;

        audit::log_journal_entry(
            &self.case_name,
            &entry.action,
            &entry.message,
            entry.sha256.as_deref(),
        );
        Ok(())
    }

    /// Shorthand for appending an entry stamped now
    pub fn record(&self, action: &str, message: &str, sha256: Option<&str>) -> io::Result<()> {
        self.append(&LogEntry::now(action, message, sha256))
    }

    /// Every line of the journal; a missing file reads as empty
    pub fn read_all(&self) -> io::Result<Vec<JournalLine>> {
        let text = match std::fs::read(&self.path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        Ok(text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| match LogEntry::parse(line) {
                Some(entry) => JournalLine::Entry(entry),
                None => JournalLine::Raw {
                    text: line.to_string(),
                },
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    const HASH: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn fixed_entry(sha256: Option<&str>) -> LogEntry {
        LogEntry {
            timestamp: NaiveDate::from_ymd_opt(2024, 5, 2)
                .unwrap()
                .and_hms_opt(14, 3, 11)
                .unwrap(),
            action: "Android Backup".to_string(),
            message: "Full backup completed: Android_Acquisition/full_backup.ab".to_string(),
            sha256: sha256.map(str::to_string),
        }
    }

    #[test]
    fn test_line_format() {
        assert_eq!(
            fixed_entry(Some(HASH)).to_line(),
            format!(
                "[2024-05-02 14:03:11] [Android Backup] Full backup completed: Android_Acquisition/full_backup.ab | SHA-256: {}",
                HASH
            )
        );
        assert_eq!(
            fixed_entry(None).to_line(),
            "[2024-05-02 14:03:11] [Android Backup] Full backup completed: Android_Acquisition/full_backup.ab"
        );
    }

    #[test]
    fn test_parse_round_trip() {
        for entry in [fixed_entry(Some(HASH)), fixed_entry(None)] {
            assert_eq!(LogEntry::parse(&entry.to_line()), Some(entry));
        }
    }

    #[test]
    fn test_parse_rejects_foreign_lines() {
        assert_eq!(LogEntry::parse("free text from an older version"), None);
        assert_eq!(LogEntry::parse("[not a date] [X] y"), None);

        // A marker followed by something that is not a digest stays in the message
        let parsed = LogEntry::parse("[2024-05-02 14:03:11] [Note] a | SHA-256: n/a").unwrap();
        assert_eq!(parsed.message, "a | SHA-256: n/a");
        assert_eq!(parsed.sha256, None);
    }

    #[test]
    fn test_newlines_are_flattened() {
        let mut entry = fixed_entry(None);
        entry.message = "first\nsecond".to_string();
        assert!(!entry.to_line().contains('\n'));
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.log");
        std::fs::write(&path, "legacy line\n").unwrap();

        let journal = Journal::new(&path, "Case_Test");
        journal.append(&fixed_entry(Some(HASH))).unwrap();
        journal.record("Note", "second", None).unwrap();

        let lines = journal.read_all().unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            JournalLine::Raw {
                text: "legacy line".to_string()
            }
        );
        assert_eq!(lines[1], JournalLine::Entry(fixed_entry(Some(HASH))));
        match &lines[2] {
            JournalLine::Entry(entry) => {
                assert_eq!(entry.action, "Note");
                assert_eq!(entry.message, "second");
            }
            other => panic!("unexpected line {:?}", other),
        }
    }

    #[test]
    fn test_missing_journal_reads_empty() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::new(dir.path().join("journal.log"), "x");
        assert!(journal.read_all().unwrap().is_empty());
    }
}
