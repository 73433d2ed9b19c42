//! Case management
//!
//! A case is a folder below the acquisition directory holding `case.json`
//! (metadata and the evidence registry), `journal.log` and every artifact
//! acquired for it. Cases are created and appended to, never deleted.

pub mod journal;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::common::audit;
use crate::common::hash::{self, VerificationStatus};
use crate::common::path_security::is_plain_component;
use crate::error::{ToolkitError, ToolkitResult};

pub use journal::{Journal, JournalLine, LogEntry};

/// Current case.json format version
pub const CASE_FORMAT_VERSION: u32 = 1;

/// Application version written into case metadata
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const CASE_FILE: &str = "case.json";
pub const JOURNAL_FILE: &str = "journal.log";
pub const TRANSCRIPT_FILE: &str = "transcript.log";

pub const ANDROID_DIR: &str = "Android_Acquisition";
pub const ANDROID_PULLED_DIR: &str = "Android_Acquisition/Pulled_Files";
pub const ANDROID_DECODED_DIR: &str = "Android_Decoded";
pub const IOS_DIR: &str = "iOS_Acquisition";
pub const ILEAPP_DIR: &str = "iLEAPP_Reports";
pub const EXPORTS_DIR: &str = "Exports";

/// Investigator recorded for folders that predate case.json
pub const UNKNOWN_INVESTIGATOR: &str = "unknown";

/// Device platform an evidence item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Android,
    Ios,
    Other,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "Android",
            Platform::Ios => "iOS",
            Platform::Other => "Other",
        }
    }
}

/// What produced an evidence item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    FullBackup,
    AppBackup,
    Logcat,
    PulledFile,
    DecodedBackup,
    Export,
}

impl EvidenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceKind::FullBackup => "Full backup",
            EvidenceKind::AppBackup => "App backup",
            EvidenceKind::Logcat => "Logcat",
            EvidenceKind::PulledFile => "Pulled file",
            EvidenceKind::DecodedBackup => "Decoded backup",
            EvidenceKind::Export => "Export",
        }
    }
}

/// A registered artifact with its acquisition-time digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Sequential identifier, `EV-001`, `EV-002`, ...
    pub id: String,
    /// Path relative to the case directory, '/' separated
    pub relative_path: String,
    pub platform: Platform,
    pub kind: EvidenceKind,
    pub description: String,
    pub sha256: String,
    pub size: u64,
    pub acquired_at: DateTime<Utc>,
}

/// Contents of case.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseMetadata {
    pub version: u32,
    pub id: Uuid,
    pub name: String,
    pub investigator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub app_version: String,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
}

impl CaseMetadata {
    pub fn new(name: &str, investigator: &str) -> Self {
        let now = Utc::now();
        Self {
            version: CASE_FORMAT_VERSION,
            id: Uuid::new_v4(),
            name: name.to_string(),
            investigator: investigator.to_string(),
            created_at: now,
            updated_at: now,
            app_version: APP_VERSION.to_string(),
            evidence: Vec::new(),
        }
    }

    /// Update the updated_at timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.app_version = APP_VERSION.to_string();
    }

    fn next_evidence_id(&self) -> String {
        format!("EV-{:03}", self.evidence.len() + 1)
    }
}

/// Result of re-hashing one registered item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationRecord {
    pub item: EvidenceItem,
    pub status: VerificationStatus,
}

/// Creates, opens and lists cases below the acquisition directory
#[derive(Debug, Clone)]
pub struct CaseManager {
    root: PathBuf,
}

impl CaseManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn case_dir(&self, name: &str) -> ToolkitResult<PathBuf> {
        let trimmed = name.trim();
        if !is_plain_component(trimmed) {
            audit::log_security_event("invalid_case_name", name, Some(&self.root));
            return Err(ToolkitError::InvalidCaseName(name.to_string()));
        }
        Ok(self.root.join(trimmed))
    }

    /// Create a new case folder with metadata and an empty journal
    pub fn create(&self, name: &str, investigator: &str) -> ToolkitResult<Case> {
        let dir = self.case_dir(name)?;
        let investigator = investigator.trim();
        if investigator.is_empty() {
            return Err(ToolkitError::InvalidInput(
                "investigator name is required".to_string(),
            ));
        }
        if dir.exists() {
            return Err(ToolkitError::CaseExists(name.trim().to_string()));
        }

        fs::create_dir_all(&dir)?;
        let metadata = CaseMetadata::new(name.trim(), investigator);
        let case = Case::from_parts(dir, metadata);
        case.save()?;
        case.log(
            "Case created",
            &format!("Case '{}' created by {}", case.name(), investigator),
            None,
        )?;
        info!(case = %case.name(), id = %case.metadata.id, "Case created");
        Ok(case)
    }

    /// Open an existing case, synthesizing metadata for legacy folders
    pub fn open(&self, name: &str) -> ToolkitResult<Case> {
        let dir = self.case_dir(name)?;
        if !dir.is_dir() {
            return Err(ToolkitError::CaseNotFound(name.trim().to_string()));
        }

        let metadata_path = dir.join(CASE_FILE);
        let case = if metadata_path.exists() {
            let json = fs::read_to_string(&metadata_path)?;
            let metadata: CaseMetadata = serde_json::from_str(&json)?;
            if metadata.version > CASE_FORMAT_VERSION {
                warn!(
                    "Case file version {} is newer than supported version {}",
                    metadata.version, CASE_FORMAT_VERSION
                );
            }
            Case::from_parts(dir, metadata)
        } else {
            let mut metadata = CaseMetadata::new(name.trim(), UNKNOWN_INVESTIGATOR);
            if let Some(created) = fs::metadata(&dir)
                .and_then(|m| m.created().or_else(|_| m.modified()))
                .ok()
            {
                metadata.created_at = DateTime::<Utc>::from(created);
            }
            let case = Case::from_parts(dir, metadata);
            case.save()?;
            case.log(
                "Case metadata",
                "case.json was missing; metadata synthesized for an existing folder",
                None,
            )?;
            warn!(case = %case.name(), "Synthesized metadata for legacy case folder");
            case
        };

        case.log("Case opened", &format!("Case '{}' opened", case.name()), None)?;
        info!(case = %case.name(), evidence = case.metadata.evidence.len(), "Case opened");
        Ok(case)
    }

    /// Case folder names, sorted
    pub fn list(&self) -> ToolkitResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// An open case
#[derive(Debug, Clone)]
pub struct Case {
    dir: PathBuf,
    metadata: CaseMetadata,
    journal: Journal,
}

impl Case {
    fn from_parts(dir: PathBuf, metadata: CaseMetadata) -> Self {
        let journal = Journal::new(dir.join(JOURNAL_FILE), &metadata.name);
        Self {
            dir,
            metadata,
            journal,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn metadata(&self) -> &CaseMetadata {
        &self.metadata
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.dir.join(TRANSCRIPT_FILE)
    }

    /// Path of a case subdirectory, created if missing
    pub fn subdir(&self, relative: &str) -> ToolkitResult<PathBuf> {
        let path = self.dir.join(relative);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    pub fn report_pdf_path(&self) -> PathBuf {
        self.dir.join(format!("{}_Report.pdf", self.name()))
    }

    pub fn report_markdown_path(&self) -> PathBuf {
        self.dir.join(format!("{}_Report.md", self.name()))
    }

    /// '/'-separated path of `path` relative to the case directory
    pub fn relative_path(&self, path: &Path) -> ToolkitResult<String> {
        // Canonicalized paths (from safe_join) only match the canonical case dir
        let relative = path
            .strip_prefix(&self.dir)
            .ok()
            .map(Path::to_path_buf)
            .or_else(|| {
                let canonical = self.dir.canonicalize().ok()?;
                path.strip_prefix(&canonical).ok().map(Path::to_path_buf)
            })
            .ok_or_else(|| {
                ToolkitError::InvalidInput(format!(
                    "{} is outside case folder {}",
                    path.display(),
                    self.dir.display()
                ))
            })?;
        Ok(relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"))
    }

    /// Append an entry to the case journal
    pub fn log(&self, action: &str, message: &str, sha256: Option<&str>) -> ToolkitResult<()> {
        self.journal.record(action, message, sha256)?;
        Ok(())
    }

    /// Write case.json atomically
    pub fn save(&self) -> ToolkitResult<()> {
        let json = serde_json::to_string_pretty(&self.metadata)?;
        let target = self.dir.join(CASE_FILE);
        let tmp = self.dir.join(format!("{}.tmp", CASE_FILE));
        fs::write(&tmp, json.as_bytes())?;
        fs::rename(&tmp, &target)?;
        debug!(path = %target.display(), bytes = json.len(), "Case metadata saved");
        Ok(())
    }

    /// Hash `path`, register it as evidence and journal the digest
    pub fn record_evidence(
        &mut self,
        path: &Path,
        platform: Platform,
        kind: EvidenceKind,
        description: &str,
    ) -> ToolkitResult<EvidenceItem> {
        let relative_path = self.relative_path(path)?;
        if !path.exists() {
            return Err(ToolkitError::Integrity(format!(
                "expected artifact {} was not produced",
                relative_path
            )));
        }

        let sha256 = hash::sha256_path(path)?;
        let size = hash::path_size(path)?;
        let item = EvidenceItem {
            id: self.metadata.next_evidence_id(),
            relative_path,
            platform,
            kind,
            description: description.to_string(),
            sha256,
            size,
            acquired_at: Utc::now(),
        };

        self.metadata.evidence.push(item.clone());
        self.metadata.touch();
        self.save()?;

        audit::log_evidence_registered(self.name(), &item);
        self.log(
            "Evidence",
            &format!(
                "{} {} registered: {} ({} bytes)",
                item.id,
                kind.as_str(),
                item.relative_path,
                item.size
            ),
            Some(&item.sha256),
        )?;
        Ok(item)
    }

    /// Recompute the digest of every registered item
    pub fn verify_evidence(&self) -> ToolkitResult<Vec<VerificationRecord>> {
        let mut records = Vec::with_capacity(self.metadata.evidence.len());
        for item in &self.metadata.evidence {
            let path = self.dir.join(&item.relative_path);
            let status = hash::verify_path(&path, &item.sha256)?;
            audit::log_hash_verification(self.name(), item, &status);

            let message = match &status {
                VerificationStatus::Mismatch { computed } => format!(
                    "{} {}: {} (now {})",
                    item.id,
                    item.relative_path,
                    status.as_str(),
                    computed
                ),
                _ => format!("{} {}: {}", item.id, item.relative_path, status.as_str()),
            };
            self.log("Verify", &message, Some(&item.sha256))?;

            records.push(VerificationRecord {
                item: item.clone(),
                status,
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_reopen() {
        let root = TempDir::new().unwrap();
        let manager = CaseManager::new(root.path());

        let case = manager.create("Case_001", "J. Doe").unwrap();
        assert!(case.dir().join(CASE_FILE).exists());
        assert_eq!(case.metadata().investigator, "J. Doe");

        let reopened = manager.open("Case_001").unwrap();
        assert_eq!(reopened.metadata().id, case.metadata().id);

        let actions: Vec<String> = reopened
            .journal()
            .read_all()
            .unwrap()
            .into_iter()
            .filter_map(|line| match line {
                JournalLine::Entry(e) => Some(e.action),
                JournalLine::Raw { .. } => None,
            })
            .collect();
        assert_eq!(actions, vec!["Case created", "Case opened"]);
    }

    #[test]
    fn test_create_rejects_bad_names() {
        let root = TempDir::new().unwrap();
        let manager = CaseManager::new(root.path());

        for name in ["", "  ", "../escape", "a/b", "..", "x\\y"] {
            assert!(
                matches!(manager.create(name, "J. Doe"), Err(ToolkitError::InvalidCaseName(_))),
                "name {:?} accepted",
                name
            );
        }
        assert!(matches!(
            manager.create("Case", " "),
            Err(ToolkitError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_create_existing_fails() {
        let root = TempDir::new().unwrap();
        let manager = CaseManager::new(root.path());
        manager.create("Dup", "A").unwrap();
        assert!(matches!(manager.create("Dup", "B"), Err(ToolkitError::CaseExists(_))));
    }

    #[test]
    fn test_open_missing_case() {
        let root = TempDir::new().unwrap();
        let manager = CaseManager::new(root.path());
        assert!(matches!(manager.open("nope"), Err(ToolkitError::CaseNotFound(_))));
    }

    #[test]
    fn test_open_legacy_folder() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("Old_Case/Android_Acquisition")).unwrap();

        let manager = CaseManager::new(root.path());
        let case = manager.open("Old_Case").unwrap();
        assert_eq!(case.metadata().investigator, UNKNOWN_INVESTIGATOR);
        assert!(case.dir().join(CASE_FILE).exists());
    }

    #[test]
    fn test_list_sorted() {
        let root = TempDir::new().unwrap();
        let manager = CaseManager::new(root.path());
        assert!(manager.list().unwrap().is_empty());

        manager.create("b", "x").unwrap();
        manager.create("a", "x").unwrap();
        std::fs::write(root.path().join("stray.txt"), b"").unwrap();
        assert_eq!(manager.list().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_record_and_verify_evidence() {
        let root = TempDir::new().unwrap();
        let manager = CaseManager::new(root.path());
        let mut case = manager.create("Case", "x").unwrap();

        let dir = case.subdir(ANDROID_DIR).unwrap();
        let file = dir.join("logcat.txt");
        std::fs::write(&file, b"hello world").unwrap();

        let item = case
            .record_evidence(&file, Platform::Android, EvidenceKind::Logcat, "logcat dump")
            .unwrap();
        assert_eq!(item.id, "EV-001");
        assert_eq!(item.relative_path, "Android_Acquisition/logcat.txt");
        assert_eq!(item.size, 11);

        // Registry survives reopen
        let reopened = manager.open("Case").unwrap();
        assert_eq!(reopened.metadata().evidence, vec![item]);

        let records = reopened.verify_evidence().unwrap();
        assert_eq!(records[0].status, VerificationStatus::Verified);

        std::fs::write(&file, b"changed").unwrap();
        assert!(matches!(
            reopened.verify_evidence().unwrap()[0].status,
            VerificationStatus::Mismatch { .. }
        ));

        std::fs::remove_file(&file).unwrap();
        assert_eq!(
            reopened.verify_evidence().unwrap()[0].status,
            VerificationStatus::Missing
        );
    }

    #[test]
    fn test_record_evidence_outside_case() {
        let root = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let manager = CaseManager::new(root.path());
        let mut case = manager.create("Case", "x").unwrap();

        let outside = other.path().join("f.txt");
        std::fs::write(&outside, b"x").unwrap();
        assert!(matches!(
            case.record_evidence(&outside, Platform::Other, EvidenceKind::Export, ""),
            Err(ToolkitError::InvalidInput(_))
        ));
        let absent = case.dir().join("absent.ab");
        assert!(matches!(
            case.record_evidence(&absent, Platform::Android, EvidenceKind::FullBackup, ""),
            Err(ToolkitError::Integrity(_))
        ));
    }
}
