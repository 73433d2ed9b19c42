//! File extraction from the case tree
//!
//! Listing and exporting never modify the source: exported files are copied
//! into `Exports/`, hashed on both sides, and registered as new evidence.
//! [`ab`] turns Android backups into a browsable directory tree.

pub mod ab;

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::case::{Case, EvidenceItem, EvidenceKind, Platform, ANDROID_DECODED_DIR, EXPORTS_DIR};
use crate::common::{audit, hash, path_security::safe_join};
use crate::error::{ToolkitError, ToolkitResult};

/// A file found below a case subdirectory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedFile {
    /// Relative to the case directory, '/' separated
    pub relative_path: String,
    pub size: u64,
}

/// Every regular file under `subdir` of the case (`""` for the whole case)
pub fn list_files(case: &Case, subdir: &str) -> ToolkitResult<Vec<ListedFile>> {
    let root = if subdir.trim().is_empty() {
        case.dir().to_path_buf()
    } else {
        safe_join(case.dir(), subdir.trim())?
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(&root).follow_links(false) {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        files.push(ListedFile {
            relative_path: case.relative_path(entry.path())?,
            size: entry.metadata().map_err(std::io::Error::other)?.len(),
        });
    }
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

/// Platform implied by the top-level case folder of `relative`
pub fn platform_for(relative: &str) -> Platform {
    if relative.starts_with("Android_") {
        Platform::Android
    } else if relative.starts_with("iOS_") || relative.starts_with("iLEAPP_") {
        Platform::Ios
    } else {
        Platform::Other
    }
}

/// Copy a case file into `Exports/` and register the copy
pub fn export_file(case: &mut Case, relative: &str) -> ToolkitResult<EvidenceItem> {
    let relative = relative.trim().trim_start_matches("./");
    let source = safe_join(case.dir(), relative)?;
    if !source.is_file() {
        return Err(ToolkitError::InvalidInput(format!(
            "'{}' is not a file",
            relative
        )));
    }
    let relative = case.relative_path(&source)?;
    if relative.starts_with(&format!("{}/", EXPORTS_DIR)) {
        return Err(ToolkitError::InvalidInput(format!(
            "'{}' is already an export",
            relative
        )));
    }

    let destination = case.dir().join(EXPORTS_DIR).join(&relative);
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    let source_hash = hash::sha256_file(&source)?;
    let bytes = fs::copy(&source, &destination)?;
    let dest_hash = hash::sha256_file(&destination)?;
    if !hash::hashes_match(&source_hash, &dest_hash) {
        return Err(ToolkitError::Integrity(format!(
            "export of {} does not match its source (source {}, copy {})",
            relative, source_hash, dest_hash
        )));
    }
    audit::log_data_export(&source, &destination, bytes);

    let description = format!("Copy of {} (source SHA-256 {})", relative, source_hash);
    case.record_evidence(&destination, platform_for(&relative), EvidenceKind::Export, &description)
}

/// Decode an Android backup into `Android_Decoded/<stem>/` and register it
pub fn decode_into_case(case: &mut Case, backup: &Path) -> ToolkitResult<(ab::DecodeSummary, EvidenceItem)> {
    let is_ab = backup
        .extension()
        .map(|e| e.eq_ignore_ascii_case("ab"))
        .unwrap_or(false);
    if !backup.is_file() || !is_ab {
        return Err(ToolkitError::InvalidInput(format!(
            "{} is not an existing .ab file",
            backup.display()
        )));
    }

    let stem = backup
        .file_stem()
        .map(|s| crate::common::sanitize_filename(&s.to_string_lossy()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "backup".to_string());
    let output_dir = case.subdir(ANDROID_DECODED_DIR)?.join(&stem);
    if output_dir.exists() && fs::read_dir(&output_dir)?.next().is_some() {
        return Err(ToolkitError::InvalidInput(format!(
            "{}/{} already exists; decoded backups are not overwritten",
            ANDROID_DECODED_DIR, stem
        )));
    }

    // Unpack next to the final folder and move it into place only when complete
    let staging = output_dir.with_file_name(format!("{}.partial", stem));
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    let mut summary = match ab::decode_backup(backup, &staging) {
        Ok(summary) => summary,
        Err(e) => {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(path = %staging.display(), error = %cleanup, "Failed to remove partial decode");
            }
            return Err(e);
        }
    };
    if output_dir.exists() {
        fs::remove_dir(&output_dir)?;
    }
    fs::rename(&staging, &output_dir)?;
    summary.output_dir = output_dir.clone();
    info!(files = summary.files, "Decoded backup into case");
    let item = case.record_evidence(
        &output_dir,
        Platform::Android,
        EvidenceKind::DecodedBackup,
        &format!("Decoded from {} ({} files)", backup.display(), summary.files),
    )?;
    Ok((summary, item))
}
