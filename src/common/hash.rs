// SHA-256 digests for acquired evidence
//
// Files are hashed in streaming fashion. Directories (iOS backups, decoded
// Android backups) are hashed over a sorted manifest of per-file digests so
// the result is independent of filesystem traversal order.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, trace};
use walkdir::WalkDir;

use super::BUFFER_SIZE;

/// Canonical algorithm label written to logs and reports
pub const ALGORITHM: &str = "SHA-256";

/// Length of a SHA-256 digest in hex characters
pub const HEX_LENGTH: usize = 64;

/// Compute the SHA-256 of in-memory data
pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Stream a file through SHA-256
#[instrument(skip_all, fields(path = %path.display()))]
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = Sha256::new();
    let mut total = 0u64;

    loop {
        let buf = reader.fill_buf()?;
        let len = buf.len();
        if len == 0 {
            break;
        }
        hasher.update(buf);
        reader.consume(len);
        total += len as u64;
    }

    let hash = hex::encode(hasher.finalize());
    debug!(bytes = total, hash = %hash, "File hash complete");
    Ok(hash)
}

/// One line of a directory manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the hashed root, '/' separated
    pub relative_path: String,
    pub sha256: String,
    pub size: u64,
}

/// Per-file digests under `root`, sorted by relative path
pub fn directory_manifest(root: &Path) -> io::Result<Vec<ManifestEntry>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(io::Error::other)?;
        let relative_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        trace!(file = %relative_path, "Hashing manifest entry");
        entries.push(ManifestEntry {
            sha256: sha256_file(entry.path())?,
            size: entry.metadata().map_err(io::Error::other)?.len(),
            relative_path,
        });
    }
    entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(entries)
}

/// Digest of a directory: SHA-256 over `<relative path>\0<file sha256>\n` lines
pub fn sha256_directory(root: &Path) -> io::Result<String> {
    let manifest = directory_manifest(root)?;
    let mut hasher = Sha256::new();
    for entry in &manifest {
        hasher.update(entry.relative_path.as_bytes());
        hasher.update([0u8]);
        hasher.update(entry.sha256.as_bytes());
        hasher.update(b"\n");
    }
    let hash = hex::encode(hasher.finalize());
    debug!(path = %root.display(), files = manifest.len(), hash = %hash, "Directory hash complete");
    Ok(hash)
}

/// Hash a file or a directory, whichever `path` is
pub fn sha256_path(path: &Path) -> io::Result<String> {
    if path.is_dir() {
        sha256_directory(path)
    } else {
        sha256_file(path)
    }
}

/// Total size in bytes of a file or every file below a directory
pub fn path_size(path: &Path) -> io::Result<u64> {
    if path.is_dir() {
        Ok(directory_manifest(path)?.iter().map(|e| e.size).sum())
    } else {
        Ok(std::fs::metadata(path)?.len())
    }
}

/// Validate that a string looks like a SHA-256 hex digest
pub fn is_valid_sha256(hash: &str) -> bool {
    hash.len() == HEX_LENGTH && hash.chars().all(|c| c.is_ascii_hexdigit())
}

/// True when both strings are hex digests of equal value, ignoring case
pub fn hashes_match(computed: &str, expected: &str) -> bool {
    let computed = computed.trim();
    let expected = expected.trim();
    let is_hex = |h: &str| !h.is_empty() && h.chars().all(|c| c.is_ascii_hexdigit());
    is_hex(computed) && is_hex(expected) && computed.eq_ignore_ascii_case(expected)
}

/// Outcome of re-hashing a registered evidence item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VerificationStatus {
    Verified,
    Mismatch { computed: String },
    Missing,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Verified => "VERIFIED",
            VerificationStatus::Mismatch { .. } => "MISMATCH",
            VerificationStatus::Missing => "MISSING",
        }
    }
}

/// Recompute the digest of `path` and compare it with `expected`
pub fn verify_path(path: &Path, expected: &str) -> io::Result<VerificationStatus> {
    if !path.exists() {
        return Ok(VerificationStatus::Missing);
    }
    let computed = sha256_path(path)?;
    if hashes_match(&computed, expected) {
        Ok(VerificationStatus::Verified)
    } else {
        Ok(VerificationStatus::Mismatch { computed })
    }
}
