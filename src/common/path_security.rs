//! Path Security Utilities
//!
//! Case names and operator-supplied relative paths end up joined onto the
//! acquisition directory. These helpers keep them inside it.

use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use super::audit;

/// Error type for path security operations
#[derive(Debug, Clone)]
pub enum PathSecurityError {
    /// Path traversal attempt detected
    TraversalDetected(String),
    /// Path canonicalization failed
    CanonicalizationFailed(String),
    /// Path is not under expected base
    NotUnderBase { path: String, base: String },
}

impl std::fmt::Display for PathSecurityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSecurityError::TraversalDetected(path) => {
                write!(f, "Path traversal detected: {}", path)
            }
            PathSecurityError::CanonicalizationFailed(msg) => {
                write!(f, "Failed to canonicalize path: {}", msg)
            }
            PathSecurityError::NotUnderBase { path, base } => {
                write!(f, "Path '{}' is not under base '{}'", path, base)
            }
        }
    }
}

impl std::error::Error for PathSecurityError {}

/// Result type for path security operations
pub type PathSecurityResult<T> = Result<T, PathSecurityError>;

/// Join an existing relative path onto `base` and prove it stays below it.
///
/// Both sides are canonicalized, so `relative` must exist. Symlinks that
/// point outside `base` are rejected as well.
pub fn safe_join(base: &Path, relative: &str) -> PathSecurityResult<PathBuf> {
    if contains_traversal_pattern(relative) {
        audit::log_security_event("path_traversal", relative, Some(base));
        return Err(PathSecurityError::TraversalDetected(relative.to_string()));
    }

    let canonical_base = base
        .canonicalize()
        .map_err(|e| PathSecurityError::CanonicalizationFailed(format!("Base path: {}", e)))?;
    let canonical_joined = base
        .join(relative)
        .canonicalize()
        .map_err(|e| PathSecurityError::CanonicalizationFailed(format!("{}: {}", relative, e)))?;

    if !canonical_joined.starts_with(&canonical_base) {
        warn!(
            target: "security",
            path = %canonical_joined.display(),
            base = %canonical_base.display(),
            "Path escapes base directory"
        );
        return Err(PathSecurityError::NotUnderBase {
            path: canonical_joined.display().to_string(),
            base: canonical_base.display().to_string(),
        });
    }

    debug!(target: "security", path = %canonical_joined.display(), "Path validation successful");
    Ok(canonical_joined)
}

/// Check if a filename contains path traversal patterns.
///
/// Detects `..` components, absolute paths (Unix and Windows), null bytes and
/// URL-encoded separators.
pub fn contains_traversal_pattern(filename: &str) -> bool {
    if filename.contains('\0') {
        return true;
    }

    if filename
        .split(['/', '\\'])
        .any(|component| component == "..")
    {
        return true;
    }

    if filename.starts_with('/') || filename.starts_with('\\') {
        return true;
    }

    let bytes = filename.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return true;
    }

    let lower = filename.to_lowercase();
    lower.contains("%2e%2e") || lower.contains("%2f") || lower.contains("%5c")
}

/// Sanitize a filename by removing dangerous characters.
///
/// Path separators become `_`; control characters and Windows reserved
/// characters are dropped; leading/trailing dots and spaces are trimmed.
pub fn sanitize_filename(filename: &str) -> String {
    let mut sanitized = String::with_capacity(filename.len());

    for c in filename.chars() {
        match c {
            '\0'..='\x1f' | '\x7f' => continue,
            '/' | '\\' => sanitized.push('_'),
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => continue,
            _ => sanitized.push(c),
        }
    }

    sanitized.trim_matches(|c| c == '.' || c == ' ').to_string()
}

/// True when `name` can be used verbatim as a single directory name
pub fn is_plain_component(name: &str) -> bool {
    !name.is_empty()
        && sanitize_filename(name) == name
        && matches!(Path::new(name).components().next(), Some(Component::Normal(_)))
        && Path::new(name).components().count() == 1
}

/// Last component of a POSIX device path, sanitized for local use
pub fn remote_basename(remote: &str) -> Option<String> {
    let name = remote.trim_end_matches('/').rsplit('/').next()?;
    let sanitized = sanitize_filename(name);
    if sanitized.is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_contains_traversal_pattern() {
        assert!(contains_traversal_pattern("../secret.txt"));
        assert!(contains_traversal_pattern("..\\secret.txt"));
        assert!(contains_traversal_pattern("foo/../bar"));
        assert!(contains_traversal_pattern("/etc/passwd"));
        assert!(contains_traversal_pattern("C:\\Windows"));
        assert!(contains_traversal_pattern("file\0.txt"));
        assert!(contains_traversal_pattern("%2e%2e/secret"));

        assert!(!contains_traversal_pattern("file.txt"));
        assert!(!contains_traversal_pattern("Android_Acquisition/logcat.txt"));
        assert!(!contains_traversal_pattern("file..name.txt"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("normal.txt"), "normal.txt");
        assert_eq!(sanitize_filename("path/to/file.txt"), "path_to_file.txt");
        assert_eq!(sanitize_filename("file<>:\"|?*.txt"), "file.txt");
        assert_eq!(sanitize_filename("...hidden..."), "hidden");
    }

    #[test]
    fn test_is_plain_component() {
        assert!(is_plain_component("Case_Dupont"));
        assert!(is_plain_component("2024-001 Smith"));
        assert!(!is_plain_component(""));
        assert!(!is_plain_component(".."));
        assert!(!is_plain_component("a/b"));
        assert!(!is_plain_component("bad:name"));
    }

    #[test]
    fn test_remote_basename() {
        assert_eq!(remote_basename("/sdcard/DCIM"), Some("DCIM".to_string()));
        assert_eq!(remote_basename("/sdcard/DCIM/"), Some("DCIM".to_string()));
        assert_eq!(
            remote_basename("/data/data/com.whatsapp/databases/msgstore.db"),
            Some("msgstore.db".to_string())
        );
        assert_eq!(remote_basename("/"), None);
    }

    #[test]
    fn test_safe_join() {
        let base = TempDir::new().unwrap();
        std::fs::create_dir_all(base.path().join("Android_Acquisition")).unwrap();
        std::fs::write(base.path().join("Android_Acquisition/logcat.txt"), b"x").unwrap();

        let joined = safe_join(base.path(), "Android_Acquisition/logcat.txt").unwrap();
        assert!(joined.ends_with("logcat.txt"));

        assert!(matches!(
            safe_join(base.path(), "../outside"),
            Err(PathSecurityError::TraversalDetected(_))
        ));
        assert!(matches!(
            safe_join(base.path(), "missing.txt"),
            Err(PathSecurityError::CanonicalizationFailed(_))
        ));
    }
}
