//! Keyword search over a case folder
//!
//! Matching is whole-word and case-insensitive, line by line. Binary
//! containers and media are skipped by extension; every other file is read
//! as lossy UTF-8.

use std::path::Path;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::case::CASE_FILE;
use crate::error::{ToolkitError, ToolkitResult};

/// Extensions never searched
pub const SKIPPED_EXTENSIONS: [&str; 7] = ["ab", "jpg", "png", "mp4", "pdf", "log", "db"];

/// Split a comma-separated list into trimmed, lowercased, unique keywords
pub fn parse_keywords(input: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for keyword in input.split(',').map(|k| k.trim().to_lowercase()) {
        if !keyword.is_empty() && !keywords.contains(&keyword) {
            keywords.push(keyword);
        }
    }
    keywords
}

/// True when `path` is excluded from the search
pub fn is_skipped(path: &Path) -> bool {
    if path.file_name().map(|n| n == CASE_FILE).unwrap_or(false) {
        return true;
    }
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            SKIPPED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Compiled whole-word patterns, one per keyword
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    patterns: Vec<(String, Regex)>,
}

impl KeywordMatcher {
    pub fn new(keywords: &[String]) -> ToolkitResult<Self> {
        let patterns = keywords
            .iter()
            .map(|k| {
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(k)))
                    .map(|re| (k.clone(), re))
                    .map_err(|e| ToolkitError::InvalidInput(format!("keyword '{}': {}", k, e)))
            })
            .collect::<ToolkitResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Keywords found in `line`
    pub fn matches(&self, line: &str) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|(_, re)| re.is_match(line))
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

/// One matching line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    /// Relative to the searched root, '/' separated
    pub relative_path: String,
    pub line_number: usize,
    pub keyword: String,
    pub line: String,
}

/// Totals of one search run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    pub keywords: Vec<String>,
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub hits: Vec<SearchHit>,
}

/// Search every eligible file under `root`, reporting hits as they are found
///
/// `exclude` receives each file's '/' separated path relative to `root`;
/// excluded files count as skipped.
pub fn search_tree(
    root: &Path,
    keywords: &[String],
    exclude: &dyn Fn(&str) -> bool,
    on_hit: &mut dyn FnMut(&SearchHit),
) -> ToolkitResult<SearchReport> {
    let mut report = SearchReport {
        keywords: keywords.to_vec(),
        ..Default::default()
    };
    if keywords.is_empty() {
        return Ok(report);
    }
    let matcher = KeywordMatcher::new(keywords)?;

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative_path = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if is_skipped(entry.path()) || exclude(&relative_path) {
            report.files_skipped += 1;
            continue;
        }

        let bytes = match std::fs::read(entry.path()) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "Unreadable file skipped");
                report.files_skipped += 1;
                continue;
            }
        };
        report.files_scanned += 1;


        let text = String::from_utf8_lossy(&bytes);
        for (index, line) in text.lines().enumerate() {
            for keyword in matcher.matches(line) {
                let hit = SearchHit {
                    relative_path: relative_path.clone(),
                    line_number: index + 1,
                    keyword: keyword.to_string(),
                    line: line.trim().to_string(),
                };
                on_hit(&hit);
                report.hits.push(hit);
            }
        }
    }

    info!(
        keywords = ?report.keywords,
        scanned = report.files_scanned,
        skipped = report.files_skipped,
        hits = report.hits.len(),
        "Keyword search complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_keywords() {
        assert_eq!(parse_keywords(" Bitcoin, wallet ,,BITCOIN"), vec!["bitcoin", "wallet"]);
        assert!(parse_keywords("").is_empty());
        assert!(parse_keywords(" , ,").is_empty());
    }

    #[test]
    fn test_whole_word_case_insensitive() {
        let matcher = KeywordMatcher::new(&parse_keywords("pass,c.d")).unwrap();
        assert_eq!(matcher.matches("Enter PASS now"), vec!["pass"]);
        assert_eq!(matcher.matches("password reset").len(), 0);
        // Regex metacharacters are literal
        assert_eq!(matcher.matches("see c.d here").len(), 1);
        assert_eq!(matcher.matches("see cxd here").len(), 0);
    }

    #[test]
    fn test_is_skipped() {
        assert!(is_skipped(Path::new("Android_Acquisition/full_backup.ab")));
        assert!(is_skipped(Path::new("DCIM/IMG_0001.JPG")));
        assert!(is_skipped(Path::new("journal.log")));
        assert!(is_skipped(Path::new("case.json")));
        assert!(!is_skipped(Path::new("Android_Acquisition/logcat.txt")));
        assert!(!is_skipped(Path::new("notes")));
    }

    #[test]
    fn test_search_tree() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("Android_Acquisition")).unwrap();
        std::fs::write(
            dir.path().join("Android_Acquisition/logcat.txt"),
            "boot\nsent Bitcoin to wallet\nbitcoins everywhere\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("journal.log"), "bitcoin").unwrap();
        std::fs::write(dir.path().join("raw.bin"), [0xffu8, 0xfe, b'\n', b'w', b'a', b'l', b'l', b'e', b't']).unwrap();

        let mut streamed = 0;
        let report = search_tree(
            dir.path(),
            &parse_keywords("bitcoin,wallet"),
            &|_| false,
            &mut |_| streamed += 1,
        ).unwrap();

        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(streamed, report.hits.len());
        assert_eq!(report.hits.len(), 3);
        assert_eq!(report.hits[0].relative_path, "Android_Acquisition/logcat.txt");
        assert_eq!(report.hits[0].line_number, 2);
        assert_eq!(report.hits[0].keyword, "bitcoin");
        assert_eq!(report.hits[1].keyword, "wallet");
        assert_eq!(report.hits[2].relative_path, "raw.bin");
        assert_eq!(report.hits[2].line_number, 2);
    }

    #[test]
    fn test_excluded_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("C1_Report.md"), "Search started for: bitcoin").unwrap();
        std::fs::write(dir.path().join("chat.txt"), "bitcoin address").unwrap();

        let report = search_tree(
            dir.path(),
            &parse_keywords("bitcoin"),
            &|relative| relative == "C1_Report.md",
            &mut |_| {},
        )
        .unwrap();
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.hits.len(), 1);
        assert_eq!(report.hits[0].relative_path, "chat.txt");
    }

    #[test]
    fn test_empty_keywords_search_nothing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "anything").unwrap();
        let report = search_tree(dir.path(), &[], &|_| false, &mut |_| {}).unwrap();
        assert_eq!(report.files_scanned, 0);
        assert!(report.hits.is_empty());
    }
}
