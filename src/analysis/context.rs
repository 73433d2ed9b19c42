//! Evidence context sent to the AI assistant
//!
//! Three kinds of context are supported: the schema of an SQLite database,
//! an excerpt of a text file, and the hits of the last keyword search. Each
//! is bounded in size before it is placed into a prompt.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use tracing::debug;

use super::search::SearchHit;
use crate::error::{ToolkitError, ToolkitResult};

/// Header of every SQLite 3 database file
const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// What the operator asked the assistant to look at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnalysisKind {
    DatabaseSchema,
    TextFile,
    KeywordHits,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::DatabaseSchema => "database schema",
            AnalysisKind::TextFile => "text file",
            AnalysisKind::KeywordHits => "keyword hits",
        }
    }
}

/// One table of an SQLite schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub sql: String,
}

/// True when the file starts with the SQLite 3 header
pub fn is_sqlite(path: &Path) -> bool {
    let mut magic = [0u8; 16];
    File::open(path)
        .and_then(|mut f| f.read_exact(&mut magic))
        .map(|_| &magic == SQLITE_MAGIC)
        .unwrap_or(false)
}

/// Table names and `CREATE` statements, read without modifying the file
pub fn sqlite_schema(path: &Path) -> ToolkitResult<Vec<TableSchema>> {
    if !is_sqlite(path) {
        return Err(ToolkitError::InvalidInput(format!(
            "{} is not an SQLite database",
            path.display()
        )));
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    let mut stmt = conn.prepare(
        "SELECT name, COALESCE(sql, '') FROM sqlite_master WHERE type = 'table' ORDER BY name",
    )?;
    let tables = stmt
        .query_map([], |row| {
            Ok(TableSchema {
                name: row.get(0)?,
                sql: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    debug!(path = %path.display(), tables = tables.len(), "Read SQLite schema");
    Ok(tables)
}

/// Render a schema the way it is placed into prompts
pub fn format_schema(tables: &[TableSchema]) -> String {
    let mut out = String::from("Database schema:\n");
    for table in tables {
        out.push_str(&format!("Table: {}\nSQL: {}\n\n", table.name, table.sql));
    }
    out
}

/// At most `max_chars` characters of a file decoded as lossy UTF-8.
///
/// Returns the excerpt and whether it was cut short.
pub fn text_excerpt(path: &Path, max_chars: usize) -> ToolkitResult<(String, bool)> {
    // Four bytes per char is the UTF-8 upper bound
    let limit = (max_chars as u64).saturating_mul(4).saturating_add(4);
    let mut bytes = Vec::new();
    File::open(path)?.take(limit).read_to_end(&mut bytes)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(truncate_chars(&text, max_chars))
}

fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (text[..cut].to_string(), true),
        None => (text.to_string(), false),
    }
}

/// Hits rendered one per line, bounded by `max_chars`
pub fn format_hits(hits: &[SearchHit], max_chars: usize) -> (String, bool) {
    let mut out = String::new();
    for hit in hits {
        out.push_str(&format!(
            "{}:{} [{}] {}\n",
            hit.relative_path, hit.line_number, hit.keyword, hit.line
        ));
    }
    truncate_chars(&out, max_chars)
}

const ANALYST_PREAMBLE: &str = r#"You are assisting a digital forensic examiner with evidence acquired from a mobile device.

RULES:
1. Only describe what is present in the provided material; never invent records or values
2. Flag anything that could be personal data, credentials, communications or location history
3. Keep answers concise and structured so they can be copied into case notes"#;

/// Full prompt for one analysis request
pub fn build_prompt(kind: AnalysisKind, source: &str, context: &str, truncated: bool) -> String {
    let task = match kind {
        AnalysisKind::DatabaseSchema => {
            "Examine this SQLite database schema and suggest SQL queries that extract key \
             information such as messages, contacts, call logs or locations. Give only the \
             queries and a one-line description of each; do not explain the schema."
        }
        AnalysisKind::TextFile => {
            "Review this file excerpt and list forensically relevant content: identities, \
             accounts, timestamps, communications, locations, installed applications and \
             signs of anti-forensic activity. Quote the relevant lines."
        }
        AnalysisKind::KeywordHits => {
            "These lines matched the examiner's keyword search. Group them by topic, \
             indicate which hits look significant and which are likely noise, and suggest \
             follow-up searches."
        }
    };
    let note = if truncated {
        "\n(The material below was truncated to fit the request size.)"
    } else {
        ""
    };
    format!(
        "{}\n\n{}\n\nSource: {}{}\n\n{}",
        ANALYST_PREAMBLE, task, source, note, context
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_db(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("msgstore.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE messages (id INTEGER PRIMARY KEY, body TEXT, ts INTEGER);
             CREATE TABLE contacts (jid TEXT, name TEXT);
             INSERT INTO messages (body, ts) VALUES ('hello', 1);",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_sqlite_schema() {
        let dir = TempDir::new().unwrap();
        let db = sample_db(dir.path());
        let before = crate::common::hash::sha256_file(&db).unwrap();

        let tables = sqlite_schema(&db).unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["contacts", "messages"]);
        assert!(tables[1].sql.starts_with("CREATE TABLE messages"));

        // Read-only access leaves the evidence untouched
        assert_eq!(crate::common::hash::sha256_file(&db).unwrap(), before);

        let rendered = format_schema(&tables);
        assert!(rendered.contains("Table: messages\nSQL: CREATE TABLE messages"));
    }

    #[test]
    fn test_non_sqlite_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.db");
        std::fs::write(&path, b"not a database").unwrap();
        assert!(!is_sqlite(&path));
        assert!(matches!(sqlite_schema(&path), Err(ToolkitError::InvalidInput(_))));
    }

    #[test]
    fn test_text_excerpt_bounds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logcat.txt");
        std::fs::write(&path, "é".repeat(50)).unwrap();

        let (excerpt, truncated) = text_excerpt(&path, 10).unwrap();
        assert_eq!(excerpt.chars().count(), 10);
        assert!(truncated);

        let (excerpt, truncated) = text_excerpt(&path, 100).unwrap();
        assert_eq!(excerpt.chars().count(), 50);
        assert!(!truncated);
    }

    #[test]
    fn test_format_hits() {
        let hits = vec![SearchHit {
            relative_path: "Android_Acquisition/logcat.txt".to_string(),
            line_number: 12,
            keyword: "wallet".to_string(),
            line: "opened wallet app".to_string(),
        }];
        let (text, truncated) = format_hits(&hits, 1000);
        assert_eq!(text, "Android_Acquisition/logcat.txt:12 [wallet] opened wallet app\n");
        assert!(!truncated);
    }

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt(
            AnalysisKind::DatabaseSchema,
            "Android_Decoded/full_backup/msgstore.db",
            "Table: messages",
            false,
        );
        assert!(prompt.contains("suggest SQL queries"));
        assert!(prompt.contains("never invent"));
        assert!(prompt.contains("Source: Android_Decoded/full_backup/msgstore.db"));
        assert!(prompt.ends_with("Table: messages"));
        assert!(!prompt.contains("truncated"));

        let prompt = build_prompt(AnalysisKind::TextFile, "x", "y", true);
        assert!(prompt.contains("truncated"));
    }
}
