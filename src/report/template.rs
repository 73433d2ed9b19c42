//! Markdown report rendering
//!
//! Uses Tera templates (Jinja2-like). The built-in template can be replaced
//! by dropping a `report.md` into a template directory.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use tera::{Context, Tera};

use super::error::ReportResult;
use super::types::CaseReport;

/// Default Markdown report template
const DEFAULT_MARKDOWN_TEMPLATE: &str = include_str!("templates/report.md");

const MARKDOWN_TEMPLATE_NAME: &str = "report.md";

/// Evidence row with display labels instead of serde tags
#[derive(Debug, Serialize)]
struct EvidenceRow<'a> {
    id: &'a str,
    kind: &'static str,
    platform: &'static str,
    relative_path: &'a str,
    size: u64,
    sha256: &'a str,
}

/// Template engine for rendering reports
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Create a new template engine with the built-in template
    pub fn new() -> ReportResult<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(MARKDOWN_TEMPLATE_NAME, DEFAULT_MARKDOWN_TEMPLATE)?;
        Self::register_filters(&mut tera);
        Ok(Self { tera })
    }

    /// Load templates from a directory, falling back to the built-in one
    pub fn with_directory(template_dir: impl AsRef<Path>) -> ReportResult<Self> {
        let glob_pattern = format!("{}/**/*", template_dir.as_ref().display());
        let mut tera = Tera::new(&glob_pattern)?;
        if !tera.get_template_names().any(|n| n == MARKDOWN_TEMPLATE_NAME) {
            tera.add_raw_template(MARKDOWN_TEMPLATE_NAME, DEFAULT_MARKDOWN_TEMPLATE)?;
        }
        Self::register_filters(&mut tera);
        Ok(Self { tera })
    }

    fn register_filters(tera: &mut Tera) {
        // Format bytes as human readable
        tera.register_filter(
            "bytes",
            |value: &tera::Value, _: &HashMap<String, tera::Value>| match value.as_u64() {
                Some(n) => Ok(tera::Value::String(format_bytes(n))),
                None => Ok(value.clone()),
            },
        );
    }

    /// Render a report to Markdown
    pub fn render_markdown(&self, report: &CaseReport) -> ReportResult<String> {
        let context = self.build_context(report)?;
        Ok(self.tera.render(MARKDOWN_TEMPLATE_NAME, &context)?)
    }

    fn build_context(&self, report: &CaseReport) -> ReportResult<Context> {
        let mut context = Context::new();
        context.insert("report", &serde_json::to_value(report)?);

        let evidence: Vec<EvidenceRow> = report
            .evidence
            .iter()
            .map(|item| EvidenceRow {
                id: &item.id,
                kind: item.kind.as_str(),
                platform: item.platform.as_str(),
                relative_path: &item.relative_path,
                size: item.size,
                sha256: &item.sha256,
            })
            .collect();
        context.insert("evidence", &evidence);
        context.insert("journal_lines", &report.journal_text());
        context.insert("total_bytes", &report.total_bytes());
        context.insert("generated_label", &report.generated_label());
        Ok(context)
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
