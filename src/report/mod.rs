//! Case report generation
//!
//! A report is rebuilt from the case folder each time: metadata and the
//! evidence registry from `case.json`, every acquired file with its SHA-256,
//! and the activity log. Two outputs are written next to `case.json`:
//!
//! - `<case>_Report.md`, rendered with Tera ([`template`])
//! - `<case>_Report.pdf`, laid out with genpdf ([`pdf`])
//!
//! The Markdown file does not need fonts, so it is written first and is
//! still produced when the PDF cannot be.

pub mod error;
pub mod pdf;
pub mod template;
pub mod types;

pub use error::{ReportError, ReportResult};
pub use pdf::PdfGenerator;
pub use template::TemplateEngine;
pub use types::{CaseReport, ReportFile};

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;
use walkdir::WalkDir;

use crate::case::{Case, APP_VERSION, CASE_FILE, JOURNAL_FILE, TRANSCRIPT_FILE};
use crate::common::{audit, hash};
use crate::config::ReportConfig;
use crate::error::ToolkitResult;

/// Paths and digests of a finished report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedReport {
    pub markdown: PathBuf,
    pub pdf: PathBuf,
    pub pdf_sha256: String,
}

/// True for bookkeeping and report files, which are not acquired data
pub fn is_excluded(case: &Case, relative: &str) -> bool {
    let previous_reports = [
        format!("{}_Report.pdf", case.name()),
        format!("{}_Report.md", case.name()),
    ];
    matches!(relative, CASE_FILE | JOURNAL_FILE | TRANSCRIPT_FILE)
        || previous_reports.iter().any(|r| r == relative)
        || relative.ends_with(".tmp")
}

/// Every acquired file of the case, sorted by relative path
pub fn collect_files(case: &Case) -> ToolkitResult<Vec<ReportFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(case.dir()).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative_path = case.relative_path(entry.path())?;
        if is_excluded(case, &relative_path) {
            continue;
        }
        files.push(ReportFile {
            name: entry.file_name().to_string_lossy().into_owned(),
            size: entry.metadata().map_err(std::io::Error::other)?.len(),
            sha256: hash::sha256_file(entry.path())?,
            relative_path,
        });
    }
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

/// Snapshot the case for rendering
pub fn build_report(case: &Case, analyst: &str) -> ToolkitResult<CaseReport> {
    let metadata = case.metadata();
    let analyst = match analyst.trim() {
        "" => metadata.investigator.clone(),
        name => name.to_string(),
    };
    Ok(CaseReport {
        title: format!("Case report - {}", case.name()),
        case_name: case.name().to_string(),
        case_id: metadata.id,
        investigator: metadata.investigator.clone(),
        analyst,
        created_at: metadata.created_at,
        generated_at: Utc::now(),
        generated_by: format!("Mobile Forensic Toolkit {}", APP_VERSION),
        evidence: metadata.evidence.clone(),
        files: collect_files(case)?,
        journal: case.journal().read_all()?,
    })
}

fn write_markdown(report: &CaseReport, path: &Path, config: &ReportConfig) -> ReportResult<()> {
    let engine = match &config.templates_dir {
        Some(dir) => TemplateEngine::with_directory(dir)?,
        None => TemplateEngine::new()?,
    };
    let markdown = engine.render_markdown(report)?;
    std::fs::write(path, markdown)?;
    Ok(())
}

/// Write the Markdown and PDF reports and log both
pub fn generate(case: &Case, analyst: &str, config: &ReportConfig) -> ToolkitResult<GeneratedReport> {
    let report = build_report(case, analyst)?;

    let markdown = case.report_markdown_path();
    write_markdown(&report, &markdown, config)?;
    let markdown_sha = hash::sha256_file(&markdown)?;
    audit::log_report_generation(case.name(), "markdown", &markdown);
    case.log(
        "Report",
        &format!("Markdown report generated: {}", case.relative_path(&markdown)?),
        Some(&markdown_sha),
    )?;

    let pdf = case.report_pdf_path();
    PdfGenerator::from_config(config).generate(&report, &pdf)?;
    let pdf_sha256 = hash::sha256_file(&pdf)?;
    audit::log_report_generation(case.name(), "pdf", &pdf);
    case.log(
        "Report",
        &format!("PDF report generated: {}", case.relative_path(&pdf)?),
        Some(&pdf_sha256),
    )?;

    info!(
        case = case.name(),
        files = report.files.len(),
        evidence = report.evidence.len(),
        "Case report written"
    );
    Ok(GeneratedReport {
        markdown,
        pdf,
        pdf_sha256,
    })
}
