//! PDF report generator using genpdf

use std::path::{Path, PathBuf};

use genpdf::{
    elements::{Break, FrameCellDecorator, LinearLayout, Paragraph, TableLayout, Text},
    fonts, style, Alignment, Document, Element,
};
use tracing::debug;

use super::error::{ReportError, ReportResult};
use super::template::format_bytes;
use super::types::CaseReport;
use crate::config::ReportConfig;

/// Well-known font locations tried after the configured one
const SYSTEM_FONTS: [(&str, &str); 6] = [
    ("./fonts", "LiberationSans"),
    ("/usr/share/fonts/truetype/liberation", "LiberationSans"),
    ("/usr/share/fonts/truetype/dejavu", "DejaVuSans"),
    ("/Library/Fonts", "Arial"),
    ("/System/Library/Fonts/Supplemental", "Arial"),
    ("C:\\Windows\\Fonts", "arial"),
];

/// PDF generator for case reports
#[derive(Debug, Clone, Default)]
pub struct PdfGenerator {
    fonts_dir: Option<PathBuf>,
    font_family: Option<String>,
}

impl PdfGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            fonts_dir: config.fonts_dir.clone(),
            font_family: config.font_family.clone(),
        }
    }

    /// Font directories and family names in lookup order
    pub fn font_candidates(&self) -> Vec<(PathBuf, String)> {
        let mut candidates = Vec::new();
        if let Some(dir) = &self.fonts_dir {
            let family = self.font_family.as_deref().unwrap_or("LiberationSans");
            candidates.push((dir.clone(), family.to_string()));
        }
        candidates.extend(
            SYSTEM_FONTS
                .iter()
                .map(|(dir, family)| (PathBuf::from(dir), family.to_string())),
        );
        candidates
    }

    /// First font family that loads: `<family>-Regular.ttf`, `-Bold`, `-Italic`, `-BoldItalic`
    fn load_fonts(&self) -> ReportResult<fonts::FontFamily<fonts::FontData>> {
        let mut tried = Vec::new();
        for (dir, family) in self.font_candidates() {
            match fonts::from_files(&dir, &family, None) {
                Ok(font) => {
                    debug!(dir = %dir.display(), family, "Loaded PDF fonts");
                    return Ok(font);
                }
                Err(_) => tried.push(format!("{}/{}", dir.display(), family)),
            }
        }
        Err(ReportError::FontsNotFound(tried))
    }

    /// Generate a PDF report
    pub fn generate(&self, report: &CaseReport, output_path: impl AsRef<Path>) -> ReportResult<()> {
        let font_family = self.load_fonts()?;

        let mut doc = Document::new(font_family);
        doc.set_title(&report.title);
        doc.set_minimal_conformance();
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(15);
        doc.set_page_decorator(decorator);

        self.add_header(&mut doc, report);
        self.add_evidence_section(&mut doc, report)?;
        self.add_files_section(&mut doc, report);
        self.add_journal_section(&mut doc, report);
        self.add_footer(&mut doc, report);

        doc.render_to_file(output_path)
            .map_err(|e| ReportError::Pdf(e.to_string()))?;
        Ok(())
    }

    fn add_header(&self, doc: &mut Document, report: &CaseReport) {
        doc.push(
            Paragraph::new(&report.title)
                .aligned(Alignment::Center)
                .styled(style::Style::new().bold().with_font_size(18)),
        );
        doc.push(Break::new(1.0));

        let mut layout = LinearLayout::vertical();
        layout.push(self.info_row("Date:", &report.generated_label()));
        layout.push(self.info_row("Analyst:", &report.analyst));
        layout.push(self.info_row("Investigator:", &report.investigator));
        layout.push(self.info_row("Case ID:", &report.case_id.to_string()));
        layout.push(self.info_row(
            "Case created:",
            &report.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ));
        doc.push(layout);
        doc.push(Break::new(1.0));
    }

    fn add_evidence_section(&self, doc: &mut Document, report: &CaseReport) -> ReportResult<()> {
        self.add_section_header(doc, "Registered Evidence");
        if report.evidence.is_empty() {
            doc.push(Paragraph::new("No evidence registered.").styled(style::Style::new().italic()));
            doc.push(Break::new(1.0));
            return Ok(());
        }

        let mut table = TableLayout::new(vec![1, 2, 4, 2]);
        table.set_cell_decorator(FrameCellDecorator::new(true, true, false));
        table
            .row()
            .element(Text::new("ID").styled(style::Style::new().bold()))
            .element(Text::new("Kind").styled(style::Style::new().bold()))
            .element(Text::new("Path").styled(style::Style::new().bold()))
            .element(Text::new("Size").styled(style::Style::new().bold()))
            .push()
            .map_err(|e| ReportError::Pdf(e.to_string()))?;

        for item in &report.evidence {
            table
                .row()
                .element(Text::new(&item.id))
                .element(Text::new(format!("{} ({})", item.kind.as_str(), item.platform.as_str())))
                .element(Paragraph::new(&item.relative_path))
                .element(Text::new(format_bytes(item.size)))
                .push()
                .map_err(|e| ReportError::Pdf(e.to_string()))?;
        }
        doc.push(table);
        doc.push(Break::new(0.5));

        // Digests do not fit a table column
        for item in &report.evidence {
            doc.push(
                Paragraph::new(format!("{}  SHA-256: {}", item.id, item.sha256))
                    .styled(style::Style::new().with_font_size(8)),
            );
        }
        doc.push(Break::new(1.0));
        Ok(())
    }

    fn add_files_section(&self, doc: &mut Document, report: &CaseReport) {
        self.add_section_header(doc, "Acquisitions Summary");
        doc.push(Paragraph::new(format!(
            "{} files, {} in total",
            report.files.len(),
            format_bytes(report.total_bytes())
        )));
        doc.push(Break::new(0.5));

        for file in &report.files {
            doc.push(Paragraph::new(&file.name).styled(style::Style::new().bold().with_font_size(10)));
            doc.push(
                Paragraph::new(format!("Path: {}", file.relative_path))
                    .styled(style::Style::new().with_font_size(9)),
            );
            doc.push(
                Paragraph::new(format!("Size: {}", format_bytes(file.size)))
                    .styled(style::Style::new().with_font_size(9)),
            );
            doc.push(
                Paragraph::new(format!("SHA-256: {}", file.sha256))
                    .styled(style::Style::new().with_font_size(8)),
            );
            doc.push(Break::new(0.5));
        }
        doc.push(Break::new(0.5));
    }

    fn add_journal_section(&self, doc: &mut Document, report: &CaseReport) {
        self.add_section_header(doc, "Activity Log");
        for line in report.journal_text() {
            doc.push(Paragraph::new(line).styled(style::Style::new().with_font_size(8)));
        }
    }

    fn add_footer(&self, doc: &mut Document, report: &CaseReport) {
        doc.push(Break::new(2.0));
        doc.push(
            Paragraph::new(format!("Generated by {} on {}", report.generated_by, report.generated_label()))
                .aligned(Alignment::Center)
                .styled(style::Style::new().with_font_size(8)),
        );
    }

    fn add_section_header(&self, doc: &mut Document, title: &str) {
        doc.push(Paragraph::new(title).styled(style::Style::new().bold().with_font_size(14)));
        doc.push(Break::new(0.5));
    }

    fn info_row(&self, label: &str, value: &str) -> Paragraph {
        Paragraph::new(format!("{} {}", label, value))
    }
}
