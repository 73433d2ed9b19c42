use std::io;

use super::{ask, choose, outcome, pause, Console, Flow, Tone};
use crate::common::hash::VerificationStatus;
use crate::report::template::format_bytes;
use crate::session::Session;

const OPTIONS: [&str; 6] = [
    "Verify evidence integrity",
    "Show evidence registry",
    "List files in the case",
    "Export a file",
    "Add a note to the activity log",
    "Back",
];

pub(super) fn menu(session: &mut Session, console: &mut dyn Console) -> io::Result<Flow> {
    loop {
        let Some(choice) = choose(console, "Evidence integrity and export", &OPTIONS)? else {
            return Ok(Flow::Exit);
        };
        let flow = match choice.as_str() {
            "1" => verify(session, console),
            "2" => registry(session, console),
            "3" => list_files(session, console)?,
            "4" => export(session, console)?,
            "5" => add_note(session, console)?,
            "6" | "" => return Ok(Flow::Back),
            _ => {
                console.note(Tone::Error, "Invalid option, please try again.");
                continue;
            }
        };
        if flow == Flow::Exit || pause(console)? == Flow::Exit {
            return Ok(Flow::Exit);
        }
    }
}

fn verify(session: &Session, console: &mut dyn Console) -> Flow {
    let Some(records) = outcome(session, console, "Verify", session.verify_evidence()) else {
        return Flow::Back;
    };
    if records.is_empty() {
        console.note(Tone::Warning, "No evidence registered yet.");
        return Flow::Back;
    }

    let mut failures = 0;
    for record in &records {
        let (tone, detail) = match &record.status {
            VerificationStatus::Verified => (Tone::Success, String::new()),
            VerificationStatus::Mismatch { computed } => {
                failures += 1;
                (Tone::Error, format!(" (now {})", computed))
            }
            VerificationStatus::Missing => {
                failures += 1;
                (Tone::Error, String::new())
            }
        };
        console.note(
            tone,
            &format!(
                "{} {} {}{}",
                record.item.id,
                record.status.as_str(),
                record.item.relative_path,
                detail
            ),
        );
    }
    if failures == 0 {
        console.note(Tone::Success, &format!("All {} items verified.", records.len()));
    } else {
        console.note(
            Tone::Error,
            &format!("{} of {} items failed verification.", failures, records.len()),
        );
    }
    Flow::Back
}

fn registry(session: &Session, console: &mut dyn Console) -> Flow {
    let case = match session.require_case() {
        Ok(case) => case,
        Err(error) => {
            console.note(Tone::Error, &error.to_string());
            return Flow::Back;
        }
    };
    let evidence = &case.metadata().evidence;
    if evidence.is_empty() {
        console.note(Tone::Warning, "No evidence registered yet.");
    }
    for item in evidence {
        console.line(&format!(
            "{}  {}  {}  {}",
            item.id,
            item.acquired_at.format("%Y-%m-%d %H:%M:%S UTC"),
            item.kind.as_str(),
            item.relative_path
        ));
        console.line(&format!(
            "        {} | {} | SHA-256 {}",
            item.platform.as_str(),
            format_bytes(item.size),
            item.sha256
        ));
        console.line(&format!("        {}", item.description));
    }
    Flow::Back
}

fn list_files(session: &Session, console: &mut dyn Console) -> io::Result<Flow> {
    let Some(subdir) = ask(
        console,
        "Subdirectory to list (e.g. Android_Decoded, Enter for the whole case):",
    )?
    else {
        return Ok(Flow::Exit);
    };
    if let Some(files) = outcome(session, console, "List files", session.list_files(&subdir)) {
        if files.is_empty() {
            console.note(Tone::Warning, "No files found.");
        }
        for file in &files {
            console.line(&format!("  {:>10}  {}", format_bytes(file.size), file.relative_path));
        }
    }
    Ok(Flow::Back)
}

fn export(session: &mut Session, console: &mut dyn Console) -> io::Result<Flow> {
    let Some(relative) = ask(console, "File to export, relative to the case:")? else {
        return Ok(Flow::Exit);
    };
    let result = session.export_file(&relative);
    if let Some(item) = outcome(session, console, "Export", result) {
        console.note(
            Tone::Success,
            &format!("{} exported to {}", item.id, item.relative_path),
        );
        console.line(&format!("    SHA-256: {}", item.sha256));
    }
    Ok(Flow::Back)
}

fn add_note(session: &Session, console: &mut dyn Console) -> io::Result<Flow> {
    let Some(note) = ask(console, "Note:")? else {
        return Ok(Flow::Exit);
    };
    if outcome(session, console, "Note", session.add_note(&note)).is_some() {
        console.note(Tone::Success, "Note recorded.");
    }
    Ok(Flow::Back)
}

/// Ask for the analyst and write both reports
pub(super) fn generate_report(session: &Session, console: &mut dyn Console) -> io::Result<()> {
    let default = match session.active_case() {
        Some(case) => case.metadata().investigator.clone(),
        None => {
            console.note(Tone::Error, &crate::error::ToolkitError::NoActiveCase.to_string());
            return Ok(());
        }
    };
    let Some(analyst) = ask(console, &format!("Analyst name (Enter for {}):", default))? else {
        return Ok(());
    };

    console.note(Tone::Info, "Generating the case report...");
    let result = session.generate_report(&analyst);
    match result {
        Ok(report) => {
            console.note(Tone::Success, &format!("Markdown: {}", report.markdown.display()));
            console.note(Tone::Success, &format!("PDF:      {}", report.pdf.display()));
            console.line(&format!("    PDF SHA-256: {}", report.pdf_sha256));
        }
        Err(error) => {
            if let Some(case) = session.active_case() {
                let markdown = case.report_markdown_path();
                if markdown.exists() {
                    console.note(
                        Tone::Warning,
                        &format!("The Markdown report was written to {}", markdown.display()),
                    );
                }
            }
            outcome::<()>(session, console, "Report", Err(error));
        }
    }
    Ok(())
}
