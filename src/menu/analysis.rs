use std::io;

use super::{ask, choose, outcome, pause, tool_sink, Console, Flow, Tone};
use crate::session::{AiTarget, Session};

const OPTIONS: [&str; 4] = [
    "Keyword search in the case folder",
    "AI-assisted analysis",
    "Run iLEAPP",
    "Back",
];

const AI_OPTIONS: [&str; 3] = [
    "Analyze a case file (SQLite schema or text excerpt)",
    "Analyze the hits of the last keyword search",
    "Back",
];

/// Hits printed as they stream in; the rest are only counted
const MAX_PRINTED_HITS: usize = 200;

pub(super) fn menu(session: &mut Session, console: &mut dyn Console) -> io::Result<Flow> {
    loop {
        let Some(choice) = choose(console, "Evidence analysis", &OPTIONS)? else {
            return Ok(Flow::Exit);
        };
        let flow = match choice.as_str() {
            "1" => keyword_search(session, console)?,
            "2" => ai_analysis(session, console)?,
            "3" => ileapp(session, console)?,
            "4" | "" => return Ok(Flow::Back),
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

fn keyword_search(session: &mut Session, console: &mut dyn Console) -> io::Result<Flow> {
    let Some(input) = ask(console, "Keywords, separated by commas:")? else {
        return Ok(Flow::Exit);
    };
    console.note(Tone::Info, "Searching the case folder...");

    let mut printed = 0usize;
    let result = {
        let mut on_hit = |hit: &crate::analysis::SearchHit| {
            if printed < MAX_PRINTED_HITS {
                console.line(&format!(
                    "  {}:{} [{}] {}",
                    hit.relative_path, hit.line_number, hit.keyword, hit.line
                ));
            }
            printed += 1;
        };
        session.keyword_search(&input, &mut on_hit)
    };
    if let Some(report) = outcome(session, console, "Keyword search", result) {
        if report.hits.len() > MAX_PRINTED_HITS {
            console.note(
                Tone::Info,
                &format!("{} more hits not shown", report.hits.len() - MAX_PRINTED_HITS),
            );
        }
        let tone = if report.hits.is_empty() { Tone::Warning } else { Tone::Success };
        console.note(
            tone,
            &format!(
                "{} hits in {} files ({} files skipped)",
                report.hits.len(),
                report.files_scanned,
                report.files_skipped
            ),
        );
    }
    Ok(Flow::Back)
}

fn ai_analysis(session: &Session, console: &mut dyn Console) -> io::Result<Flow> {
    let Some(choice) = choose(console, "AI-assisted analysis", &AI_OPTIONS)? else {
        return Ok(Flow::Exit);
    };
    let target = match choice.as_str() {
        "1" => {
            let Some(path) = ask(
                console,
                "File relative to the case (e.g. Android_Decoded/full_backup/apps/com.example/db/msg.db):",
            )?
            else {
                return Ok(Flow::Exit);
            };
            AiTarget::File(path)
        }
        "2" => AiTarget::KeywordHits,
        "3" | "" => return Ok(Flow::Back),
        _ => {
            console.note(Tone::Error, "Invalid option.");
            return Ok(Flow::Back);
        }
    };

    console.note(
        Tone::Warning,
        "Case data will be sent to the configured AI provider. Continue only if this is permitted.",
    );
    match ask(console, "Send? (y/n):")?.as_deref() {
        None => return Ok(Flow::Exit),
        Some("y") | Some("Y") => {}
        Some(_) => {
            console.note(Tone::Info, "Cancelled.");
            return Ok(Flow::Back);
        }
    }

    console.note(Tone::Info, "Waiting for the AI provider...");
    let result = session.ai_analyze(&target);
    if let Some(answer) = outcome(session, console, "AI analysis", result) {
        console.heading("AI answer");
        for line in answer.lines() {
            console.line(line);
        }
        console.note(
            Tone::Warning,
            "AI output is a lead, not a finding. Verify it against the evidence.",
        );
    }
    Ok(Flow::Back)
}

fn ileapp(session: &Session, console: &mut dyn Console) -> io::Result<Flow> {
    let Some(input) = ask(
        console,
        "Backup or extraction to analyze (relative to the case or absolute):",
    )?
    else {
        return Ok(Flow::Exit);
    };
    let Some(hint) = ask(console, "Platform (ios/android, Enter to auto-detect):")? else {
        return Ok(Flow::Exit);
    };
    let result = {
        let mut sink = tool_sink(console);
        session.run_ileapp(&input, &hint, &mut sink)
    };
    if let Some(output) = outcome(session, console, "iLEAPP", result) {
        console.note(
            Tone::Success,
            &format!("iLEAPP report written to {}", output.display()),
        );
    }
    Ok(Flow::Back)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::ANDROID_DIR;
    use crate::config::ToolkitConfig;
    use crate::menu::scripted::ScriptedConsole;
    use tempfile::TempDir;

    fn session_with_case(root: &TempDir) -> Session {
        let mut session = Session::new(ToolkitConfig {
            acquisition_dir: root.path().to_path_buf(),
            ..ToolkitConfig::default()
        });
        session.create_case("C1", "J. Doe").unwrap();
        session
    }

    #[test]
    fn test_keyword_search_prints_hits() {
        let root = TempDir::new().unwrap();
        let mut session = session_with_case(&root);
        let dir = session.active_case().unwrap().subdir(ANDROID_DIR).unwrap();
        std::fs::write(dir.join("chat.txt"), "meet at the harbor\nnothing here\n").unwrap();

        let mut console = ScriptedConsole::new(&["1", "harbor", "", "4"]);
        menu(&mut session, &mut console).unwrap();

        let text = console.text();
        assert!(text.contains("Android_Acquisition/chat.txt:1 [harbor] meet at the harbor"));
        assert!(text.contains("1 hits in"));
    }

    #[test]
    fn test_ai_analysis_can_be_cancelled() {
        let root = TempDir::new().unwrap();
        let mut session = session_with_case(&root);
        let mut console = ScriptedConsole::new(&["2", "2", "n", "", "4"]);
        menu(&mut session, &mut console).unwrap();

        assert!(console.text().contains("Cancelled."));
        let journal =
            std::fs::read_to_string(session.active_case().unwrap().journal().path()).unwrap();
        assert!(!journal.contains("AI analysis"));
    }

    #[test]
    fn test_ileapp_without_configuration_hints() {
        let root = TempDir::new().unwrap();
        let mut session = session_with_case(&root);
        let mut console = ScriptedConsole::new(&["3", "iOS_Acquisition", "ios", "", "4"]);
        menu(&mut session, &mut console).unwrap();
        assert!(console.text().contains("Set tools.ileapp in the configuration file"));
    }
}
