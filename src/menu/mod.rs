//! Interactive numbered menus
//!
//! Menus talk to the operator only through the [`Console`] trait so the same
//! flows run against a real terminal ([`Terminal`]) or a scripted input
//! list in tests. End of input anywhere leaves the program cleanly.

mod analysis;
mod android;
mod cases;
mod evidence;
mod ios;
mod terminal;

pub use terminal::Terminal;

use std::io;

use crate::error::{ToolkitError, ToolkitResult};
use crate::session::Session;

/// Kind of status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warning,
    Error,
}

impl Tone {
    pub fn marker(&self) -> &'static str {
        match self {
            Tone::Info => "→",
            Tone::Success => "✓",
            Tone::Warning => "!",
            Tone::Error => "✗",
        }
    }
}

/// Operator-facing input and output
pub trait Console {
    /// Write one line
    fn line(&mut self, text: &str);

    /// Read one line after showing `prompt`; `None` at end of input
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;

    fn note(&mut self, tone: Tone, text: &str) {
        self.line(&format!("  {} {}", tone.marker(), text));
    }

    fn heading(&mut self, title: &str) {
        self.line("");
        self.line(&format!("--- {} ---", title));
    }

    fn clear(&mut self) {}
}

/// Where a submenu hands control back to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Back,
    Exit,
}

/// Prompt and trim; `None` at end of input
pub(crate) fn ask(console: &mut dyn Console, prompt: &str) -> io::Result<Option<String>> {
    Ok(console.read_line(prompt)?.map(|s| s.trim().to_string()))
}

/// Wait for Enter; `Flow::Exit` at end of input
pub(crate) fn pause(console: &mut dyn Console) -> io::Result<Flow> {
    Ok(match console.read_line("Press Enter to continue...")? {
        Some(_) => Flow::Back,
        None => Flow::Exit,
    })
}

/// Print numbered options and read the choice
pub(crate) fn choose(
    console: &mut dyn Console,
    title: &str,
    options: &[&str],
) -> io::Result<Option<String>> {
    console.heading(title);
    for (index, option) in options.iter().enumerate() {
        console.line(&format!("{}. {}", index + 1, option));
    }
    ask(console, "\nSelect an option:")
}

/// Show the outcome of an operation; failures are printed and journaled
pub(crate) fn outcome<T>(
    session: &Session,
    console: &mut dyn Console,
    operation: &str,
    result: ToolkitResult<T>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            console.note(Tone::Error, &error.to_string());
            if let ToolkitError::ToolNotConfigured { tool } = &error {
                console.note(Tone::Info, &format!("Set tools.{} in the configuration file", tool));
            }
            session.record_failure(operation, &error);
            None
        }
    }
}

/// Streams tool output to the console, indented
pub(crate) fn tool_sink(console: &mut dyn Console) -> impl FnMut(&str) + '_ {
    move |line: &str| console.line(&format!("    {}", line))
}

/// One screen of a guided procedure
struct Step {
    title: &'static str,
    lines: &'static [&'static str],
}

/// Walk the examiner through a manual procedure, journaling start, notes and end
fn run_steps(
    session: &Session,
    console: &mut dyn Console,
    procedure: &str,
    steps: &[Step],
) -> io::Result<Flow> {
    if outcome(session, console, procedure, session.procedure_started(procedure)).is_none() {
        return Ok(Flow::Back);
    }
    for step in steps {
        console.heading(step.title);
        for line in step.lines {
            console.line(line);
        }
        let Some(note) = ask(console, "Optional note for the activity log (Enter to skip):")? else {
            return Ok(Flow::Exit);
        };
        if !note.is_empty() {
            let result = session.add_note(&format!("{}: {}", step.title, note));
            if outcome(session, console, "Note", result).is_some() {
                console.note(Tone::Success, "Note recorded.");
            }
        }
    }
    if outcome(session, console, procedure, session.procedure_finished(procedure)).is_some() {
        console.note(
            Tone::Info,
            "Procedure finished. Place the acquired files in the case folder and run a verification.",
        );
    }
    Ok(Flow::Back)
}

/// Ask whether to continue when started with root privileges
pub fn confirm_root(console: &mut dyn Console) -> io::Result<bool> {
    console.note(Tone::Warning, "You are running with root privileges.");
    console.line("    Some operations may need them, but every file written into the case");
    console.line("    folder will then be owned by root.");
    loop {
        match ask(console, "Continue with root privileges? (y/n):")?.as_deref() {
            Some("y") | Some("Y") => return Ok(true),
            Some("n") | Some("N") | None => return Ok(false),
            Some(_) => console.note(Tone::Error, "Please answer 'y' or 'n'."),
        }
    }
}

const MAIN_OPTIONS: [&str; 7] = [
    "Manage cases",
    "Android forensics",
    "iPhone forensics",
    "Evidence analysis",
    "Evidence integrity and export",
    "Generate report",
    "Quit",
];

/// Run the main menu until the operator quits or input ends
pub fn run(session: &mut Session, console: &mut dyn Console) -> io::Result<()> {
    loop {
        console.clear();
        console.line("=== Mobile Forensic Toolkit ===");
        match session.active_case() {
            Some(case) => console.line(&format!(
                "Active case: {} (investigator: {}, {} evidence items)",
                case.name(),
                case.metadata().investigator,
                case.metadata().evidence.len()
            )),
            None => console.line("Active case: none. Create or open a case before any acquisition."),
        }

        let Some(choice) = choose(console, "Main menu", &MAIN_OPTIONS)? else {
            return Ok(());
        };
        let flow = match choice.as_str() {
            "1" => cases::menu(session, console)?,
            "2" | "3" | "4" | "5" if session.active_case().is_none() => {
                console.note(Tone::Error, &ToolkitError::NoActiveCase.to_string());
                pause(console)?
            }
            "2" => android::menu(session, console)?,
            "3" => ios::menu(session, console)?,
            "4" => analysis::menu(session, console)?,
            "5" => evidence::menu(session, console)?,
            "6" => {
                evidence::generate_report(session, console)?;
                pause(console)?
            }
            "7" | "q" | "quit" => {
                console.line("Goodbye.");
                return Ok(());
            }
            _ => {
                console.note(Tone::Error, "Invalid option, please try again.");
                Flow::Back
            }
        };
        if flow == Flow::Exit {
            return Ok(());
        }
    }
}


#[cfg(test)]
mod tests {
    use super::scripted::ScriptedConsole;
    use super::*;
    use crate::config::ToolkitConfig;
    use tempfile::TempDir;

    pub(crate) fn session(root: &TempDir) -> Session {
        Session::new(ToolkitConfig {
            acquisition_dir: root.path().to_path_buf(),
            ..ToolkitConfig::default()
        })
    }

    #[test]
    fn test_end_of_input_exits() {
        let root = TempDir::new().unwrap();
        let mut console = ScriptedConsole::new(&[]);
        run(&mut session(&root), &mut console).unwrap();
        assert!(console.text().contains("Active case: none"));
    }

    #[test]
    fn test_acquisition_menus_require_case() {
        let root = TempDir::new().unwrap();
        let mut console = ScriptedConsole::new(&["2", "", "9", "7"]);
        run(&mut session(&root), &mut console).unwrap();

        let text = console.text();
        assert!(text.contains("no case is open"));
        assert!(text.contains("Invalid option"));
        assert!(text.contains("Goodbye."));
        assert_eq!(console.remaining(), 0);
    }

    #[test]
    fn test_create_case_then_add_note() {
        let root = TempDir::new().unwrap();
        let mut session = session(&root);
        let mut console = ScriptedConsole::new(&[
            "1", "1", "Case_042", "J. Doe", "", "4", // cases: create, back
            "5", "5", "Phone seized at 10:40", "", "6", // evidence: note, back
            "7",
        ]);
        run(&mut session, &mut console).unwrap();

        let case = session.active_case().unwrap();
        assert_eq!(case.name(), "Case_042");
        let journal = std::fs::read_to_string(case.journal().path()).unwrap();
        assert!(journal.contains("[Case created]"));
        assert!(journal.contains("[Note] Phone seized at 10:40"));
        assert!(console.text().contains("Active case: Case_042"));
    }

    #[test]
    fn test_confirm_root() {
        let mut console = ScriptedConsole::new(&["maybe", "y"]);
        assert!(confirm_root(&mut console).unwrap());
        assert!(console.text().contains("Please answer"));

        let mut console = ScriptedConsole::new(&["n"]);
        assert!(!confirm_root(&mut console).unwrap());

        let mut console = ScriptedConsole::new(&[]);
        assert!(!confirm_root(&mut console).unwrap());
    }
}
