use std::io;

use super::{ask, choose, outcome, pause, Console, Flow, Tone};
use crate::session::Session;

const OPTIONS: [&str; 4] = ["Create a new case", "Open an existing case", "List cases", "Back"];

pub(super) fn menu(session: &mut Session, console: &mut dyn Console) -> io::Result<Flow> {
    loop {
        let Some(choice) = choose(console, "Case management", &OPTIONS)? else {
            return Ok(Flow::Exit);
        };
        match choice.as_str() {
            "1" => create(session, console)?,
            "2" => open(session, console)?,
            "3" => list(session, console),
            "4" | "" => return Ok(Flow::Back),
            _ => {
                console.note(Tone::Error, "Invalid option, please try again.");
                continue;
            }
        }
        if pause(console)? == Flow::Exit {
            return Ok(Flow::Exit);
        }
    }
}

fn create(session: &mut Session, console: &mut dyn Console) -> io::Result<()> {
    let Some(name) = ask(console, "Name of the new case (e.g. Case_2024_001):")? else {
        return Ok(());
    };
    if name.is_empty() {
        console.note(Tone::Warning, "Cancelled: the case name cannot be empty.");
        return Ok(());
    }
    let Some(investigator) = ask(console, "Investigator name:")? else {
        return Ok(());
    };

    let result = session
        .create_case(&name, &investigator)
        .map(|case| case.dir().display().to_string());
    if let Some(dir) = outcome(session, console, "Create case", result) {
        console.note(Tone::Success, &format!("Case '{}' created in {}", name, dir));
    }
    Ok(())
}

fn open(session: &mut Session, console: &mut dyn Console) -> io::Result<()> {
    let Some(names) = outcome(session, console, "List cases", session.list_cases()) else {
        return Ok(());
    };
    if names.is_empty() {
        console.note(Tone::Warning, "No cases found. Create one first.");
        return Ok(());
    }
    for (index, name) in names.iter().enumerate() {
        console.line(&format!("{}. {}", index + 1, name));
    }
    let Some(answer) = ask(console, "Number or name of the case to open:")? else {
        return Ok(());
    };
    let name = match answer.parse::<usize>() {
        Ok(n) if (1..=names.len()).contains(&n) => names[n - 1].clone(),
        Ok(_) => {
            console.note(Tone::Error, "No case with that number.");
            return Ok(());
        }
        Err(_) => answer,
    };

    let result = session.open_case(&name).map(|case| {
        (
            case.metadata().investigator.clone(),
            case.metadata().evidence.len(),
        )
    });
    if let Some((investigator, evidence)) = outcome(session, console, "Open case", result) {
        console.note(
            Tone::Success,
            &format!(
                "Case '{}' opened (investigator: {}, {} evidence items)",
                name, investigator, evidence
            ),
        );
    }
    Ok(())
}

fn list(session: &Session, console: &mut dyn Console) {
    if let Some(names) = outcome(session, console, "List cases", session.list_cases()) {
        if names.is_empty() {
            console.note(Tone::Info, "No cases yet.");
        }
        for name in names {
            console.line(&format!("  {}", name));
        }
    }
}
