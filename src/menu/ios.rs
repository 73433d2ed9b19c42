use std::io;

use super::{choose, outcome, pause, run_steps, tool_sink, Console, Flow, Step, Tone};
use crate::session::Session;

const OPTIONS: [&str; 4] = [
    "Full backup (idevicebackup2)",
    "Guided procedure for a locked device",
    "Device information",
    "Back",
];

const GUIDED_PROCEDURE: &str = "Locked iPhone";

const LOCKED_DEVICE_STEPS: [Step; 4] = [
    Step {
        title: "Step 1: DFU mode",
        lines: &[
            "Put the device into DFU mode. The key sequence depends on the model.",
            "The screen stays black while the device is in DFU mode.",
        ],
    },
    Step {
        title: "Step 2: bootrom exploit",
        lines: &[
            "Run a bootrom exploit such as checkra1n on supported models (A5 to A11).",
            "Newer devices need commercial tools. Record the tool and its version.",
        ],
    },
    Step {
        title: "Step 3: copy the file system",
        lines: &[
            "With SSH over USB available, copy the data partition, for example:",
            "  scp -r -P 2222 root@localhost:/private/var ./iOS_Acquisition/var",
            "Store every output file inside the case folder.",
        ],
    },
    Step {
        title: "Step 4: document",
        lines: &[
            "Write down the commands you ran and their results.",
            "Use 'Add a note' to put anything else into the activity log.",
        ],
    },
];

pub(super) fn menu(session: &mut Session, console: &mut dyn Console) -> io::Result<Flow> {
    loop {
        let Some(choice) = choose(console, "iPhone forensics", &OPTIONS)? else {
            return Ok(Flow::Exit);
        };
        let flow = match choice.as_str() {
            "1" => full_backup(session, console),
            "2" => {
                console.note(
                    Tone::Warning,
                    "Advanced techniques ahead. Exploits run on the device and can alter data.",
                );
                run_steps(session, console, GUIDED_PROCEDURE, &LOCKED_DEVICE_STEPS)?
            }
            "3" => info(session, console),
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

fn full_backup(session: &mut Session, console: &mut dyn Console) -> Flow {
    console.note(Tone::Info, "Unlock the iPhone and tap 'Trust' if asked.");
    console.line("    A full backup can take a long time.");
    let result = {
        let mut sink = tool_sink(console);
        session.ios_full_backup(&mut sink)
    };
    if let Some(item) = outcome(session, console, "iOS backup", result) {
        console.note(
            Tone::Success,
            &format!("{} saved in {} ({} bytes)", item.id, item.relative_path, item.size),
        );
        console.line(&format!("    SHA-256 (directory manifest): {}", item.sha256));
    }
    Flow::Back
}

fn info(session: &Session, console: &mut dyn Console) -> Flow {
    let Some(info) = outcome(session, console, "Device info", session.ios_info()) else {
        return Flow::Back;
    };
    let summary = info.summary();
    if summary.is_empty() {
        console.note(Tone::Warning, "The device did not report any identification keys.");
    }
    for (key, value) in summary {
        console.line(&format!("  {:<16} {}", key, value));
    }
    Flow::Back
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolkitConfig;
    use crate::menu::scripted::ScriptedConsole;
    use tempfile::TempDir;

    #[test]
    fn test_guided_procedure_end_of_input() {
        let root = TempDir::new().unwrap();
        let mut session = Session::new(ToolkitConfig {
            acquisition_dir: root.path().to_path_buf(),
            ..ToolkitConfig::default()
        });
        session.create_case("C1", "J. Doe").unwrap();

        let mut console = ScriptedConsole::new(&["2", ""]);
        assert_eq!(menu(&mut session, &mut console).unwrap(), Flow::Exit);
        let journal =
            std::fs::read_to_string(session.active_case().unwrap().journal().path()).unwrap();
        assert!(journal.contains("[Locked iPhone] Guided procedure started"));
        assert!(!journal.contains("Guided procedure finished"));
    }

    #[cfg(unix)]
    #[test]
    fn test_device_info_summary() {
        use crate::device::runner::test_support::fake_tool;

        let root = TempDir::new().unwrap();
        let mut config = ToolkitConfig {
            acquisition_dir: root.path().join("cases"),
            ..ToolkitConfig::default()
        };
        config.tools.ideviceinfo = fake_tool(
            root.path(),
            "ideviceinfo",
            "printf 'DeviceName: Evidence iPhone\\nProductVersion: 16.5\\n'",
        );
        let mut session = Session::new(config);
        session.create_case("C1", "J. Doe").unwrap();

        let mut console = ScriptedConsole::new(&["3", "", "4"]);
        menu(&mut session, &mut console).unwrap();
        let text = console.text();
        assert!(text.contains("DeviceName"));
        assert!(text.contains("Evidence iPhone"));
        assert!(text.contains("16.5"));
    }
}
