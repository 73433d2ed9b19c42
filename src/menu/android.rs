use std::io;

use super::{ask, choose, outcome, pause, run_steps, tool_sink, Console, Flow, Step, Tone};
use crate::case::EvidenceItem;
use crate::device::android::{BrowseCommand, RemoteBrowser};
use crate::session::{Session, SUSPICIOUS_BACKUP_SIZE};

const OPTIONS: [&str; 11] = [
    "Full backup (adb backup)",
    "Backup of a single app",
    "Guided procedure for a locked device",
    "Dump system log (logcat)",
    "List installed apps",
    "Diagnose connection",
    "Pull a file from the device",
    "Browse the device file system (read-only)",
    "Device information",
    "Decode an .ab backup",
    "Back",
];

const GUIDED_PROCEDURE: &str = "Locked Android device";

pub(super) fn menu(session: &mut Session, console: &mut dyn Console) -> io::Result<Flow> {
    loop {
        let Some(choice) = choose(console, "Android forensics", &OPTIONS)? else {
            return Ok(Flow::Exit);
        };
        let flow = match choice.as_str() {
            "1" => full_backup(session, console)?,
            "2" => app_backup(session, console)?,
            "3" => guided_procedure(session, console)?,
            "4" => logcat(session, console),
            "5" => packages(session, console),
            "6" => diagnose(session, console),
            "7" => pull(session, console)?,
            "8" => browse(session, console)?,
            "9" => info(session, console),
            "10" => decode(session, console)?,
            "11" | "" => return Ok(Flow::Back),
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

/// Print a registered item and warn about backups the device likely refused
fn report_evidence(console: &mut dyn Console, item: &EvidenceItem, check_size: bool) {
    console.note(
        Tone::Success,
        &format!("{} saved as {} ({} bytes)", item.id, item.relative_path, item.size),
    );
    console.line(&format!("    SHA-256: {}", item.sha256));
    if check_size && item.size < SUSPICIOUS_BACKUP_SIZE {
        console.note(
            Tone::Warning,
            "The backup is very small. The device may have refused it or the app may block backups.",
        );
    }
}

fn backup_notice(console: &mut dyn Console) {
    console.note(Tone::Info, "Unlock the device and confirm the backup on its screen.");
    console.line("    Leave the password field empty so the backup is not encrypted.");
}

fn full_backup(session: &mut Session, console: &mut dyn Console) -> io::Result<Flow> {
    backup_notice(console);
    let result = {
        let mut sink = tool_sink(console);
        session.android_full_backup(&mut sink)
    };
    if let Some(item) = outcome(session, console, "Android full backup", result) {
        report_evidence(console, &item, true);
    }
    Ok(Flow::Back)
}

fn app_backup(session: &mut Session, console: &mut dyn Console) -> io::Result<Flow> {
    let Some(package) = ask(console, "Package name (e.g. com.whatsapp):")? else {
        return Ok(Flow::Exit);
    };
    if package.is_empty() {
        console.note(Tone::Warning, "Cancelled.");
        return Ok(Flow::Back);
    }
    backup_notice(console);
    let result = {
        let mut sink = tool_sink(console);
        session.android_app_backup(&package, &mut sink)
    };
    if let Some(item) = outcome(session, console, "Android app backup", result) {
        report_evidence(console, &item, true);
    }
    Ok(Flow::Back)
}

fn logcat(session: &mut Session, console: &mut dyn Console) -> Flow {
    console.note(Tone::Info, "Dumping the device log buffer...");
    let result = session.android_logcat();
    if let Some(item) = outcome(session, console, "Logcat", result) {
        report_evidence(console, &item, false);
    }
    Flow::Back
}

fn packages(session: &Session, console: &mut dyn Console) -> Flow {
    if let Some(packages) = outcome(session, console, "List apps", session.android_packages()) {
        for package in &packages {
            console.line(&format!("  {}", package));
        }
        console.note(Tone::Info, &format!("{} packages installed", packages.len()));
    }
    Flow::Back
}

fn diagnose(session: &Session, console: &mut dyn Console) -> Flow {
    let Some(diagnosis) = outcome(session, console, "Diagnostic", session.android_diagnose()) else {
        return Flow::Back;
    };
    for device in &diagnosis.devices {
        console.line(&format!("  {}  {}", device.serial, device.state.describe()));
    }
    match &diagnosis.best {
        None => {
            console.note(Tone::Error, "No device detected.");
            console.line("    Check the cable, enable USB debugging and run 'adb devices'.");
        }
        Some(state) => console.note(Tone::Success, &format!("Device state: {}", state.describe())),
    }
    match diagnosis.root {
        Some(true) => console.note(Tone::Success, "Root access is available."),
        Some(false) => console.note(Tone::Warning, "Root access is not available."),
        None => {}
    }
    Flow::Back
}

fn info(session: &Session, console: &mut dyn Console) -> Flow {
    if let Some(info) = outcome(session, console, "Device info", session.android_info()) {
        console.line(&format!("  Model:           {}", info.model));
        console.line(&format!("  Android version: {}", info.android_version));
        for device in &info.devices {
            console.line(&format!("  Serial:          {} ({})", device.serial, device.state.describe()));
        }
    }
    Flow::Back
}

fn pull(session: &mut Session, console: &mut dyn Console) -> io::Result<Flow> {
    let Some(remote) = ask(console, "Path on the device (e.g. /sdcard/Download/file.pdf):")? else {
        return Ok(Flow::Exit);
    };
    let result = {
        let mut sink = tool_sink(console);
        session.android_pull(&remote, &mut sink)
    };
    if let Some(item) = outcome(session, console, "Pull", result) {
        report_evidence(console, &item, false);
    }
    Ok(Flow::Back)
}

fn decode(session: &mut Session, console: &mut dyn Console) -> io::Result<Flow> {
    let Some(input) = ask(
        console,
        "Backup to decode (relative to the case, e.g. Android_Acquisition/full_backup.ab, or an absolute path):",
    )?
    else {
        return Ok(Flow::Exit);
    };
    let result = session.decode_backup(&input);
    if let Some((summary, item)) = outcome(session, console, "Decode", result) {
        console.note(
            Tone::Success,
            &format!(
                "{} files ({} bytes) extracted into {}",
                summary.files, summary.bytes, item.relative_path
            ),
        );
        if summary.skipped > 0 {
            console.note(
                Tone::Warning,
                &format!("{} entries with unsafe paths were skipped", summary.skipped),
            );
        }
    }
    Ok(Flow::Back)
}

/// Read-only shell over `adb shell ls`; only `ls`, `cd <dir>`, `cd ..` and `quit`
fn browse(session: &Session, console: &mut dyn Console) -> io::Result<Flow> {
    if outcome(session, console, "Browse", session.android_require_device()).is_none() {
        return Ok(Flow::Back);
    }
    console.note(Tone::Info, "Read-only browser. Commands: ls, cd <dir>, cd .., quit");

    let mut browser = RemoteBrowser::default();
    loop {
        let prompt = format!("forensic-shell:{}$", browser.current());
        let Some(input) = ask(console, &prompt)? else {
            return Ok(Flow::Exit);
        };
        if input.is_empty() {
            continue;
        }
        match BrowseCommand::parse(&input) {
            BrowseCommand::Quit => return Ok(Flow::Back),
            BrowseCommand::List => {
                if let Some(listing) = outcome(
                    session,
                    console,
                    "Browse",
                    session.android_list_dir(browser.current()),
                ) {
                    for line in listing.lines() {
                        console.line(line);
                    }
                }
            }
            BrowseCommand::Up => browser.up(),
            BrowseCommand::Cd(target) => {
                let path = browser.resolve(&target);
                match outcome(session, console, "Browse", session.android_dir_accessible(&path)) {
                    Some(true) => browser.enter(path),
                    Some(false) => console.note(
                        Tone::Error,
                        &format!("'{}' is not a directory or cannot be read", path),
                    ),
                    None => {}
                }
            }
            BrowseCommand::Invalid(command) => console.note(
                Tone::Error,
                &format!("'{}' is not allowed. Use ls, cd <dir>, cd .. or quit.", command),
            ),
        }
    }
}

const LOCKED_DEVICE_STEPS: [Step; 3] = [
    Step {
        title: "Step 1: gain privileged access",
        lines: &[
            "Choose a method that fits the device and the legal authority you hold:",
            "  - Unlock the bootloader and boot a custom recovery such as TWRP",
            "  - Root the device with Magisk",
            "  - For damaged or fully locked devices, chip-off or JTAG acquisition",
            "Bootloader unlocking usually wipes user data. Document every action.",
        ],
    },
    Step {
        title: "Step 2: run the acquisition tool",
        lines: &[
            "Run the external tool for the chosen method, for example:",
            "  adb shell su -c 'dd if=/dev/block/by-name/userdata' > userdata.img",
            "Store every output file inside the case folder.",
        ],
    },
    Step {
        title: "Step 3: document",
        lines: &[
            "Write down the tool versions, the commands you ran and their results.",
            "Use 'Add a note' to put them into the activity log.",
        ],
    },
];

fn guided_procedure(session: &Session, console: &mut dyn Console) -> io::Result<Flow> {
    console.note(
        Tone::Warning,
        "Advanced techniques ahead. They can alter or destroy data on the device.",
    );
    run_steps(session, console, GUIDED_PROCEDURE, &LOCKED_DEVICE_STEPS)
}
