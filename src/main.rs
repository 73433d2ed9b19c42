use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use mft_lib::cli::Cli;
use mft_lib::config::ToolkitConfig;
use mft_lib::device::check_tools;
use mft_lib::logging;
use mft_lib::menu::{self, Console, Terminal, Tone};
use mft_lib::session::{running_as_root, Session};

fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    // Control log level with RUST_LOG or -v:
    //   RUST_LOG=mft_lib::device=trace mft
    logging::init(cli.verbose);

    let config = ToolkitConfig::load(&cli.overrides()).context("loading configuration")?;
    info!(acquisition_dir = %config.acquisition_dir.display(), "Configuration loaded");

    let mut terminal = Terminal::new();
    for missing in check_tools(&config.tools) {
        warn!(tool = missing.tool, program = %missing.program, "Tool not found");
        let program = if missing.program.is_empty() {
            "not configured".to_string()
        } else {
            format!("'{}' not found", missing.program)
        };
        terminal.note(
            Tone::Warning,
            &format!("{}: {}; {}", missing.tool, program, missing.hint),
        );
    }

    if running_as_root() && !menu::confirm_root(&mut terminal)? {
        return Ok(());
    }

    let mut session = Session::new(config);
    if let Some(name) = &cli.case {
        match session.open_case(name) {
            Ok(case) => {
                let message = format!("Case '{}' opened", case.name());
                terminal.note(Tone::Success, &message);
            }
            Err(error) => terminal.note(Tone::Error, &error.to_string()),
        }
    }

    menu::run(&mut session, &mut terminal).context("terminal I/O failed")?;
    Ok(())
}
