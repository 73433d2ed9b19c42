//! iLEAPP artifact parsing
//!
//! iLEAPP is a third-party Python tool; it is run with the configured
//! command and writes its HTML report into `iLEAPP_Reports/`.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::case::{Case, ILEAPP_DIR};
use crate::config::ToolCommand;
use crate::device::ToolRunner;
use crate::error::{ToolkitError, ToolkitResult};

/// Run iLEAPP over `input` and return the report directory
pub fn run_ileapp(
    case: &Case,
    command: &ToolCommand,
    runner: &ToolRunner,
    input: &Path,
    sink: &mut dyn FnMut(&str),
) -> ToolkitResult<PathBuf> {
    if !command.is_configured() {
        return Err(ToolkitError::ToolNotConfigured {
            tool: "ileapp".to_string(),
        });
    }
    if !input.exists() {
        return Err(ToolkitError::InvalidInput(format!(
            "{} does not exist",
            input.display()
        )));
    }

    let output_dir = case.subdir(ILEAPP_DIR)?;
    runner
        .run(
            "ileapp",
            command,
            [
                OsStr::new("-o"),
                output_dir.as_os_str(),
                OsStr::new("-i"),
                input.as_os_str(),
            ],
            sink,
        )?
        .require_success("ileapp")?;

    info!(input = %input.display(), output = %output_dir.display(), "iLEAPP finished");
    Ok(output_dir)
}
