//! iOS acquisition over libimobiledevice
//!
//! `ideviceinfo` identifies the device and `idevicebackup2` produces a full
//! backup directory.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use super::runner::ToolRunner;
use crate::config::ToolCommand;
use crate::error::ToolkitResult;

const INFO_TOOL: &str = "ideviceinfo";
const BACKUP_TOOL: &str = "idevicebackup2";

/// Keys shown first when summarizing `ideviceinfo`
pub const SUMMARY_KEYS: [&str; 6] = [
    "DeviceName",
    "ProductType",
    "ProductVersion",
    "BuildVersion",
    "SerialNumber",
    "UniqueDeviceID",
];

/// Top-level key/value pairs of `ideviceinfo`, in output order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IosDeviceInfo {
    pub properties: Vec<(String, String)>,
}

impl IosDeviceInfo {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Present summary keys with their values
    pub fn summary(&self) -> Vec<(&'static str, &str)> {
        SUMMARY_KEYS
            .iter()
            .filter_map(|key| self.get(key).map(|v| (*key, v)))
            .collect()
    }
}

/// Parse `ideviceinfo` output; indented lines belong to nested dictionaries
/// and are skipped
pub fn parse_ideviceinfo(output: &str) -> IosDeviceInfo {
    let properties = output
        .lines()
        .filter(|line| !line.starts_with(char::is_whitespace))
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            if key.is_empty() || key.contains(' ') {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect();
    IosDeviceInfo { properties }
}

/// Wrapper over the configured libimobiledevice tools
#[derive(Debug, Clone)]
pub struct IosClient {
    info_command: ToolCommand,
    backup_command: ToolCommand,
    runner: ToolRunner,
}

impl IosClient {
    pub fn new(info_command: ToolCommand, backup_command: ToolCommand, runner: ToolRunner) -> Self {
        Self {
            info_command,
            backup_command,
            runner,
        }
    }

    pub fn info(&self) -> ToolkitResult<IosDeviceInfo> {
        let output = self
            .runner
            .capture(INFO_TOOL, &self.info_command, Vec::<String>::new())?
            .require_success(INFO_TOOL)?;
        Ok(parse_ideviceinfo(&output.stdout))
    }

    /// `idevicebackup2 backup --full <dest>`; the device must be unlocked
    pub fn backup_full(&self, dest: &Path, sink: &mut dyn FnMut(&str)) -> ToolkitResult<()> {
        info!(dest = %dest.display(), "Starting full iOS backup");
        self.runner
            .run(
                BACKUP_TOOL,
                &self.backup_command,
                [
                    std::ffi::OsStr::new("backup"),
                    std::ffi::OsStr::new("--full"),
                    dest.as_os_str(),
                ],
                sink,
            )?
            .require_success(BACKUP_TOOL)?;
        Ok(())
    }
}
