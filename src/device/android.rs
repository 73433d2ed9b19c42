//! Android acquisition over `adb`
//!
//! Output parsers are plain functions so they can be tested without a
//! device; [`AdbClient`] wires them to the configured `adb` command.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use super::runner::{CommandOutput, ToolRunner};
use crate::config::ToolCommand;
use crate::error::{ToolkitError, ToolkitResult};

const TOOL: &str = "adb";

/// Starting directory of the read-only browser
pub const BROWSE_ROOT: &str = "/sdcard";

/// Connection state reported by `adb devices`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DeviceState {
    Device,
    Offline,
    Unauthorized,
    Other(String),
}

impl DeviceState {
    pub fn parse(state: &str) -> Self {
        match state {
            "device" => DeviceState::Device,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            other => DeviceState::Other(other.to_string()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DeviceState::Device => "connected (ADB authorized)".to_string(),
            DeviceState::Offline => "offline".to_string(),
            DeviceState::Unauthorized => "unauthorized (USB debugging not accepted)".to_string(),
            DeviceState::Other(s) => s.clone(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            DeviceState::Device => 3,
            DeviceState::Unauthorized => 2,
            DeviceState::Offline => 1,
            DeviceState::Other(_) => 0,
        }
    }
}

/// One line of `adb devices`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdbDevice {
    pub serial: String,
    pub state: DeviceState,
}

/// Parse `adb devices` output, skipping the header and daemon notices
pub fn parse_adb_devices(output: &str) -> Vec<AdbDevice> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            Some(AdbDevice {
                serial: serial.to_string(),
                state: DeviceState::parse(state),
            })
        })
        .collect()
}

/// Most usable state among the listed devices
pub fn best_state(devices: &[AdbDevice]) -> Option<&DeviceState> {
    devices.iter().map(|d| &d.state).max_by_key(|s| s.rank())
}

/// Package names from `pm list packages`, sorted
pub fn parse_packages(output: &str) -> Vec<String> {
    let mut packages: Vec<String> = output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    packages.sort();
    packages.dedup();
    packages
}

/// Accept only Java-style package names such as `com.whatsapp`
pub fn validate_package_name(name: &str) -> ToolkitResult<()> {
    let valid_segment = |segment: &str| {
        let mut chars = segment.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    let segments: Vec<&str> = name.split('.').collect();
    if segments.len() >= 2 && segments.iter().all(|s| valid_segment(s)) {
        Ok(())
    } else {
        Err(ToolkitError::InvalidInput(format!(
            "'{}' is not a valid Android package name",
            name
        )))
    }
}

/// Quote a path for the device-side shell that `adb shell` goes through
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "'\\''"))
}

/// A command typed into the read-only browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseCommand {
    List,
    Up,
    Cd(String),
    Quit,
    Invalid(String),
}

impl BrowseCommand {
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let lower = input.to_ascii_lowercase();
        match lower.as_str() {
            "ls" => return BrowseCommand::List,
            "quit" | "exit" => return BrowseCommand::Quit,
            "cd .." => return BrowseCommand::Up,
            _ => {}
        }
        match input.strip_prefix("cd ").or_else(|| input.strip_prefix("CD ")) {
            Some(target) if !target.trim().is_empty() => {
                let target = target.trim();
                if target == ".." {
                    BrowseCommand::Up
                } else {
                    BrowseCommand::Cd(target.to_string())
                }
            }
            _ => BrowseCommand::Invalid(input.to_string()),
        }
    }
}

/// Current position of the read-only browser on the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBrowser {
    current: String,
}

impl Default for RemoteBrowser {
    fn default() -> Self {
        Self::new(BROWSE_ROOT)
    }
}

impl RemoteBrowser {
    pub fn new(start: &str) -> Self {
        Self {
            current: normalize_remote(start),
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Path `target` would lead to, without moving
    pub fn resolve(&self, target: &str) -> String {
        if target.starts_with('/') {
            normalize_remote(target)
        } else {
            normalize_remote(&format!("{}/{}", self.current, target))
        }
    }

    pub fn enter(&mut self, path: String) {
        self.current = path;
    }

    /// Move to the parent; `/` stays `/`
    pub fn up(&mut self) {
        self.current = self.resolve("..");
    }
}

/// Collapse `.`, `..` and duplicate separators in a POSIX path
pub fn normalize_remote(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Result of the device diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDiagnosis {
    pub devices: Vec<AdbDevice>,
    pub best: Option<DeviceState>,
    /// `Some(true)` when `su -c id` reported uid 0; `None` when not attempted
    pub root: Option<bool>,
}

/// Basic identification of the connected device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AndroidInfo {
    pub devices: Vec<AdbDevice>,
    pub model: String,
    pub android_version: String,
}

/// Thin wrapper over the configured `adb`
#[derive(Debug, Clone)]
pub struct AdbClient {
    command: ToolCommand,
    runner: ToolRunner,
}

impl AdbClient {
    pub fn new(command: ToolCommand, runner: ToolRunner) -> Self {
        Self { command, runner }
    }

    fn capture(&self, args: &[&str]) -> ToolkitResult<CommandOutput> {
        self.runner.capture(TOOL, &self.command, args)
    }

    pub fn devices(&self) -> ToolkitResult<Vec<AdbDevice>> {
        let output = self.capture(&["devices"])?.require_success(TOOL)?;
        Ok(parse_adb_devices(&output.stdout))
    }

    /// First device in state `device`, or an error naming what was found
    pub fn require_authorized(&self) -> ToolkitResult<AdbDevice> {
        let devices = self.devices()?;
        if let Some(device) = devices.iter().find(|d| d.state == DeviceState::Device) {
            return Ok(device.clone());
        }
        let reason = match best_state(&devices) {
            Some(state) => format!("device is {}", state.describe()),
            None => "no Android device detected".to_string(),
        };
        Err(ToolkitError::NoDevice(reason))
    }

    pub fn diagnose(&self) -> ToolkitResult<DeviceDiagnosis> {
        let devices = self.devices()?;
        let best = best_state(&devices).cloned();
        let root = if best == Some(DeviceState::Device) {
            let output = self.capture(&["shell", "su", "-c", "id"])?;
            Some(output.success() && output.stdout.contains("uid=0"))
        } else {
            None
        };
        debug!(devices = devices.len(), ?best, ?root, "Android diagnosis");
        Ok(DeviceDiagnosis {
            devices,
            best,
            root,
        })
    }

    pub fn property(&self, name: &str) -> ToolkitResult<String> {
        let output = self
            .capture(&["shell", "getprop", name])?
            .require_success(TOOL)?;
        Ok(output.stdout.trim().to_string())
    }

    pub fn info(&self) -> ToolkitResult<AndroidInfo> {
        let devices = self.devices()?;
        Ok(AndroidInfo {
            devices,
            model: self.property("ro.product.model")?,
            android_version: self.property("ro.build.version.release")?,
        })
    }

    /// `adb backup -all -apk -shared`, written to `dest`
    pub fn backup_full(&self, dest: &Path, sink: &mut dyn FnMut(&str)) -> ToolkitResult<()> {
        info!(dest = %dest.display(), "Starting full ADB backup");
        let dest = dest.to_string_lossy().into_owned();
        self.runner
            .run(
                TOOL,
                &self.command,
                ["backup", "-f", dest.as_str(), "-all", "-apk", "-shared"],
                sink,
            )?
            .require_success(TOOL)?;
        Ok(())
    }

    /// `adb backup -noapk <package>`, written to `dest`
    pub fn backup_app(
        &self,
        dest: &Path,
        package: &str,
        sink: &mut dyn FnMut(&str),
    ) -> ToolkitResult<()> {
        validate_package_name(package)?;
        info!(dest = %dest.display(), package, "Starting app ADB backup");
        let dest = dest.to_string_lossy().into_owned();
        self.runner
            .run(
                TOOL,
                &self.command,
                ["backup", "-f", dest.as_str(), "-noapk", package],
                sink,
            )?
            .require_success(TOOL)?;
        Ok(())
    }

    /// Dump the log buffer (`logcat -d`) into `dest`, bytes unchanged
    pub fn logcat(&self, dest: &Path) -> ToolkitResult<u64> {
        let output = self.capture(&["logcat", "-d"])?.require_success(TOOL)?;
        std::fs::write(dest, &output.stdout_bytes)?;
        Ok(output.stdout_bytes.len() as u64)
    }

    pub fn list_packages(&self) -> ToolkitResult<Vec<String>> {
        let output = self
            .capture(&["shell", "pm", "list", "packages"])?
            .require_success(TOOL)?;
        Ok(parse_packages(&output.stdout))
    }

    pub fn pull(&self, remote: &str, local: &Path, sink: &mut dyn FnMut(&str)) -> ToolkitResult<()> {
        let local = local.to_string_lossy().into_owned();
        self.runner
            .run(TOOL, &self.command, ["pull", remote, local.as_str()], sink)?
            .require_success(TOOL)?;
        Ok(())
    }

    /// `ls -la` of a remote directory
    pub fn list_dir(&self, path: &str) -> ToolkitResult<String> {
        let output = self.capture(&["shell", "ls", "-la", &shell_quote(path)])?;
        Ok(if output.stdout.trim().is_empty() {
            output.stderr
        } else {
            output.stdout
        })
    }

    /// True when `ls <path>` succeeds without a not-found or permission error
    pub fn dir_accessible(&self, path: &str) -> ToolkitResult<bool> {
        let output = self.capture(&["shell", "ls", &shell_quote(path)])?;
        let combined = format!("{}{}", output.stdout, output.stderr);
        Ok(output.success()
            && !combined.contains("No such file or directory")
            && !combined.contains("Permission denied")
            && !combined.contains("Not a directory"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_adb_devices() {
        let output = "* daemon not running; starting now at tcp:5037\n\
                      * daemon started successfully\n\
                      List of devices attached\n\
                      R58M12ABCDE\tdevice\n\
                      emulator-5554\toffline\n\
                      0123456789\tunauthorized\n\
                      XYZ\trecovery\n\n";
        let devices = parse_adb_devices(output);
        assert_eq!(devices.len(), 4);
        assert_eq!(devices[0].serial, "R58M12ABCDE");
        assert_eq!(devices[0].state, DeviceState::Device);
        assert_eq!(devices[1].state, DeviceState::Offline);
        assert_eq!(devices[2].state, DeviceState::Unauthorized);
        assert_eq!(devices[3].state, DeviceState::Other("recovery".to_string()));
        assert_eq!(best_state(&devices), Some(&DeviceState::Device));
    }

    #[test]
    fn test_best_state_without_authorized_device() {
        assert_eq!(best_state(&parse_adb_devices("List of devices attached\n")), None);
        let devices = parse_adb_devices("a\toffline\nb\tunauthorized\n");
        assert_eq!(best_state(&devices), Some(&DeviceState::Unauthorized));
    }

    #[test]
    fn test_parse_packages() {
        let output = "package:com.whatsapp\npackage:com.android.chrome\n\ngarbage\npackage:com.whatsapp\n";
        assert_eq!(parse_packages(output), vec!["com.android.chrome", "com.whatsapp"]);
    }

    #[test]
    fn test_validate_package_name() {
        assert!(validate_package_name("com.whatsapp").is_ok());
        assert!(validate_package_name("org.telegram.messenger").is_ok());
        assert!(validate_package_name("com.example_app.v2").is_ok());
        for bad in ["", "whatsapp", "com..x", "com.whatsapp; rm -rf /", "-all", "com.1abc"] {
            assert!(validate_package_name(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_browse_command_parse() {
        assert_eq!(BrowseCommand::parse("ls"), BrowseCommand::List);
        assert_eq!(BrowseCommand::parse(" LS "), BrowseCommand::List);
        assert_eq!(BrowseCommand::parse("cd .."), BrowseCommand::Up);
        assert_eq!(BrowseCommand::parse("cd DCIM"), BrowseCommand::Cd("DCIM".to_string()));
        assert_eq!(BrowseCommand::parse("quit"), BrowseCommand::Quit);
        assert!(matches!(BrowseCommand::parse("rm -rf /sdcard"), BrowseCommand::Invalid(_)));
        assert!(matches!(BrowseCommand::parse("cd"), BrowseCommand::Invalid(_)));
        assert!(matches!(BrowseCommand::parse("cat file"), BrowseCommand::Invalid(_)));
    }

    #[test]
    fn test_remote_navigation() {
        let mut browser = RemoteBrowser::default();
        assert_eq!(browser.current(), "/sdcard");
        assert_eq!(browser.resolve("DCIM/Camera"), "/sdcard/DCIM/Camera");
        assert_eq!(browser.resolve("/data/local/tmp/"), "/data/local/tmp");
        assert_eq!(browser.resolve("../system"), "/system");

        browser.up();
        assert_eq!(browser.current(), "/");
        browser.up();
        assert_eq!(browser.current(), "/");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/sdcard/My Files"), "'/sdcard/My Files'");
        assert_eq!(shell_quote("a'b"), "'a'\\''b'");
    }

    #[cfg(unix)]
    mod with_fake_adb {
        use super::super::*;
        use crate::device::runner::test_support::fake_tool;
        use tempfile::TempDir;

        const FAKE_ADB: &str = r#"
case "$1" in
  devices) printf 'List of devices attached\nSERIAL1\tdevice\n' ;;
  shell)
    shift
    case "$1 $2" in
      "getprop ro.product.model") echo "Pixel 7" ;;
      "getprop ro.build.version.release") echo "14" ;;
      "su -c") echo "uid=0(root) gid=0(root)" ;;
      "pm list") printf 'package:com.b\npackage:com.a\n' ;;
      "ls '/sdcard/Missing'") echo "ls: /sdcard/Missing: No such file or directory"; exit 1 ;;
      *) echo "ok" ;;
    esac ;;
  logcat) echo "I/ActivityManager: start" ;;
  backup) echo "Now unlock your device and confirm the backup operation."; printf 'AB' > "$3" ;;
  pull) printf 'data' > "$3"; echo "1 file pulled" ;;
esac
"#;

        fn client(dir: &TempDir) -> AdbClient {
            AdbClient::new(fake_tool(dir.path(), "adb", FAKE_ADB), ToolRunner::new())
        }

        #[test]
        fn test_info_and_diagnosis() {
            let dir = TempDir::new().unwrap();
            let adb = client(&dir);

            let info = adb.info().unwrap();
            assert_eq!(info.model, "Pixel 7");
            assert_eq!(info.android_version, "14");

            let diagnosis = adb.diagnose().unwrap();
            assert_eq!(diagnosis.best, Some(DeviceState::Device));
            assert_eq!(diagnosis.root, Some(true));
            assert_eq!(adb.require_authorized().unwrap().serial, "SERIAL1");
            assert_eq!(adb.list_packages().unwrap(), vec!["com.a", "com.b"]);
        }

        #[test]
        fn test_backup_logcat_and_pull() {
            let dir = TempDir::new().unwrap();
            let adb = client(&dir);

            let backup = dir.path().join("full_backup.ab");
            let mut lines = Vec::new();
            adb.backup_full(&backup, &mut |l| lines.push(l.to_string())).unwrap();
            assert!(backup.exists());
            assert!(lines[0].contains("unlock your device"));

            let logcat = dir.path().join("logcat.txt");
            assert!(adb.logcat(&logcat).unwrap() > 0);
            assert_eq!(std::fs::read_to_string(&logcat).unwrap(), "I/ActivityManager: start\n");

            let pulled = dir.path().join("msgstore.db");
            adb.pull("/sdcard/msgstore.db", &pulled, &mut |_| {}).unwrap();
            assert_eq!(std::fs::read(&pulled).unwrap(), b"data");

            assert!(adb.backup_app(&backup, "not a package", &mut |_| {}).is_err());
        }

        #[test]
        fn test_dir_accessible() {
            let dir = TempDir::new().unwrap();
            let adb = client(&dir);
            assert!(adb.dir_accessible("/sdcard/DCIM").unwrap());
            assert!(!adb.dir_accessible("/sdcard/Missing").unwrap());
        }
    }
}
