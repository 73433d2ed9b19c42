//! External tool execution
//!
//! Every device tool is spawned with an argument vector, never through a
//! shell. Stdout is streamed line by line to a caller-supplied sink while a
//! helper thread drains stderr. When a transcript path is set, the command
//! line, both streams and the exit status are appended to it.

use std::ffi::OsStr;
use std::fs::OpenOptions;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use tracing::{debug, trace, warn};

use crate::common::audit;
use crate::config::{ToolCommand, ToolsConfig};
use crate::error::{ToolkitError, ToolkitResult};
use crate::logging;

/// Lines of output kept in a `ToolFailed` error
const ERROR_TAIL_LINES: usize = 5;

/// Captured result of one tool run
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    /// Lossy text of stdout, one line per `\n`
    pub stdout: String,
    /// Stdout exactly as the tool wrote it
    pub stdout_bytes: Vec<u8>,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Last non-empty lines of stderr, or of stdout when stderr is empty
    pub fn tail(&self, lines: usize) -> String {
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let kept: Vec<&str> = source
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        kept[kept.len().saturating_sub(lines)..].join(" / ")
    }

    /// Turn a non-zero exit into `ToolkitError::ToolFailed`
    pub fn require_success(self, tool: &str) -> ToolkitResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(ToolkitError::ToolFailed {
                tool: tool.to_string(),
                status: self.status.to_string(),
                tail: self.tail(ERROR_TAIL_LINES),
            })
        }
    }
}

/// Spawns configured tools and records their output
#[derive(Debug, Clone, Default)]
pub struct ToolRunner {
    transcript: Option<PathBuf>,
}

impl ToolRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw output of every run to `path`
    pub fn with_transcript(path: impl Into<PathBuf>) -> Self {
        Self {
            transcript: Some(path.into()),
        }
    }

    pub fn transcript(&self) -> Option<&Path> {
        self.transcript.as_deref()
    }

    /// Run `tool` and stream each stdout line to `sink`
    pub fn run<I, S>(
        &self,
        tool: &str,
        command: &ToolCommand,
        args: I,
        sink: &mut dyn FnMut(&str),
    ) -> ToolkitResult<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = command
            .executable()
            .ok_or_else(|| ToolkitError::ToolNotConfigured {
                tool: tool.to_string(),
            })?;

        let mut argv: Vec<std::ffi::OsString> = command
            .leading_args()
            .iter()
            .map(std::ffi::OsString::from)
            .collect();
        argv.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));

        let command_line = render_command_line(program, &argv);
        debug!(tool, command = %command_line, "Spawning external tool");

        let mut child = Command::new(program)
            .args(&argv)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolkitError::ToolUnavailable {
                tool: tool.to_string(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("failed to capture stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("failed to capture stderr"))?;

        let stderr_handle = thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        });

        let mut collected = String::new();
        let mut stdout_bytes = Vec::new();
        let mut reader = BufReader::new(stdout);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            if reader.read_until(b'\n', &mut raw)? == 0 {
                break;
            }
            stdout_bytes.extend_from_slice(&raw);
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\r', '\n']);
            if logging::is_debug_enabled() {
                trace!(tool, line, "stdout");
            }
            sink(line);
            collected.push_str(line);
            collected.push('\n');
        }

        let status = child.wait()?;
        let stderr_text = stderr_handle
            .join()
            .map_err(|_| io::Error::other("stderr reader thread panicked"))?;

        let output = CommandOutput {
            status,
            stdout: collected,
            stdout_bytes,
            stderr: stderr_text,
        };

        audit::log_tool_invocation(tool, &command_line, &status.to_string());
        if let Some(path) = &self.transcript {
            if let Err(e) = append_transcript(path, &command_line, &output) {
                warn!(path = %path.display(), error = %e, "Failed to write transcript");
            }
        }
        Ok(output)
    }

    /// Run `tool` without echoing its output
    pub fn capture<I, S>(
        &self,
        tool: &str,
        command: &ToolCommand,
        args: I,
    ) -> ToolkitResult<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run(tool, command, args, &mut |_| {})
    }
}

fn render_command_line(program: &str, argv: &[std::ffi::OsString]) -> String {
    let mut parts = vec![quote(program)];
    parts.extend(argv.iter().map(|a| quote(&a.to_string_lossy())));
    parts.join(" ")
}

fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.contains(char::is_whitespace) {
        format!("\"{}\"", arg)
    } else {
        arg.to_string()
    }
}

fn append_transcript(path: &Path, command_line: &str, output: &CommandOutput) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(
        file,
        "===== [{}] $ {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        command_line
    )?;
    file.write_all(output.stdout.as_bytes())?;
    if !output.stderr.trim().is_empty() {
        writeln!(file, "----- stderr")?;
        file.write_all(output.stderr.as_bytes())?;
        if !output.stderr.ends_with('\n') {
            writeln!(file)?;
        }
    }
    writeln!(file, "----- {}", output.status)?;
    Ok(())
}

/// A configured tool that could not be found on this machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTool {
    pub tool: &'static str,
    pub program: String,
    pub hint: &'static str,
}

/// Look up the acquisition tools on PATH
///
/// iLEAPP is optional and only checked when configured.
pub fn check_tools(tools: &ToolsConfig) -> Vec<MissingTool> {
    let android_hint = "install the Android SDK Platform Tools and add them to PATH";
    let ios_hint = "install libimobiledevice";
    let candidates = [
        ("adb", &tools.adb, android_hint, true),
        ("idevicebackup2", &tools.idevicebackup2, ios_hint, true),
        ("ideviceinfo", &tools.ideviceinfo, ios_hint, true),
        (
            "ileapp",
            &tools.ileapp,
            "download iLEAPP and set tools.ileapp in the configuration",
            false,
        ),
    ];

    candidates
        .into_iter()
        .filter_map(|(tool, command, hint, required)| match command.executable() {
            Some(program) if which::which(program).is_err() => Some(MissingTool {
                tool,
                program: program.to_string(),
                hint,
            }),
            None if required => Some(MissingTool {
                tool,
                program: String::new(),
                hint,
            }),
            _ => None,
        })
        .collect()
}

#[cfg(all(test, unix))]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};

    use crate::config::ToolCommand;

    /// Write a shell script and return a list-form command that runs it
    pub fn fake_tool(dir: &Path, name: &str, body: &str) -> ToolCommand {
        let path: PathBuf = dir.join(format!("{}.sh", name));
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        ToolCommand::WithArgs(vec!["sh".to_string(), path.display().to_string()])
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::test_support::fake_tool;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_streams_stdout_and_collects_stderr() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(dir.path(), "adb", "echo one; echo two; echo oops >&2");

        let mut seen = Vec::new();
        let output = ToolRunner::new()
            .run("adb", &tool, ["devices"], &mut |line| seen.push(line.to_string()))
            .unwrap();

        assert!(output.success());
        assert_eq!(seen, vec!["one", "two"]);
        assert_eq!(output.stdout, "one\ntwo\n");
        assert_eq!(output.stdout_bytes, b"one\ntwo\n");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[test]
    fn test_arguments_are_passed_verbatim() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(dir.path(), "echoargs", "for a in \"$@\"; do echo \"[$a]\"; done");

        let output = ToolRunner::new()
            .capture("echoargs", &tool, ["backup", "-f", "/tmp/with space.ab", "$(id)"])
            .unwrap();
        assert_eq!(output.stdout, "[backup]\n[-f]\n[/tmp/with space.ab]\n[$(id)]\n");
    }

    #[test]
    fn test_raw_stdout_is_kept_byte_for_byte() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(dir.path(), "adb", r"printf 'a\377b\r\nc'");

        let mut seen = Vec::new();
        let output = ToolRunner::new()
            .run("adb", &tool, ["logcat", "-d"], &mut |line| seen.push(line.to_string()))
            .unwrap();
        assert_eq!(output.stdout_bytes, vec![97, 255, 98, 13, 10, 99]);
        assert_eq!(seen, vec!["a\u{fffd}b", "c"]);
    }

    #[test]
    fn test_failure_maps_to_tool_failed() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(
            dir.path(),
            "adb",
            "echo 'error: no devices/emulators found' >&2; exit 1",
        );

        let output = ToolRunner::new().capture("adb", &tool, ["logcat", "-d"]).unwrap();
        assert!(!output.success());
        match output.require_success("adb") {
            Err(ToolkitError::ToolFailed { tool, tail, .. }) => {
                assert_eq!(tool, "adb");
                assert_eq!(tail, "error: no devices/emulators found");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_missing_program() {
        let result = ToolRunner::new().capture(
            "adb",
            &ToolCommand::program("definitely-not-a-real-tool-mft"),
            ["devices"],
        );
        assert!(matches!(result, Err(ToolkitError::ToolUnavailable { .. })));

        let result = ToolRunner::new().capture("ileapp", &ToolCommand::program(""), ["-h"]);
        assert!(matches!(result, Err(ToolkitError::ToolNotConfigured { .. })));
    }

    #[test]
    fn test_transcript_written() {
        let dir = TempDir::new().unwrap();
        let tool = fake_tool(dir.path(), "ideviceinfo", "echo 'DeviceName: iPhone'; echo warn >&2");
        let transcript = dir.path().join("transcript.log");

        ToolRunner::with_transcript(&transcript)
            .capture("ideviceinfo", &tool, Vec::<String>::new())
            .unwrap();

        let text = std::fs::read_to_string(&transcript).unwrap();
        assert!(text.contains("ideviceinfo.sh"));
        assert!(text.contains("DeviceName: iPhone"));
        assert!(text.contains("----- stderr\nwarn"));
    }

    #[test]
    fn test_check_tools_reports_missing() {
        let tools = ToolsConfig {
            adb: ToolCommand::program("sh"),
            idevicebackup2: ToolCommand::program("definitely-not-a-real-tool-mft"),
            ideviceinfo: ToolCommand::program("sh"),
            ileapp: ToolCommand::program(""),
        };
        let missing = check_tools(&tools);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].tool, "idevicebackup2");
    }
}
