//! Process runner: the only way the pipeline touches external tools.
//!
//! Call sites build an [`Invocation`] with the tool's argument grammar and
//! hand it to a [`ProcessRunner`]. The system implementation streams the
//! child's stdout/stderr into tracing line by line as it is produced and
//! returns once the process exits.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use boxforge_shared::errors::{ForgeError, ForgeResult};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// A single external command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Program and arguments joined by spaces, for logs and matching.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Exit status of a finished process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessStatus {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl ProcessStatus {
    pub const SUCCESS: ProcessStatus = ProcessStatus { code: Some(0) };

    pub fn exited(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external commands to completion.
///
/// A non-zero exit is reported through [`ProcessStatus`], not as an error;
/// `Err` means the process could not be run at all.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> ForgeResult<ProcessStatus>;

    /// Run and map a non-zero exit to the error built by `on_failure`.
    async fn run_checked(
        &self,
        invocation: &Invocation,
        on_failure: &(dyn Fn(ProcessStatus) -> ForgeError + Send + Sync),
    ) -> ForgeResult<()> {
        let status = self.run(invocation).await?;
        if status.success() {
            Ok(())
        } else {
            Err(on_failure(status))
        }
    }
}

/// Runs commands on the local system with `tokio::process`.
#[derive(Clone, Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> ForgeResult<ProcessStatus> {
        tracing::info!(cwd = ?invocation.cwd, "$ {}", invocation);

        let mut cmd = tokio::process::Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            ForgeError::Infrastructure(format!(
                "failed to spawn '{}': {}",
                invocation.program, e
            ))
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (_, _, status) = tokio::join!(
            stream_lines(stdout, Stream::Stdout),
            stream_lines(stderr, Stream::Stderr),
            child.wait()
        );

        let status = status.map_err(|e| {
            ForgeError::Infrastructure(format!(
                "failed to wait for '{}': {}",
                invocation.program, e
            ))
        })?;

        if !status.success() {
            tracing::debug!(code = ?status.code(), "{} exited unsuccessfully", invocation.program);
        }

        Ok(ProcessStatus {
            code: status.code(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Forward each line of a child pipe to tracing until EOF.
async fn stream_lines<R: AsyncRead + Unpin>(reader: Option<R>, stream: Stream) {
    let Some(reader) = reader else {
        return;
    };

    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let clean_line = strip_ansi_codes(&line);
                match stream {
                    Stream::Stdout => tracing::info!(target: "boxforge::process", "{}", clean_line),
                    Stream::Stderr => tracing::warn!(target: "boxforge::process", "{}", clean_line),
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(target: "boxforge::process", stream = ?stream, "Failed to read from pipe: {}", e);
                break;
            }
        }
    }
}

/// Strips ANSI escape codes (`\x1b[...m`) so tool output isn't double-formatted.
fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if chars.next() == Some('[') {
                for next_char in chars.by_ref() {
                    if next_char == 'm' {
                        break;
                    }
                }
            }
        } else {
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let inv = Invocation::new("lxc")
            .args(["exec", "web", "--"])
            .arg("/SetupTemp/provision.sh");
        assert_eq!(inv.command_line(), "lxc exec web -- /SetupTemp/provision.sh");
        assert_eq!(inv.to_string(), inv.command_line());
    }

    #[test]
    fn test_strip_ansi_codes() {
        assert_eq!(strip_ansi_codes("\x1b[32mok\x1b[0m done"), "ok done");
        assert_eq!(strip_ansi_codes("plain"), "plain");
    }

    #[tokio::test]
    async fn test_system_runner_reports_exit_code() {
        let runner = SystemRunner::new();

        let ok = runner
            .run(&Invocation::new("sh").args(["-c", "echo hello; echo oops >&2"]))
            .await
            .unwrap();
        assert!(ok.success());

        let failed = runner
            .run(&Invocation::new("sh").args(["-c", "exit 3"]))
            .await
            .unwrap();
        assert_eq!(failed.code, Some(3));
    }

    #[tokio::test]
    async fn test_system_runner_uses_cwd() {
        let temp = tempfile::TempDir::new().unwrap();
        let runner = SystemRunner::new();

        let status = runner
            .run(
                &Invocation::new("sh")
                    .args(["-c", "touch marker"])
                    .current_dir(temp.path()),
            )
            .await
            .unwrap();

        assert!(status.success());
        assert!(temp.path().join("marker").exists());
    }

    #[tokio::test]
    async fn test_system_runner_missing_program() {
        let runner = SystemRunner::new();
        let err = runner
            .run(&Invocation::new("definitely-not-a-real-binary-boxforge"))
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::Infrastructure(_)));
    }

    #[tokio::test]
    async fn test_run_checked_maps_failure() {
        let runner = SystemRunner::new();
        let err = runner
            .run_checked(&Invocation::new("sh").args(["-c", "exit 1"]), &|status| {
                ForgeError::provisioning("web", "probe", status.code)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::Provisioning { code: Some(1), .. }));
    }
}
