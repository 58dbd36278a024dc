//! Command runner for external process execution.
//!
//! Runs a tool to completion while streaming its stderr line by line
//! (ffmpeg and whisper-cli report progress there) and polling a
//! [`CancelToken`]. A cancelled child is killed and reaped before returning.

use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use super::cancel::CancelToken;

/// Errors from running an external tool.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} was cancelled")]
    Cancelled { tool: String },

    #[error("I/O error while running {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: io::Error,
    },
}

/// Collected output of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal.
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Exit code for error messages (-1 when there is none).
    pub fn code(&self) -> i32 {
        self.exit_code.unwrap_or(-1)
    }

    /// Last non-empty stderr line, or a generic message.
    pub fn last_error_line(&self) -> String {
        self.stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("no error output")
            .to_string()
    }
}

/// Runs external commands with cancellation and stderr streaming.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    poll_interval: Duration,
}

impl CommandRunner {
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }

    /// How often the cancel token and child status are checked.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run a command to completion.
    ///
    /// `on_stderr` receives every stderr line as it arrives (lines are split
    /// on `\n` and `\r`). A non-zero exit is not an error here; callers
    /// inspect [`CommandOutput::success`].
    pub fn run(
        &self,
        mut cmd: Command,
        cancel: &CancelToken,
        on_stderr: &mut dyn FnMut(&str),
    ) -> Result<CommandOutput, RunError> {
        let tool = cmd.get_program().to_string_lossy().into_owned();

        if cancel.is_cancelled() {
            return Err(RunError::Cancelled { tool });
        }

        tracing::debug!("Running: {}", format_command(&cmd));

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| RunError::Spawn {
            tool: tool.clone(),
            source,
        })?;

        let stdout_reader = child.stdout.take().map(spawn_stdout_reader);
        let (tx, rx) = mpsc::channel();
        let stderr_reader = child.stderr.take().map(|s| spawn_stderr_reader(s, tx));

        let mut stderr = String::new();
        let mut handle_line = |line: String, stderr: &mut String| {
            on_stderr(&line);
            stderr.push_str(&line);
            stderr.push('\n');
        };

        let status = loop {
            if cancel.is_cancelled() {
                // Reader threads end on their own once the pipes close.
                kill_and_reap(&mut child);
                tracing::debug!("{} killed after cancellation", tool);
                return Err(RunError::Cancelled { tool });
            }

            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(source) => {
                    kill_and_reap(&mut child);
                    return Err(RunError::Io { tool, source });
                }
            }

            match rx.recv_timeout(self.poll_interval) {
                Ok(line) => handle_line(line, &mut stderr),
                Err(RecvTimeoutError::Timeout) => {}
                // stderr closed; keep polling the child without busy-looping
                Err(RecvTimeoutError::Disconnected) => thread::sleep(self.poll_interval),
            }
        };

        join_quietly(stderr_reader);
        for line in drain(&rx) {
            handle_line(line, &mut stderr);
        }

        let stdout = stdout_reader
            .and_then(|h| h.join().ok())
            .unwrap_or_default();

        Ok(CommandOutput {
            exit_code: status.code(),
            success: status.success(),
            stdout,
            stderr,
        })
    }
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a command line for logs.
pub fn format_command(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    for arg in cmd.get_args() {
        let arg = arg.to_string_lossy();
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            parts.push(format!("\"{}\"", arg));
        } else {
            parts.push(arg.into_owned());
        }
    }
    parts.join(" ")
}

fn spawn_stdout_reader<R: Read + Send + 'static>(mut stdout: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn spawn_stderr_reader<R: Read + Send + 'static>(
    mut stderr: R,
    tx: Sender<String>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut pending = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = match stderr.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            for &byte in &chunk[..n] {
                if byte == b'\n' || byte == b'\r' {
                    if !pending.is_empty() {
                        let line = String::from_utf8_lossy(&pending).into_owned();
                        pending.clear();
                        if tx.send(line).is_err() {
                            return;
                        }
                    }
                } else {
                    pending.push(byte);
                }
            }
        }
        if !pending.is_empty() {
            let _ = tx.send(String::from_utf8_lossy(&pending).into_owned());
        }
    })
}

fn drain(rx: &Receiver<String>) -> Vec<String> {
    rx.try_iter().collect()
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn join_quietly<T>(handle: Option<JoinHandle<T>>) {
    if let Some(h) = handle {
        let _ = h.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_command_with_quotes() {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-i", "my movie.mkv", "-vn"]);
        assert_eq!(format_command(&cmd), "ffmpeg -i \"my movie.mkv\" -vn");
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let runner = CommandRunner::new();
        let cmd = Command::new("jsub-definitely-not-a-real-tool");
        let err = runner
            .run(cmd, &CancelToken::new(), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, RunError::Spawn { .. }));
    }

    #[test]
    fn pre_cancelled_token_never_spawns() {
        let token = CancelToken::new();
        token.cancel();
        let err = CommandRunner::new()
            .run(Command::new("jsub-definitely-not-a-real-tool"), &token, &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, RunError::Cancelled { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn streams_stderr_lines_and_collects_stdout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; printf 'progress = 10%%\\rprogress = 20%%\\n' >&2; exit 3"]);

        let mut lines = Vec::new();
        let output = CommandRunner::new()
            .run(cmd, &CancelToken::new(), &mut |l| lines.push(l.to_string()))
            .unwrap();

        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(lines, vec!["progress = 10%", "progress = 20%"]);
        assert!(!output.success);
        assert_eq!(output.code(), 3);
        assert_eq!(output.last_error_line(), "progress = 20%");
    }

    #[cfg(unix)]
    #[test]
    fn cancellation_kills_child() {
        let token = CancelToken::new();
        let canceller = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            canceller.cancel();
        });

        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exec sleep 10"]);
        let started = std::time::Instant::now();
        let err = CommandRunner::new().run(cmd, &token, &mut |_| {}).unwrap_err();
        handle.join().unwrap();

        assert!(matches!(err, RunError::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
