//! External process execution.
//!
//! Every external tool invocation goes through a [`ProcessRunner`]. The
//! production [`SystemProcessRunner`] spawns the process, captures both
//! output streams without streaming them live, and enforces a hard
//! wall-clock timeout. Cleanup of files a failed process may have left
//! behind is the caller's concern, not the runner's.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Fallback diagnostic when a failing process wrote nothing to stderr.
const NO_DIAGNOSTIC: &str = "no diagnostic output";

/// Outcome of one external process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Diagnostic text on failure.
    pub diagnostic: Option<String>,
}

impl RunOutcome {
    /// A successful invocation.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            diagnostic: None,
        }
    }

    /// A failed invocation with diagnostic text.
    #[must_use]
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostic: Some(diagnostic.into()),
        }
    }

    /// A failed invocation that exceeded its timeout.
    ///
    /// The message is distinct from the generic failure diagnostic so
    /// timeouts are recognizable in reports.
    #[must_use]
    pub fn timed_out(timeout: Duration) -> Self {
        Self::failed(format!("timed out after {} seconds", timeout.as_secs()))
    }

    /// Returns true if the process exited with status zero.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Diagnostic text, or the fallback literal.
    #[must_use]
    pub fn diagnostic_text(&self) -> &str {
        self.diagnostic.as_deref().unwrap_or(NO_DIAGNOSTIC)
    }
}

/// Trait for invoking external executables.
///
/// Workflows depend on this seam rather than on the operating system, so
/// the whole orchestration is testable without the external tools
/// installed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs `program` with `args`, waiting up to `timeout`.
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> RunOutcome;
}

/// Production runner backed by [`tokio::process`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl SystemProcessRunner {
    /// Creates a new system process runner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> RunOutcome {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Keep console windows from flashing up on Windows hosts.
        #[cfg(windows)]
        command.creation_flags(0x0800_0000); // CREATE_NO_WINDOW

        debug!(program, ?args, timeout_s = timeout.as_secs(), "spawning external process");

        match tokio::time::timeout(timeout, command.output()).await {
            Err(_) => RunOutcome::timed_out(timeout),
            Ok(Err(err)) => RunOutcome::failed(format!("failed to launch '{program}': {err}")),
            Ok(Ok(output)) => {
                if output.status.success() {
                    RunOutcome::ok()
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                    if stderr.is_empty() {
                        RunOutcome::failed(NO_DIAGNOSTIC)
                    } else {
                        RunOutcome::failed(stderr)
                    }
                }
            }
        }
    }
}
