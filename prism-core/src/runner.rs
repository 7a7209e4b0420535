//! Subprocess runner used by the CLI-backed adapters.
//!
//! Spawns a command, feeds optional stdin, collects stdout/stderr and the exit
//! code, and kills the child if it outlives its timeout.

use crate::error::{ToolError, ToolResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Default subprocess timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;

/// Options for a single [`ProcessRunner::run`] call.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Timeout in milliseconds.
    pub timeout_ms: u64,

    /// Environment overrides layered over the current process environment.
    pub env: HashMap<String, String>,

    /// Working directory for the child.
    pub cwd: Option<PathBuf>,

    /// Text written to the child's stdin before it is closed.
    pub input: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            env: HashMap::new(),
            cwd: None,
            input: None,
        }
    }
}

impl RunOptions {
    /// Set the timeout in milliseconds (builder pattern).
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Add an environment override (builder pattern).
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory (builder pattern).
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set stdin input (builder pattern).
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl RunOutput {
    /// Whether the child exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Stateless subprocess runner.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Run `command` with `args` and collect its output.
    ///
    /// # Errors
    /// - `ToolError::Spawn` if the command cannot be started
    /// - `ToolError::Timeout` if it does not exit within `options.timeout_ms`
    ///
    /// A non-zero exit code is returned in [`RunOutput`], not as an error.
    pub async fn run(
        &self,
        command: &str,
        args: &[String],
        options: RunOptions,
    ) -> ToolResult<RunOutput> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(&options.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }

        tracing::debug!("Spawning {}", command_line(command, args));

        let mut child = cmd.spawn().map_err(|e| ToolError::Spawn {
            command: command.to_string(),
            message: e.to_string(),
        })?;

        // Feed stdin from its own task so a child that fills its stdout pipe
        // before reading input cannot deadlock us.
        if let Some(mut stdin) = child.stdin.take() {
            if let Some(input) = options.input {
                tokio::spawn(async move {
                    if let Err(e) = stdin.write_all(input.as_bytes()).await {
                        tracing::debug!("Failed to write to child stdin: {}", e);
                    }
                    drop(stdin);
                });
            } else {
                drop(stdin);
            }
        }

        // Dropping the wait future drops the child, and kill_on_drop kills it.
        let output = timeout(
            Duration::from_millis(options.timeout_ms),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| ToolError::Timeout {
            command_line: command_line(command, args),
            timeout_ms: options.timeout_ms,
        })?
        .map_err(|e| ToolError::Spawn {
            command: command.to_string(),
            message: e.to_string(),
        })?;

        Ok(RunOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }

    /// Check whether `command` can be executed.
    ///
    /// Explicit paths are checked on disk; bare names are looked up with
    /// `which` (`where` on Windows). This does not check authentication.
    pub async fn is_available(command: &str) -> bool {
        if command.contains(std::path::MAIN_SEPARATOR) || command.contains('/') {
            return Path::new(command).is_file();
        }

        #[cfg(unix)]
        let check_cmd = "which";
        #[cfg(windows)]
        let check_cmd = "where";

        Command::new(check_cmd)
            .arg(command)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

/// Render a command line for diagnostics.
pub fn command_line(command: &str, args: &[String]) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{} {}", command, args.join(" "))
    }
}
