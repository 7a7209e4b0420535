//! Codex adapter.
//!
//! Codex ships its own MCP server, so the default mode is a passthrough:
//! [`run_passthrough`] hands this process's stdio to `codex mcp-server` and
//! forwards its exit code. [`CodexExecAdapter`] instead serves a single
//! `codex_exec` operation backed by `codex exec --json`.

use async_trait::async_trait;
use prism_core::{
    ProcessRunner, RunOptions, ServerInfo, ToolDef, ToolError, ToolOutput, ToolResult, ToolServer,
    UpstreamReply, parse_arguments,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};

/// Environment variable marking a child started by the passthrough.
pub const WRAPPER_ENV: &str = "PRISM_CODEX_WRAPPER";

/// Default timeout for `codex exec`; agentic runs take minutes.
pub const EXEC_TIMEOUT_MS: u64 = 600_000;

/// Run `codex mcp-server` with this process's stdin, stdout and stderr.
///
/// Returns the child's exit code, or 0 when it was terminated by a signal.
/// SIGINT and SIGTERM received by this process are forwarded to the child,
/// which decides when to exit.
///
/// # Errors
/// `ToolError::Spawn` if the binary cannot be started.
pub async fn run_passthrough(binary: &str) -> ToolResult<i32> {
    let spawn_error = |e: std::io::Error| ToolError::Spawn {
        command: binary.to_string(),
        message: e.to_string(),
    };

    let mut signals = ForwardedSignals::install().map_err(spawn_error)?;

    let mut child = Command::new(binary)
        .arg("mcp-server")
        .env(WRAPPER_ENV, "true")
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(spawn_error)?;

    tracing::info!("Started {} mcp-server", binary);

    let status = signals
        .wait_forwarding(&mut child)
        .await
        .map_err(spawn_error)?;
    Ok(status.code().unwrap_or(0))
}

/// Shutdown signals relayed to the passthrough child.
#[cfg(unix)]
struct ForwardedSignals {
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ForwardedSignals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    async fn wait_forwarding(&mut self, child: &mut Child) -> std::io::Result<ExitStatus> {
        loop {
            tokio::select! {
                status = child.wait() => return status,
                Some(()) = self.terminate.recv() => forward_signal(child, libc::SIGTERM, "SIGTERM"),
                Some(()) = self.interrupt.recv() => forward_signal(child, libc::SIGINT, "SIGINT"),
            }
        }
    }
}

#[cfg(unix)]
fn forward_signal(child: &Child, signum: libc::c_int, name: &str) {
    let Some(pid) = child.id() else {
        return;
    };
    tracing::info!("Received {}, forwarding to codex (pid {})", name, pid);
    // SAFETY: kill() has no memory-safety preconditions; pid is our own child.
    let rc = unsafe { libc::kill(pid as libc::pid_t, signum) };
    if rc != 0 {
        tracing::warn!(
            "Failed to forward {} to codex: {}",
            name,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
struct ForwardedSignals;

#[cfg(not(unix))]
impl ForwardedSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn wait_forwarding(&mut self, child: &mut Child) -> std::io::Result<ExitStatus> {
        tokio::select! {
            status = child.wait() => status,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received ctrl-c, stopping codex");
                child.start_kill()?;
                child.wait().await
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExecArgs {
    prompt: String,
    model: Option<String>,
    working_dir: Option<String>,
    timeout_ms: Option<u64>,
}

/// Serves `codex_exec` on top of `codex exec --json`.
#[derive(Debug, Clone)]
pub struct CodexExecAdapter {
    binary: String,
    timeout_ms: u64,
    runner: ProcessRunner,
}

impl CodexExecAdapter {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout_ms: EXEC_TIMEOUT_MS,
            runner: ProcessRunner,
        }
    }

    /// Set the default timeout in milliseconds (builder pattern).
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Arguments for `codex exec`; the prompt itself goes on stdin.
    pub fn build_args(model: Option<&str>, working_dir: Option<&str>) -> Vec<String> {
        let mut args = vec![
            "exec".to_string(),
            "--json".to_string(),
            "--skip-git-repo-check".to_string(),
        ];
        if let Some(model) = model.filter(|m| !m.is_empty()) {
            args.push("-m".to_string());
            args.push(model.to_string());
        }
        if let Some(dir) = working_dir.filter(|d| !d.is_empty()) {
            args.push("-C".to_string());
            args.push(dir.to_string());
        }
        args.push("-".to_string());
        args
    }

    async fn exec(&self, args: ExecArgs) -> ToolResult<String> {
        let cli_args = Self::build_args(args.model.as_deref(), args.working_dir.as_deref());
        let options = RunOptions::default()
            .with_timeout_ms(args.timeout_ms.unwrap_or(self.timeout_ms))
            .with_input(args.prompt);

        let output = self.runner.run(&self.binary, &cli_args, options).await?;
        if !output.success() {
            let stderr = output.stderr.trim();
            return Err(ToolError::CommandFailed(if stderr.is_empty() {
                match output.exit_code {
                    Some(code) => format!("Codex exited with code {}", code),
                    None => "Codex was terminated by a signal".to_string(),
                }
            } else {
                stderr.to_string()
            }));
        }

        Ok(UpstreamReply::decode_event_log(&output.stdout).into_text())
    }
}

#[async_trait]
impl ToolServer for CodexExecAdapter {
    fn info(&self) -> ServerInfo {
        ServerInfo::new("prism-codex")
    }

    fn tools(&self) -> Vec<ToolDef> {
        vec![ToolDef::new(
            "codex_exec",
            "Run a non-interactive Codex task and return its final answer. Good for delegated coding, refactoring, and repository questions.",
            json!({
                "type": "object",
                "properties": {
                    "prompt": { "type": "string", "description": "Task for Codex" },
                    "model": { "type": "string", "description": "Codex model to use" },
                    "working_dir": { "type": "string", "description": "Directory Codex runs in" },
                    "timeout_ms": { "type": "number", "description": "Timeout in milliseconds (default: 600000)" }
                },
                "required": ["prompt"]
            }),
        )]
    }

    async fn call(&self, name: &str, arguments: Value) -> Option<ToolOutput> {
        if name != "codex_exec" {
            return None;
        }
        let result = match parse_arguments(arguments) {
            Ok(args) => self.exec(args).await,
            Err(e) => Err(e),
        };
        Some(ToolOutput::from_result(result))
    }
}
