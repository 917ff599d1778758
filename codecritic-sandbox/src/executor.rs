//! Sandbox executor: runs a program under wall, memory, and network limits.
//!
//! Two back-ends share one observable contract. The container back-end
//! isolates with Docker (no network, capped memory and CPU, read-only
//! filesystem outside /tmp). The subprocess back-end is a plain `python3 -I`
//! child bounded by the wall timeout; it refuses sources whose imports hit
//! the deny-set. Neither back-end is allowed to propagate a failure as an
//! exception to the pipeline.

use crate::{SandboxError, SandboxResult};
use lazy_static::lazy_static;
use regex::Regex;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tracing::{debug, warn};

lazy_static! {
    static ref IMPORT_LINE: Regex =
        Regex::new(r"(?m)^\s*(?:import|from)\s+([A-Za-z_][A-Za-z0-9_.]*)").unwrap();
}

/// Module roots the weak back-end refuses: shell/process access, sockets
/// and networking, thread primitives, file deletion. Best-effort, not a
/// security boundary.
const DENIED_MODULES: [&str; 18] = [
    "os",
    "subprocess",
    "socket",
    "socketserver",
    "http",
    "urllib",
    "requests",
    "ftplib",
    "smtplib",
    "telnetlib",
    "asyncio",
    "threading",
    "_thread",
    "multiprocessing",
    "concurrent",
    "shutil",
    "ctypes",
    "signal",
];

/// Returns the first denied module imported by `source`, if any.
pub fn scan_denied_imports(source: &str) -> Option<String> {
    for capture in IMPORT_LINE.captures_iter(source) {
        let module = &capture[1];
        let root = module.split('.').next().unwrap_or(module);
        if DENIED_MODULES.contains(&root) {
            return Some(root.to_string());
        }
    }
    None
}

/// Scans stdout from the last line upward and returns the first line that
/// parses as JSON, tolerating arbitrary interleaved prints from user code.
pub fn parse_last_json(stdout: &str) -> Option<serde_json::Value> {
    stdout
        .lines()
        .rev()
        .filter(|line| !line.trim().is_empty())
        .find_map(|line| serde_json::from_str(line.trim()).ok())
}

/// Isolation back-end selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxBackend {
    /// Docker container: strongest isolation.
    Container,
    /// Plain subprocess with deny-set filtering: weak isolation.
    Subprocess,
    /// Dynamic analysis skipped entirely.
    Disabled,
}

impl std::str::FromStr for SandboxBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "container" => Ok(SandboxBackend::Container),
            "subprocess" => Ok(SandboxBackend::Subprocess),
            "disabled" => Ok(SandboxBackend::Disabled),
            _ => Err(format!(
                "Invalid sandbox backend: '{s}'. Valid options: container, subprocess, disabled"
            )),
        }
    }
}

/// Sandbox configuration.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub backend: SandboxBackend,
    pub wall_timeout: Duration,
    pub memory_bytes: u64,
    pub network: bool,
    /// Interpreter image for the container back-end.
    pub container_image: String,
    /// Interpreter binary for the subprocess back-end.
    pub python_binary: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            backend: SandboxBackend::Subprocess,
            wall_timeout: Duration::from_secs(10),
            memory_bytes: 128 * 1024 * 1024,
            network: false,
            container_image: "python:3.11-alpine".to_string(),
            python_binary: "python3".to_string(),
        }
    }
}

/// Outcome of one sandbox run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Set when the run was refused (deny-set hit, back-end disabled).
    pub skipped: Option<String>,
}

pub struct SandboxExecutor {
    config: SandboxConfig,
}

impl SandboxExecutor {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Executes `source` in a fresh isolated process. Timeouts and refusals
    /// come back as structured outcomes, never as errors.
    pub async fn run(&self, source: &str, stdin: Option<&str>) -> SandboxResult<ExecutionOutcome> {
        match self.config.backend {
            SandboxBackend::Disabled => Ok(ExecutionOutcome {
                skipped: Some("sandbox disabled by configuration".to_string()),
                ..ExecutionOutcome::default()
            }),
            SandboxBackend::Container => {
                if self.container_available().await {
                    self.run_container(source, stdin).await
                } else {
                    warn!("docker unavailable; falling back to subprocess back-end");
                    self.run_subprocess(source, stdin).await
                }
            }
            SandboxBackend::Subprocess => self.run_subprocess(source, stdin).await,
        }
    }

    async fn container_available(&self) -> bool {
        let probe = TokioCommand::new("docker")
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        matches!(
            tokio::time::timeout(Duration::from_secs(3), probe).await,
            Ok(Ok(status)) if status.success()
        )
    }

    async fn run_container(
        &self,
        source: &str,
        stdin: Option<&str>,
    ) -> SandboxResult<ExecutionOutcome> {
        // The program arrives on the container's stdin (`python -I -`), so
        // user-supplied stdin is unsupported on this back-end; none of the
        // harnesses use it.
        if stdin.is_some() {
            debug!("container back-end ignores user stdin");
        }
        let memory_mb = self.config.memory_bytes / (1024 * 1024);
        let mut cmd = TokioCommand::new("docker");
        cmd.arg("run")
            .arg("--rm")
            .arg("-i")
            .args(["--memory", &format!("{memory_mb}m")])
            .args(["--cpus", "0.5"])
            .arg("--read-only")
            .args(["--tmpfs", "/tmp"]);
        if !self.config.network {
            cmd.args(["--network", "none"]);
        }
        cmd.arg(&self.config.container_image)
            .args(["python", "-I", "-"]);
        self.spawn_bounded(cmd, Some(source)).await
    }

    async fn run_subprocess(
        &self,
        source: &str,
        stdin: Option<&str>,
    ) -> SandboxResult<ExecutionOutcome> {
        if let Some(module) = scan_denied_imports(source) {
            debug!(module, "refusing source in weak sandbox");
            return Ok(ExecutionOutcome {
                skipped: Some(format!(
                    "weak sandbox refuses import of denied module `{module}`"
                )),
                ..ExecutionOutcome::default()
            });
        }

        let dir = tempfile::tempdir()?;
        let program = dir.path().join("candidate.py");
        std::fs::write(&program, source)?;

        let mut cmd = TokioCommand::new(&self.config.python_binary);
        cmd.arg("-I").arg(&program).current_dir(dir.path());
        self.spawn_bounded(cmd, stdin).await
    }

    async fn spawn_bounded(
        &self,
        mut cmd: TokioCommand,
        stdin: Option<&str>,
    ) -> SandboxResult<ExecutionOutcome> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = cmd
            .spawn()
            .map_err(|e| SandboxError::BackendUnavailable(e.to_string()))?;

        if let Some(input) = stdin {
            if let Some(mut handle) = child.stdin.take() {
                let _ = handle.write_all(input.as_bytes()).await;
            }
        } else {
            drop(child.stdin.take());
        }

        match tokio::time::timeout(self.config.wall_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ExecutionOutcome {
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                exit_code: output.status.code(),
                timed_out: false,
                skipped: None,
            }),
            Ok(Err(e)) => Err(SandboxError::Io(e)),
            Err(_) => {
                // kill_on_drop reaped the child when the wait future was
                // dropped by the timeout.
                debug!("sandbox wall timeout hit");
                Ok(ExecutionOutcome {
                    timed_out: true,
                    ..ExecutionOutcome::default()
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deny_scan_catches_direct_import() {
        assert_eq!(scan_denied_imports("import os\n"), Some("os".to_string()));
        assert_eq!(
            scan_denied_imports("import subprocess as sp\n"),
            Some("subprocess".to_string())
        );
    }

    #[test]
    fn test_deny_scan_catches_from_import_and_dotted() {
        assert_eq!(
            scan_denied_imports("from os.path import join\n"),
            Some("os".to_string())
        );
        assert_eq!(
            scan_denied_imports("from concurrent.futures import ThreadPoolExecutor\n"),
            Some("concurrent".to_string())
        );
    }

    #[test]
    fn test_deny_scan_allows_safe_modules() {
        assert_eq!(scan_denied_imports("import json\nimport math\n"), None);
        assert_eq!(scan_denied_imports("from collections import Counter\n"), None);
    }

    #[test]
    fn test_deny_scan_ignores_mentions_in_strings_mid_line() {
        // Only line-leading import statements count.
        assert_eq!(scan_denied_imports("x = \"you could import os here\"\n"), None);
    }

    #[test]
    fn test_parse_last_json_takes_final_json_line() {
        let stdout = "debug print\n{\"partial\": tru\n{\"ok\": true}\n";
        let value = parse_last_json(stdout).unwrap();
        assert_eq!(value["ok"], serde_json::json!(true));
    }

    #[test]
    fn test_parse_last_json_skips_trailing_noise() {
        let stdout = "{\"ok\": false}\nnot json at all\n\n";
        let value = parse_last_json(stdout).unwrap();
        assert_eq!(value["ok"], serde_json::json!(false));
    }

    #[test]
    fn test_parse_last_json_none_without_json() {
        assert!(parse_last_json("hello\nworld\n").is_none());
        assert!(parse_last_json("").is_none());
    }

    #[tokio::test]
    async fn test_disabled_backend_skips() {
        let executor = SandboxExecutor::new(SandboxConfig {
            backend: SandboxBackend::Disabled,
            ..SandboxConfig::default()
        });
        let outcome = executor.run("print('hi')", None).await.unwrap();
        assert!(outcome.skipped.is_some());
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn test_subprocess_refuses_denied_source() {
        let executor = SandboxExecutor::new(SandboxConfig::default());
        let outcome = executor.run("import socket\n", None).await.unwrap();
        assert!(outcome.skipped.unwrap().contains("socket"));
    }

    async fn python_available(binary: &str) -> bool {
        TokioCommand::new(binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_subprocess_runs_and_captures_stdout() {
        if !python_available("python3").await {
            return;
        }
        let executor = SandboxExecutor::new(SandboxConfig::default());
        let outcome = executor
            .run("print(\"hello\")\nprint(40 + 2)\n", None)
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.stdout.contains("hello"));
        assert!(outcome.stdout.contains("42"));
    }

    #[tokio::test]
    async fn test_wall_timeout_sets_flag() {
        if !python_available("python3").await {
            return;
        }
        let executor = SandboxExecutor::new(SandboxConfig {
            wall_timeout: Duration::from_millis(500),
            ..SandboxConfig::default()
        });
        let outcome = executor
            .run("while True:\n    pass\n", None)
            .await
            .unwrap();
        assert!(outcome.timed_out);
    }
}
