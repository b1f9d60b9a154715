//! Bounded external command execution.
//!
//! Every subprocess invocation is wrapped in a timeout so a wedged tool
//! suspends only the finding that invoked it, never the whole session. A
//! timed-out process is killed rather than leaked.

use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, warn};
use serde_json::{json, Value};
use tokio::runtime::Runtime;

use crate::constants::{MAX_COMMAND_OUTPUT_CHARS, MAX_OUTPUT_LINES};

/// Outcome of one bounded command invocation. Expected failures (missing
/// binary, non-zero exit, timeout) are data, not errors.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub command: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Stdout split into lines, capped for storage in a finding.
    pub fn stdout_lines(&self) -> Vec<String> {
        self.stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .take(MAX_OUTPUT_LINES)
            .map(String::from)
            .collect()
    }

    /// Structured representation for embedding in a finding payload.
    pub fn as_finding(&self) -> Value {
        if self.timed_out {
            return json!({
                "command": self.command,
                "error": "command timed out",
                "timed_out": true,
            });
        }
        json!({
            "command": self.command,
            "exit_code": self.exit_code,
            "output": self.stdout_lines(),
            "stderr": if self.stderr.is_empty() { Value::Null } else { Value::from(self.stderr.clone()) },
        })
    }
}

pub struct CommandRunner {
    runtime: Runtime,
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create command runtime")?;
        Ok(Self { runtime, timeout })
    }

    /// Run a command to completion, bounded by the configured timeout.
    pub fn run(&self, program: &str, args: &[&str]) -> CommandOutput {
        let rendered = if args.is_empty() {
            program.to_string()
        } else {
            format!("{} {}", program, args.join(" "))
        };
        debug!("Running command: {}", rendered);

        let outcome = self.runtime.block_on(async {
            let child = tokio::process::Command::new(program)
                .args(args)
                .kill_on_drop(true)
                .output();
            tokio::time::timeout(self.timeout, child).await
        });

        match outcome {
            Ok(Ok(output)) => CommandOutput {
                command: rendered,
                success: output.status.success(),
                exit_code: output.status.code(),
                stdout: sanitize_output(&String::from_utf8_lossy(&output.stdout)),
                stderr: sanitize_output(&String::from_utf8_lossy(&output.stderr)),
                timed_out: false,
            },
            Ok(Err(e)) => {
                debug!("Command {} failed to start: {}", rendered, e);
                CommandOutput {
                    command: rendered,
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                    timed_out: false,
                }
            }
            Err(_) => {
                // kill_on_drop reaps the child when the future is dropped
                warn!(
                    "Command {} exceeded the {}s timeout and was killed",
                    rendered,
                    self.timeout.as_secs()
                );
                CommandOutput {
                    command: rendered,
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: "command timed out".to_string(),
                    timed_out: true,
                }
            }
        }
    }
}

/// Sanitize command output for JSON storage: strip NUL bytes and truncate.
fn sanitize_output(data: &str) -> String {
    let cleaned: String = data.chars().filter(|c| *c != '\0').collect();
    if cleaned.chars().count() > MAX_COMMAND_OUTPUT_CHARS {
        let truncated: String = cleaned.chars().take(MAX_COMMAND_OUTPUT_CHARS).collect();
        format!("{}\n... (truncated)", truncated)
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(secs: u64) -> CommandRunner {
        CommandRunner::new(Duration::from_secs(secs)).unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captures_stdout() {
        let output = runner(5).run("echo", &["hello"]);
        assert!(output.success);
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout.trim(), "hello");
        assert!(!output.timed_out);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_nonzero_exit_is_data() {
        let output = runner(5).run("sh", &["-c", "exit 3"]);
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.timed_out);
    }

    #[test]
    fn test_missing_binary_is_data() {
        let output = runner(5).run("definitely-not-a-real-tool-xyz", &[]);
        assert!(!output.success);
        assert!(!output.timed_out);
        assert!(!output.stderr.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_command() {
        let output = runner(1).run("sleep", &["30"]);
        assert!(output.timed_out);
        assert!(!output.success);
        assert_eq!(output.stderr, "command timed out");
    }

    #[test]
    fn test_sanitize_strips_nul_and_truncates() {
        let dirty = format!("a\0b{}", "x".repeat(MAX_COMMAND_OUTPUT_CHARS));
        let clean = sanitize_output(&dirty);
        assert!(!clean.contains('\0'));
        assert!(clean.ends_with("... (truncated)"));
    }

    #[cfg(unix)]
    #[test]
    fn test_stdout_lines_capped() {
        let script = format!("for i in $(seq 1 {}); do echo line$i; done", MAX_OUTPUT_LINES + 50);
        let output = runner(5).run("sh", &["-c", &script]);
        assert_eq!(output.stdout_lines().len(), MAX_OUTPUT_LINES);
    }

    #[cfg(unix)]
    #[test]
    fn test_as_finding_shapes() {
        let ok = runner(5).run("echo", &["hi"]).as_finding();
        assert_eq!(ok["exit_code"], 0);

        let timed = runner(1).run("sleep", &["30"]).as_finding();
        assert_eq!(timed["timed_out"], true);
    }
}
