//! Shell execution tool

use crate::base::{require_str, Result, Tool, ToolResult};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use toolpilot_core::config::ExecToolConfig;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

const MAX_OUTPUT_LEN: usize = 10000;

/// Shell execution tool
pub struct ExecTool {
    timeout_secs: u64,
    working_dir: Option<PathBuf>,
    deny_patterns: Vec<Regex>,
}

impl ExecTool {
    /// Create a new exec tool with default settings
    pub fn new() -> Self {
        Self::with_config(60, None)
    }

    /// Create with custom settings
    pub fn with_config(timeout_secs: u64, working_dir: Option<PathBuf>) -> Self {
        Self {
            timeout_secs,
            working_dir,
            deny_patterns: Self::default_deny_patterns(),
        }
    }

    pub fn from_config(config: &ExecToolConfig) -> Self {
        Self::with_config(
            config.timeout_secs,
            config
                .working_dir
                .as_deref()
                .map(toolpilot_core::utils::expand_tilde),
        )
    }

    /// Default dangerous command patterns
    fn default_deny_patterns() -> Vec<Regex> {
        vec![
            r"\brm\s+-[rf]{1,2}\b",            // rm -r, rm -rf
            r"\bdel\s+/[fq]\b",                // del /f, del /q
            r"\brmdir\s+/s\b",                 // rmdir /s
            r"\b(format|mkfs|diskpart)\b",     // disk operations
            r"\bdd\s+if=",                     // dd
            r">\s*/dev/sd",                    // write to disk
            r"\b(shutdown|reboot|poweroff)\b", // system power
            r":\(\)\s*\{.*\};\s*:",            // fork bomb
        ]
        .into_iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    }

    /// Guard command against dangerous patterns
    fn guard_command(&self, command: &str) -> std::result::Result<(), String> {
        let lower = command.trim().to_lowercase();
        if self.deny_patterns.iter().any(|p| p.is_match(&lower)) {
            return Err("Command blocked by safety guard (dangerous pattern detected)".to_string());
        }
        Ok(())
    }

    /// Run the command and collect its output
    async fn execute_command(&self, command: &str, cwd: &Path) -> ToolResult {
        let (shell, shell_arg) = if cfg!(target_os = "windows") {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        let child = match Command::new(shell)
            .arg(shell_arg)
            .arg(command)
            .current_dir(cwd)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return ToolResult::fail(format!("Failed to spawn process: {}", e)),
        };

        let output = match timeout(
            Duration::from_secs(self.timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => return ToolResult::fail(format!("Failed to wait for process: {}", e)),
            Err(_) => {
                warn!("Command timed out after {}s: {}", self.timeout_secs, command);
                return ToolResult::fail(format!(
                    "Command timed out after {} seconds",
                    self.timeout_secs
                ));
            }
        };

        let mut result_parts = Vec::new();
        if !output.stdout.is_empty() {
            result_parts.push(String::from_utf8_lossy(&output.stdout).to_string());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            result_parts.push(format!("STDERR:\n{}", stderr));
        }

        let mut text = if result_parts.is_empty() {
            "(no output)".to_string()
        } else {
            result_parts.join("\n")
        };

        let total = text.chars().count();
        if total > MAX_OUTPUT_LEN {
            let truncated = text.chars().take(MAX_OUTPUT_LEN).collect::<String>();
            text = format!(
                "{}\n... (truncated, {} more chars)",
                truncated,
                total - MAX_OUTPUT_LEN
            );
        }

        if output.status.success() {
            ToolResult::ok(text)
        } else {
            ToolResult::fail(format!(
                "Exit code: {}",
                output.status.code().unwrap_or(-1)
            ))
            .with_output(text)
        }
    }
}

impl Default for ExecTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ExecTool {
    fn name(&self) -> &str {
        "exec"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its output. Use with caution."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "working_dir": {
                    "type": "string",
                    "description": "Optional working directory for the command"
                }
            },
            "required": ["command"]
        })
    }

    fn icon(&self) -> Option<&str> {
        Some("terminal")
    }

    fn label(&self) -> Option<&str> {
        Some("Shell")
    }

    fn display_command(&self, args: &Value) -> Option<String> {
        args.get("command")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let command = require_str(&params, "command")?;

        let working_dir = params
            .get("working_dir")
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
            .or_else(|| self.working_dir.clone())
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        if let Err(err) = self.guard_command(command) {
            warn!("Blocked shell command: {}", command);
            return Ok(ToolResult::fail(err));
        }

        info!("Executing shell command in {}: {}", working_dir.display(), command);
        Ok(self.execute_command(command, &working_dir).await)
    }
}
