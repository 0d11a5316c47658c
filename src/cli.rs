//! Command-line front-end.
//!
//! The CLI does not run the pipeline itself; it talks to the local daemon
//! over HTTP (starting it on demand) and keeps only the thin parts local:
//! printing, the confirmation prompt, command execution and the audit
//! records for the execute/reject decision.

use crate::audit::AuditLogger;
use crate::config::Config;
use crate::pipeline::{SuggestionRequest, SuggestionResponse};
use crate::safety::Safety;
use anyhow::Result;
use serde_json::Value;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;

const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const STARTUP_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const SUGGEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Cli {
    config: Config,
    safety: Safety,
    audit: AuditLogger,
    client: reqwest::Client,
}

impl Cli {
    pub fn new(config: Config) -> Self {
        let audit = AuditLogger::new(config.expanded_log_path());
        Self {
            config,
            safety: Safety::new(),
            audit,
            client: reqwest::Client::new(),
        }
    }

    /// Get a suggestion and print it: command on stdout (for shell
    /// integration), explanation and warnings on stderr.
    pub async fn suggest(&self, goal: &str) -> Result<i32> {
        let Some(command) = self.call_daemon(goal).await else {
            return Ok(1);
        };

        println!("{command}");
        eprintln!("# Suggested command for: {goal}");
        for warning in self.safety.safety_warnings(&command) {
            eprintln!("{warning}");
        }
        Ok(0)
    }

    /// Get a suggestion, confirm, execute, and record the decision.
    pub async fn run(&self, goal: &str) -> Result<i32> {
        let Some(command) = self.call_daemon(goal).await else {
            return Ok(1);
        };

        println!("Goal: {goal}");
        println!("Suggested command: {command}");
        for warning in self.safety.safety_warnings(&command) {
            println!("{warning}");
        }

        let confirmed = if self.safety.requires_confirmation(&command) {
            prompt_confirm("⚠️  This command requires confirmation. Execute?", false)?
        } else {
            prompt_confirm("Execute this command?", true)?
        };

        let cwd = current_dir_string();
        if !confirmed {
            self.audit.log_suggestion(
                goal,
                &command,
                &cwd,
                &self.config.provider,
                Some(false),
                None,
                Some(self.safety.risk_score(&command)),
            );
            println!("Command not executed");
            return Ok(0);
        }

        println!("Executing: {command}");
        let status = Command::new("sh").arg("-c").arg(&command).status()?;
        let exit_code = status.code().unwrap_or(1);

        self.audit.log_suggestion(
            goal,
            &command,
            &cwd,
            &self.config.provider,
            Some(true),
            Some(exit_code),
            Some(self.safety.risk_score(&command)),
        );

        Ok(exit_code)
    }

    /// Explain a command, or the most recently suggested one with `--last`.
    pub fn explain(&self, command: Option<&str>, last: bool) -> Result<i32> {
        let command = if last {
            let entries = self.audit.recent_entries(1);
            let Some(entry) = entries.into_iter().next() else {
                eprintln!("No recent commands found");
                return Ok(1);
            };
            match entry.command {
                Some(command) => command,
                None => {
                    eprintln!("No command found in last entry");
                    return Ok(1);
                }
            }
        } else {
            match command {
                Some(command) => command.to_string(),
                None => {
                    eprintln!("Please provide a command to explain or use --last");
                    return Ok(1);
                }
            }
        };

        println!("Command: {command}");
        println!("Risk score: {:.2}", self.safety.risk_score(&command));
        for warning in self.safety.safety_warnings(&command) {
            println!("{warning}");
        }

        let mut parts = command.split_whitespace();
        if let Some(main) = parts.next() {
            println!("Main command: {main}");
            let args: Vec<&str> = parts.collect();
            if !args.is_empty() {
                println!("Arguments: {}", args.join(" "));
            }
        }
        Ok(0)
    }

    /// Daemon health, configuration summary and audit statistics.
    pub async fn status(&self) -> Result<i32> {
        match self.probe_health(HEALTH_PROBE_TIMEOUT).await {
            Some(provider) => {
                println!("✅ Daemon is running");
                println!("Provider: {provider}");
            }
            None => println!("❌ Daemon is not running"),
        }

        println!("\nConfiguration:");
        println!("  Provider: {}", self.config.provider);
        println!("  Server: {}", self.config.server_url());
        println!("  Log path: {}", self.config.expanded_log_path().display());

        let stats = self.audit.stats();
        println!("\nStatistics:");
        println!("  Total entries: {}", stats.total_entries);
        println!("  Approval rate: {:.1}%", stats.approval_rate * 100.0);
        println!("  Log size: {} bytes", stats.file_size_bytes);
        Ok(0)
    }

    /// Probe `/health`; returns the reported provider name when up.
    async fn probe_health(&self, timeout: Duration) -> Option<String> {
        let response = self
            .client
            .get(format!("{}/health", self.config.server_url()))
            .timeout(timeout)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        let body: Value = response.json().await.ok()?;
        Some(
            body.get("provider")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
        )
    }

    /// Make sure the daemon is up, spawning it detached when it is not.
    async fn ensure_daemon_running(&self) -> bool {
        if self.probe_health(HEALTH_PROBE_TIMEOUT).await.is_some() {
            return true;
        }

        let Ok(exe) = env::current_exe() else {
            return false;
        };
        debug!("Starting daemon from {}", exe.display());
        let spawned = Command::new(exe)
            .arg("daemon")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if spawned.is_err() {
            return false;
        }

        tokio::time::sleep(Duration::from_secs(2)).await;
        self.probe_health(STARTUP_PROBE_TIMEOUT).await.is_some()
    }

    /// Ask the daemon for a suggestion; failures are printed, not returned.
    async fn call_daemon(&self, goal: &str) -> Option<String> {
        if !self.ensure_daemon_running().await {
            eprintln!("Error: Could not start the suggestion daemon");
            return None;
        }

        let request = SuggestionRequest {
            cwd: Some(current_dir_string()),
            shell: Some(shell_name()),
            ..SuggestionRequest::new(goal)
        };

        let response = self
            .client
            .post(format!("{}/suggest", self.config.server_url()))
            .timeout(SUGGEST_TIMEOUT)
            .json(&request)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                eprintln!("Error: Request timed out");
                return None;
            }
            Err(err) => {
                eprintln!("Error: Could not connect to daemon: {err}");
                return None;
            }
        };

        if response.status().is_success() {
            let data: SuggestionResponse = response.json().await.ok()?;
            Some(data.command)
        } else {
            let detail = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| {
                    body.get("detail")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| "Unknown error".to_string());
            eprintln!("Error: {detail}");
            None
        }
    }
}

fn current_dir_string() -> String {
    env::current_dir()
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_else(|_| ".".to_string())
}

fn shell_name() -> String {
    env::var("SHELL")
        .ok()
        .and_then(|shell| {
            Path::new(&shell)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Yes/no prompt on stdin; empty input takes the default.
fn prompt_confirm(question: &str, default_yes: bool) -> Result<bool> {
    let hint = if default_yes { "[Y/n]" } else { "[y/N]" };
    print!("{question} {hint} ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let answer = line.trim().to_lowercase();

    Ok(match answer.as_str() {
        "" => default_yes,
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default_yes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_name_is_basename() {
        // Whatever $SHELL holds, the fact is its final path segment
        let name = shell_name();
        assert!(!name.contains('/'));
        assert!(!name.is_empty());
    }

    #[test]
    fn test_current_dir_string_non_empty() {
        assert!(!current_dir_string().is_empty());
    }
}
