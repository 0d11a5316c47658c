//! Situational context gathered fresh for every suggestion request.
//!
//! Each fact is collected independently and failure means the fact is
//! absent, never an error. Directory state changes between calls, so
//! nothing here is cached.

use serde_json::{Map, Value, json};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Fact name to value, as handed to the model backend.
pub type Context = Map<String, Value>;

const GIT_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Collects contextual information about the working directory.
pub struct ContextCollector {
    max_files: usize,
    max_git_output: usize,
}

impl Default for ContextCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextCollector {
    pub fn new() -> Self {
        Self {
            max_files: 200,
            max_git_output: 1500,
        }
    }

    pub fn with_limits(max_files: usize, max_git_output: usize) -> Self {
        Self {
            max_files,
            max_git_output,
        }
    }

    /// Collect facts from `cwd`, defaulting to the process working directory.
    pub async fn collect(&self, cwd: Option<&Path>) -> Context {
        let cwd = match cwd {
            Some(path) => path.to_path_buf(),
            None => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        };

        let mut context = Context::new();
        context.insert("cwd".to_string(), json!(cwd.to_string_lossy()));
        context.insert("shell".to_string(), json!(self.shell_name()));

        if let Some(git) = self.git_status(&cwd).await {
            context.insert("git".to_string(), json!(git));
        }

        let files = self.file_listing(&cwd);
        if !files.is_empty() {
            context.insert("files_sample".to_string(), json!(files));
        }

        context.insert("os".to_string(), json!(self.os_info()));
        context
    }

    /// Final path segment of `$SHELL`, or "unknown".
    fn shell_name(&self) -> String {
        env::var("SHELL")
            .ok()
            .and_then(|shell| {
                Path::new(&shell)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Branch and porcelain status, bounded in time and size.
    ///
    /// Missing git, a non-repository directory or a timeout all yield `None`.
    async fn git_status(&self, cwd: &Path) -> Option<String> {
        let run = Command::new("git")
            .args(["status", "--porcelain", "-b"])
            .current_dir(cwd)
            .kill_on_drop(true)
            .output();

        let output = match timeout(GIT_STATUS_TIMEOUT, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                debug!("git status unavailable: {err}");
                return None;
            }
            Err(_) => {
                debug!("git status timed out after {GIT_STATUS_TIMEOUT:?}");
                return None;
            }
        };

        if !output.status.success() {
            return None;
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return None;
        }

        if text.chars().count() > self.max_git_output {
            let truncated: String = text.chars().take(self.max_git_output).collect();
            Some(format!("{truncated}..."))
        } else {
            Some(text)
        }
    }

    /// Non-hidden immediate children, lexically sorted, capped.
    fn file_listing(&self, cwd: &Path) -> Vec<String> {
        let entries = match fs::read_dir(cwd) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| !name.starts_with('.'))
            .collect();

        names.sort();
        names.truncate(self.max_files);
        names
    }

    fn os_info(&self) -> String {
        format!("{} {}", env::consts::OS, env::consts::ARCH)
    }
}
