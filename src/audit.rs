//! Append-only audit log of every suggestion and error event.
//!
//! One JSON object per line. Each append is a single write of one complete
//! line on an append-mode handle, so concurrent writers interleave whole
//! entries. Log I/O failures are warned about and swallowed: auditing must
//! never fail the request that triggered it.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

const DEFAULT_MAX_SIZE_BYTES: u64 = 5 * 1024 * 1024;

/// One immutable record of a suggestion or error event.
///
/// Absent fields are omitted from the serialized line; `approved` is
/// tri-state (true / false / absent meaning "not yet decided").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: String,
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub cwd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditStats {
    pub total_entries: u64,
    pub file_size_bytes: u64,
    pub providers_used: BTreeSet<String>,
    pub approval_rate: f64,
}

/// Durable journal for suggestion outcomes, with size-based rotation.
pub struct AuditLogger {
    log_path: PathBuf,
    max_size_bytes: u64,
}

impl AuditLogger {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self::with_max_size(log_path, DEFAULT_MAX_SIZE_BYTES)
    }

    pub fn with_max_size(log_path: impl Into<PathBuf>, max_size_bytes: u64) -> Self {
        let log_path = log_path.into();
        if let Some(parent) = log_path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!("Could not create audit log directory: {err}");
            }
        }
        Self {
            log_path,
            max_size_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Record a command suggestion and, when known, its outcome.
    #[allow(clippy::too_many_arguments)]
    pub fn log_suggestion(
        &self,
        goal: &str,
        command: &str,
        cwd: &str,
        provider: &str,
        approved: Option<bool>,
        exit_code: Option<i32>,
        risk_score: Option<f64>,
    ) {
        let entry = AuditEntry {
            timestamp: utc_timestamp(),
            goal: goal.to_string(),
            command: Some(command.to_string()),
            error: None,
            cwd: cwd.to_string(),
            provider: Some(provider.to_string()),
            approved,
            exit_code,
            risk_score,
        };
        self.append_entry(&entry);
        self.rotate_if_needed();
    }

    /// Record a failed suggestion attempt.
    pub fn log_error(&self, goal: &str, error: &str, cwd: &str, provider: Option<&str>) {
        let entry = AuditEntry {
            timestamp: utc_timestamp(),
            goal: goal.to_string(),
            command: None,
            error: Some(error.to_string()),
            cwd: cwd.to_string(),
            provider: provider.map(str::to_string),
            approved: None,
            exit_code: None,
            risk_score: None,
        };
        self.append_entry(&entry);
        self.rotate_if_needed();
    }

    fn append_entry(&self, entry: &AuditEntry) {
        let mut line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(err) => {
                warn!("Could not serialize audit entry: {err}");
                return;
            }
        };
        line.push('\n');

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .and_then(|mut file| file.write_all(line.as_bytes()));

        if let Err(err) = result {
            warn!("Could not write to audit log: {err}");
        }
    }

    fn rotate_if_needed(&self) {
        let size = match fs::metadata(&self.log_path) {
            Ok(meta) => meta.len(),
            Err(_) => return,
        };
        if size <= self.max_size_bytes {
            return;
        }

        let backup = self.backup_path();
        if backup.exists() {
            if let Err(err) = fs::remove_file(&backup) {
                warn!("Could not remove old audit backup: {err}");
            }
        }
        if let Err(err) = fs::rename(&self.log_path, &backup) {
            warn!("Could not rotate audit log: {err}");
        }
    }

    fn backup_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.1", self.log_path.display()))
    }

    /// Last `limit` entries in original order; malformed lines are skipped.
    /// A missing or empty file yields an empty list.
    pub fn recent_entries(&self, limit: usize) -> Vec<AuditEntry> {
        let content = match fs::read_to_string(&self.log_path) {
            Ok(content) => content,
            Err(_) => return Vec::new(),
        };

        let lines: Vec<&str> = content.lines().collect();
        let start = lines.len().saturating_sub(limit);
        lines[start..]
            .iter()
            .filter_map(|line| serde_json::from_str(line.trim()).ok())
            .collect()
    }

    /// Aggregate usage statistics over every parseable entry.
    ///
    /// The approval rate is computed only over entries whose approval has
    /// been decided; it is 0.0 when no entry qualifies.
    pub fn stats(&self) -> AuditStats {
        let mut stats = AuditStats {
            total_entries: 0,
            file_size_bytes: 0,
            providers_used: BTreeSet::new(),
            approval_rate: 0.0,
        };

        let content = match fs::read_to_string(&self.log_path) {
            Ok(content) => content,
            Err(_) => return stats,
        };
        stats.file_size_bytes = fs::metadata(&self.log_path).map(|m| m.len()).unwrap_or(0);

        let mut approved_count = 0u64;
        let mut decided_count = 0u64;

        for line in content.lines() {
            let entry: AuditEntry = match serde_json::from_str(line.trim()) {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            stats.total_entries += 1;

            if let Some(provider) = entry.provider.filter(|p| !p.is_empty()) {
                stats.providers_used.insert(provider);
            }

            if let Some(approved) = entry.approved {
                decided_count += 1;
                if approved {
                    approved_count += 1;
                }
            }
        }

        if decided_count > 0 {
            stats.approval_rate = approved_count as f64 / decided_count as f64;
        }

        stats
    }
}

/// UTC ISO-8601 with a trailing `Z`.
fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
