//! Append-only history of trash operations.
//!
//! Stored one JSON object per line in `.git/branchbin/operations.jsonl`, so
//! a user who lost track of a branch can see where it went and which commit
//! it pointed at.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Maximum number of log entries to keep before rotation
const MAX_LOG_ENTRIES: usize = 1000;

/// Types of operations that can be logged
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Branch was moved to the trash
    BranchTrashed { branch: String, target: String },
    /// Branch was moved back from the trash
    BranchRestored { branch: String, target: String },
    /// Trash entry was deleted on request
    TrashPruned { branch: String, target: String },
    /// Trash entry was deleted by the TTL sweep
    TrashExpired { branch: String },
}

/// A log entry with timestamp
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    /// Timestamp when operation occurred
    pub timestamp: DateTime<Utc>,
    /// The operation that was performed
    pub operation: Operation,
}

impl LogEntry {
    /// Create a new log entry with current timestamp
    pub fn new(operation: Operation) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
        }
    }
}

/// Manages the operation log stored in .git/branchbin/operations.jsonl
#[derive(Debug, Clone)]
pub struct OperationLog {
    log_path: PathBuf,
}

impl OperationLog {
    /// Operation log for a repository, given its `.git` directory
    pub fn for_git_dir(git_dir: &Path) -> Self {
        Self {
            log_path: git_dir.join("branchbin").join("operations.jsonl"),
        }
    }

    /// Operation log at an explicit file path
    pub fn from_path(path: PathBuf) -> Self {
        Self { log_path: path }
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Append a log entry to the operation log
    pub fn log(&self, entry: LogEntry) -> Result<()> {
        if let Some(parent) = self.log_path.parent() {
            fs::create_dir_all(parent).context("Failed to create branchbin directory")?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .context("Failed to open operation log")?;

        let json = serde_json::to_string(&entry).context("Failed to serialize log entry")?;

        writeln!(file, "{}", json).context("Failed to write to operation log")?;

        self.maybe_trim_log()?;

        Ok(())
    }

    /// Trim the log if it exceeds MAX_LOG_ENTRIES
    fn maybe_trim_log(&self) -> Result<()> {
        if !self.log_path.exists() {
            return Ok(());
        }

        // Quick check: count lines to see if trimming is needed
        let file = File::open(&self.log_path).context("Failed to open log for trimming check")?;
        let line_count = BufReader::new(file).lines().count();

        // Only trim if we exceed the max by a margin (to avoid trimming on every write)
        if line_count <= MAX_LOG_ENTRIES + 100 {
            return Ok(());
        }

        let entries = self.read_all()?;
        if entries.len() <= MAX_LOG_ENTRIES {
            return Ok(());
        }

        // Keep only the last MAX_LOG_ENTRIES
        let to_keep = &entries[entries.len() - MAX_LOG_ENTRIES..];

        // Write back (atomic: write to temp file, then rename)
        let temp_path = self.log_path.with_extension("jsonl.tmp");
        {
            let mut file = File::create(&temp_path).context("Failed to create temp log file")?;
            for entry in to_keep {
                let json = serde_json::to_string(entry)?;
                writeln!(file, "{}", json)?;
            }
        }

        fs::rename(&temp_path, &self.log_path).context("Failed to rotate log file")?;

        Ok(())
    }

    /// Read all log entries, oldest first. Unparseable lines are skipped.
    pub fn read_all(&self) -> Result<Vec<LogEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path).context("Failed to open operation log")?;
        let reader = BufReader::new(file);

        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line.context("Failed to read line from log")?;
            if line.trim().is_empty() {
                continue;
            }

            if let Ok(entry) = serde_json::from_str::<LogEntry>(&line) {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    /// Read the newest `n` entries, oldest first
    pub fn read_recent(&self, n: usize) -> Result<Vec<LogEntry>> {
        let all_entries = self.read_all()?;
        let start = all_entries.len().saturating_sub(n);
        Ok(all_entries[start..].to_vec())
    }

    /// Most recent entry about `branch`
    pub fn last_entry_for(&self, branch: &str) -> Result<Option<LogEntry>> {
        let entries = self.read_all()?;
        Ok(entries.into_iter().rev().find(|entry| match &entry.operation {
            Operation::BranchTrashed { branch: b, .. }
            | Operation::BranchRestored { branch: b, .. }
            | Operation::TrashPruned { branch: b, .. }
            | Operation::TrashExpired { branch: b } => b == branch,
        }))
    }

    /// Clear the operation log
    pub fn clear(&self) -> Result<()> {
        if self.log_path.exists() {
            fs::remove_file(&self.log_path).context("Failed to clear operation log")?;
        }
        Ok(())
    }
}
