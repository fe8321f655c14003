//! Git backend abstraction for reftable compatibility.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        GitGateway                               │
//! │  (Typed primitives: pointers, commit metadata, ahead/behind)    │
//! │                                                                 │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Box<dyn GitBackend>                         │   │
//! │  │  (Low-level git operations: refs, blobs, history)       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//!     ┌────────────────┐             ┌────────────────────┐
//!     │  Git2Backend   │             │ SubprocessBackend  │
//!     │  (libgit2)     │             │ (git CLI)          │
//!     │                │             │                    │
//!     │ files-format   │             │ any format         │
//!     │ repos only     │             │ including reftable │
//!     └────────────────┘             └────────────────────┘
//! ```
//!
//! libgit2 does not read the reftable ref format (Git 2.45+), so
//! `create_backend()` picks the subprocess backend for those repositories.
//! Everything above this module talks to `dyn GitBackend` and never
//! branches on the format.
//!
//! Backends speak `anyhow::Result`; `GitGateway` converts failures into
//! `EngineError` at its boundary.

mod git2_backend;
mod subprocess_backend;

pub use git2_backend::Git2Backend;
pub use subprocess_backend::SubprocessBackend;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::process::Command;

/// Git ref storage format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefFormat {
    /// Traditional loose refs + packed-refs
    Files,
    /// New binary reftable format (Git 2.45+)
    Reftable,
}

/// Git object ID (hex string).
///
/// Validated on construction from untrusted input; values read back from
/// git output use `from_str_unchecked`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid(String);

impl Oid {
    /// Create an Oid from a hex string (validates format)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != 40 && s.len() != 64 {
            anyhow::bail!("Invalid OID length: expected 40 or 64, got {}", s.len());
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!("Invalid OID: contains non-hex characters");
        }
        Ok(Self(s.to_lowercase()))
    }

    /// Create an Oid without validation (for values read from git output)
    pub(crate) fn from_str_unchecked(s: &str) -> Self {
        Self(s.trim().to_string())
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to git2::Oid
    pub fn to_git2(&self) -> Result<git2::Oid> {
        git2::Oid::from_str(&self.0).context("Failed to parse OID")
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<git2::Oid> for Oid {
    fn from(oid: git2::Oid) -> Self {
        Self(oid.to_string())
    }
}

/// Metadata of the commit a ref points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub hash: Oid,
    /// Committer time
    pub date: DateTime<Utc>,
    /// Subject line
    pub message: String,
    pub author: Option<String>,
}

/// Unified backend for all git operations.
///
/// This trait abstracts over git2 and subprocess implementations,
/// allowing transparent reftable support. Each method maps to a single
/// plumbing primitive; composing them into multi-step sequences is the
/// caller's job.
pub trait GitBackend: Send {
    // =========================================================================
    // Path accessors
    // =========================================================================

    /// Path to .git directory
    fn git_dir(&self) -> &Path;

    /// Path to working directory
    fn workdir(&self) -> &Path;

    /// The ref format this repo uses
    fn ref_format(&self) -> RefFormat;

    // =========================================================================
    // Branch / history queries
    // =========================================================================

    /// Short name of the checked out branch, or None when HEAD is detached or unborn
    fn current_branch(&self) -> Result<Option<String>>;

    /// Commit metadata for a ref, or None if the ref does not resolve to a commit
    fn commit_info(&self, reference: &str) -> Result<Option<CommitInfo>>;

    /// Check if `ancestor` is reachable from `descendant` (equal counts as reachable)
    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool>;

    /// Count commits reachable from `branch` but not `base` (ahead) and the reverse (behind)
    fn ahead_behind(&self, base: &str, branch: &str) -> Result<(usize, usize)>;

    /// Full ref name of the configured upstream of a local branch, even if that ref is gone
    fn upstream_of(&self, branch: &str) -> Result<Option<String>>;

    /// Short names of branches checked out in any worktree of the repository,
    /// the main one included, sorted and deduplicated
    fn checked_out_branches(&self) -> Result<Vec<String>>;

    // =========================================================================
    // Ref operations
    // =========================================================================

    /// Create a reference; fails if it already exists
    fn create_reference(&self, name: &str, target: &Oid, msg: &str) -> Result<()>;

    /// Create or overwrite a reference
    fn update_reference(&self, name: &str, target: &Oid, msg: &str) -> Result<()>;

    /// Delete a reference (idempotent)
    fn delete_reference(&self, name: &str) -> Result<()>;

    /// Find a direct reference, returning its target OID
    fn find_reference(&self, name: &str) -> Result<Option<Oid>>;

    /// List direct references whose name starts with `prefix`; symbolic refs are skipped
    fn list_references(&self, prefix: &str) -> Result<Vec<(String, Oid)>>;

    // =========================================================================
    // Blob operations (trash metadata lives in blobs)
    // =========================================================================

    /// Create a blob from content, returns OID
    fn create_blob(&self, content: &[u8]) -> Result<Oid>;

    /// Read a blob's content by OID
    fn read_blob(&self, oid: &Oid) -> Result<Vec<u8>>;
}

/// Detect the ref format of a repository
pub fn detect_ref_format(path: &Path) -> Result<RefFormat> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-ref-format"])
        .current_dir(path)
        .output()
        .context("Failed to detect ref format")?;

    if !output.status.success() {
        // Older git or not a repo - assume files format
        return Ok(RefFormat::Files);
    }

    let format = String::from_utf8_lossy(&output.stdout);
    match format.trim() {
        "reftable" => Ok(RefFormat::Reftable),
        _ => Ok(RefFormat::Files),
    }
}

/// Create the appropriate backend for a repository
pub fn create_backend(path: &Path) -> Result<Box<dyn GitBackend>> {
    let format = detect_ref_format(path)?;

    match format {
        RefFormat::Reftable => {
            // Reftable repos must use subprocess - libgit2 doesn't support it
            Ok(Box::new(SubprocessBackend::open(path)?))
        }
        RefFormat::Files => {
            // Try git2 first, fall back to subprocess if it fails
            match Git2Backend::open(path) {
                Ok(backend) => Ok(Box::new(backend)),
                Err(_) => Ok(Box::new(SubprocessBackend::open(path)?)),
            }
        }
    }
}

/// Convert a unix timestamp from git into a UTC datetime
pub(crate) fn timestamp_to_utc(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).with_context(|| format!("Commit timestamp out of range: {}", secs))
}
