//! Git operations gateway for branchbin.
//!
//! This module provides the typed plumbing contract the rest of the engine
//! builds on, automatically detecting the repository's ref format and using
//! either git2 (for "files" repos) or git CLI subprocess calls (for
//! "reftable" repos).
//!
//! # Operations
//!
//! - **Branch queries**: list local/remote pointers, current branch, latest commit
//! - **History queries**: ancestry (merged), ahead/behind counts, upstream tracking
//! - **Pointer mutation**: create, update, delete refs in any namespace
//! - **Blob operations**: small metadata payloads stored as git objects
//!
//! Each call maps to one plumbing primitive. Sequencing several calls into
//! a multi-step operation is the trash store's job.

mod branch;
pub mod refs;
mod remote;

#[cfg(test)]
mod tests;

use slog::Logger;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::git_backend::{self, GitBackend, RefFormat};

pub use self::branch::BranchPointer;
pub use self::remote::UpstreamStatus;

/// Namespace of local branches
pub const LOCAL_PREFIX: &str = "refs/heads/";

/// Namespace of remote-tracking branches
pub const REMOTE_PREFIX: &str = "refs/remotes/";

/// Unified interface to git operations.
///
/// All git access in branchbin goes through this gateway, which wraps a
/// `GitBackend` chosen for the repository's ref format and converts backend
/// failures into `EngineError::Gateway` at its boundary.
pub struct GitGateway {
    /// Git backend that handles all basic operations
    backend: Box<dyn GitBackend>,
    /// Path to .git directory
    git_dir: PathBuf,
    /// Path to working directory
    workdir: PathBuf,
    /// Reference format (files or reftable)
    format: RefFormat,
    log: Logger,
}

impl GitGateway {
    /// Open the repository containing `path`.
    ///
    /// Picks git2 for "files" repos and the git CLI for "reftable" repos.
    /// Any failure to open maps to `NotARepository`.
    pub fn open<P: AsRef<Path>>(path: P, log: Logger) -> Result<Self> {
        let path = path.as_ref();
        let backend = git_backend::create_backend(path).map_err(|e| {
            slog::debug!(log, "failed to open repository"; "path" => %path.display(), "error" => %format!("{:#}", e));
            EngineError::NotARepository {
                path: path.to_path_buf(),
            }
        })?;
        Ok(Self::with_backend(backend, log))
    }

    /// Wrap an already constructed backend
    pub fn with_backend(backend: Box<dyn GitBackend>, log: Logger) -> Self {
        let git_dir = backend.git_dir().to_path_buf();
        let workdir = backend.workdir().to_path_buf();
        let format = backend.ref_format();
        Self {
            backend,
            git_dir,
            workdir,
            format,
            log,
        }
    }

    /// Get the repository's ref format
    pub fn ref_format(&self) -> RefFormat {
        self.format
    }

    /// Get the git directory path
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Get the working directory path
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}
