//! Branch and history queries for GitGateway.

use slog::{debug, warn};

use super::{GitGateway, LOCAL_PREFIX, REMOTE_PREFIX};
use crate::config::COMPARE_BRANCH_CANDIDATES;
use crate::error::{EngineError, Result};
use crate::git_backend::{CommitInfo, Oid};

/// A named ref in the local or remote branch namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchPointer {
    /// Short name ("feature", "origin/feature")
    pub name: String,
    /// Full ref ("refs/heads/feature")
    pub ref_name: String,
    pub target: Oid,
}

impl GitGateway {
    /// List every local branch, sorted by ref name
    pub fn list_local_pointers(&self) -> Result<Vec<BranchPointer>> {
        self.list_branch_pointers(LOCAL_PREFIX)
    }

    /// List every remote-tracking branch, without `<remote>/HEAD` markers
    pub fn list_remote_pointers(&self) -> Result<Vec<BranchPointer>> {
        let pointers = self.list_branch_pointers(REMOTE_PREFIX)?;
        Ok(pointers.into_iter().filter(|p| !p.name.ends_with("/HEAD")).collect())
    }

    fn list_branch_pointers(&self, prefix: &str) -> Result<Vec<BranchPointer>> {
        let refs = self.backend.list_references(prefix).map_err(EngineError::gateway)?;
        Ok(refs
            .into_iter()
            .map(|(ref_name, target)| BranchPointer {
                name: ref_name[prefix.len()..].to_string(),
                ref_name,
                target,
            })
            .collect())
    }

    /// Short name of the checked out branch (None when detached or unborn)
    pub fn current_branch(&self) -> Result<Option<String>> {
        self.backend.current_branch().map_err(EngineError::gateway)
    }

    /// Branches checked out in this or any linked worktree
    pub fn checked_out_branches(&self) -> Result<Vec<String>> {
        self.backend.checked_out_branches().map_err(EngineError::gateway)
    }

    /// Metadata of the newest commit on a branch; None if it does not resolve
    pub fn get_latest_commit(&self, name: &str) -> Result<Option<CommitInfo>> {
        self.backend.commit_info(name).map_err(EngineError::gateway)
    }

    /// Whether `candidate`'s tip is reachable from `compare`
    pub fn is_ancestor_merged(&self, candidate: &str, compare: &str) -> Result<bool> {
        self.backend
            .is_ancestor(candidate, compare)
            .map_err(EngineError::gateway)
    }

    /// Commits reachable only from `branch` (ahead) and only from `base` (behind).
    ///
    /// Never fails: unresolvable refs or a broken history walk yield None.
    pub fn ahead_behind_count(&self, base: &str, branch: &str) -> Option<(u32, u32)> {
        match self.backend.ahead_behind(base, branch) {
            Ok((ahead, behind)) => Some((clamp_count(ahead), clamp_count(behind))),
            Err(e) => {
                debug!(self.log, "ahead/behind unavailable";
                    "base" => base, "branch" => branch, "error" => %format!("{:#}", e));
                None
            }
        }
    }

    /// Branch that merged/ahead/behind are measured against.
    ///
    /// A configured branch is used if it resolves to a commit; otherwise the
    /// first existing local candidate (main, then master). None if nothing fits.
    pub fn detect_compare_branch(&self, configured: Option<&str>) -> Result<Option<String>> {
        if let Some(branch) = configured {
            if self.get_latest_commit(branch)?.is_some() {
                return Ok(Some(branch.to_string()));
            }
            warn!(self.log, "configured compare branch does not resolve, using default";
                "branch" => branch);
        }

        for candidate in COMPARE_BRANCH_CANDIDATES {
            if self.pointer_exists(&format!("{}{}", LOCAL_PREFIX, candidate))? {
                return Ok(Some(candidate.to_string()));
            }
        }
        Ok(None)
    }
}

fn clamp_count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
