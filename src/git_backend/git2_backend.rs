//! Git2 (libgit2) implementation of GitBackend.
//!
//! This backend uses the git2 crate for fast, native git operations.
//! It only works on repositories using the "files" ref format.

use anyhow::{Context, Result};
use git2::{Commit, ErrorCode, Repository};
use std::path::{Path, PathBuf};

use super::{timestamp_to_utc, CommitInfo, GitBackend, Oid, RefFormat};

/// Git2-based backend implementation
pub struct Git2Backend {
    repo: Repository,
    git_dir: PathBuf,
    workdir: PathBuf,
}

impl Git2Backend {
    /// Open a repository at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path).context("Failed to open git repository with git2")?;

        let git_dir = repo.path().to_path_buf();
        let workdir = repo.workdir().context("Not a work tree")?.to_path_buf();

        Ok(Self { repo, git_dir, workdir })
    }

    /// Resolve a full ref name, short name or revision to a commit
    fn resolve_commit(&self, reference: &str) -> Option<Commit<'_>> {
        if let Ok(found) = self.repo.find_reference(reference) {
            return found.peel_to_commit().ok();
        }
        self.repo.revparse_single(reference).ok()?.peel_to_commit().ok()
    }

    fn require_commit(&self, reference: &str) -> Result<Commit<'_>> {
        self.resolve_commit(reference)
            .with_context(|| format!("Failed to resolve '{}'", reference))
    }
}

/// Branch HEAD points at in `repo`, born or not
fn head_branch(repo: &Repository) -> Option<String> {
    let head = repo.find_reference("HEAD").ok()?;
    head.symbolic_target()?
        .strip_prefix("refs/heads/")
        .map(|s| s.to_string())
}

impl GitBackend for Git2Backend {
    fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn ref_format(&self) -> RefFormat {
        RefFormat::Files
    }

    // =========================================================================
    // Branch / history queries
    // =========================================================================

    fn current_branch(&self) -> Result<Option<String>> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().map(|s| s.to_string())),
            // Detached, or unborn branch with no commits yet
            Ok(_) => Ok(None),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e).context("Failed to get HEAD"),
        }
    }

    fn commit_info(&self, reference: &str) -> Result<Option<CommitInfo>> {
        let commit = match self.resolve_commit(reference) {
            Some(commit) => commit,
            None => return Ok(None),
        };

        let date = timestamp_to_utc(commit.time().seconds())?;
        let message = commit.summary().unwrap_or("").to_string();
        let author = commit.author().name().map(|s| s.to_string());

        Ok(Some(CommitInfo {
            hash: Oid::from(commit.id()),
            date,
            message,
            author,
        }))
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let ancestor_id = self.require_commit(ancestor)?.id();
        let descendant_id = self.require_commit(descendant)?.id();

        // ancestor is an ancestor of descendant if merge_base(ancestor, descendant) == ancestor
        match self.repo.merge_base(ancestor_id, descendant_id) {
            Ok(merge_base) => Ok(merge_base == ancestor_id),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e).context("Failed to find merge base"),
        }
    }

    fn ahead_behind(&self, base: &str, branch: &str) -> Result<(usize, usize)> {
        let base_id = self.require_commit(base)?.id();
        let branch_id = self.require_commit(branch)?.id();

        // graph_ahead_behind(local, upstream) counts local-only commits first
        self.repo
            .graph_ahead_behind(branch_id, base_id)
            .context(format!("Failed to count commits between '{}' and '{}'", base, branch))
    }

    fn upstream_of(&self, branch: &str) -> Result<Option<String>> {
        let refname = format!("refs/heads/{}", branch);
        match self.repo.branch_upstream_name(&refname) {
            Ok(buf) => Ok(buf.as_str().map(|s| s.to_string())),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e).context(format!("Failed to read upstream of '{}'", branch)),
        }
    }

    fn checked_out_branches(&self) -> Result<Vec<String>> {
        let mut branches = Vec::new();

        // The main worktree's HEAD lives in the common dir
        if self.repo.is_worktree() {
            let main = Repository::open(self.repo.commondir()).context("Failed to open main repository")?;
            branches.extend(head_branch(&main));
        } else {
            branches.extend(head_branch(&self.repo));
        }

        let names = self.repo.worktrees().context("Failed to list worktrees")?;
        for name in names.iter().flatten() {
            let worktree = self
                .repo
                .find_worktree(name)
                .with_context(|| format!("Failed to find worktree '{}'", name))?;
            // A worktree whose directory is gone has nothing checked out
            if let Ok(repo) = Repository::open_from_worktree(&worktree) {
                branches.extend(head_branch(&repo));
            }
        }

        branches.sort();
        branches.dedup();
        Ok(branches)
    }

    // =========================================================================
    // Ref operations
    // =========================================================================

    fn create_reference(&self, name: &str, target: &Oid, msg: &str) -> Result<()> {
        let oid = target.to_git2()?;

        self.repo
            .reference(name, oid, false, msg)
            .context(format!("Failed to create reference '{}'", name))?;

        Ok(())
    }

    fn update_reference(&self, name: &str, target: &Oid, msg: &str) -> Result<()> {
        let oid = target.to_git2()?;

        self.repo
            .reference(name, oid, true, msg)
            .context(format!("Failed to update reference '{}'", name))?;

        Ok(())
    }

    fn delete_reference(&self, name: &str) -> Result<()> {
        // Idempotent - succeeds even if ref doesn't exist
        match self.repo.find_reference(name) {
            Ok(mut reference) => {
                reference
                    .delete()
                    .context(format!("Failed to delete reference '{}'", name))?;
            }
            Err(e) if e.code() == ErrorCode::NotFound => {}
            Err(e) => return Err(e).context(format!("Failed to find reference '{}'", name)),
        }
        Ok(())
    }

    fn find_reference(&self, name: &str) -> Result<Option<Oid>> {
        match self.repo.find_reference(name) {
            Ok(reference) => Ok(reference.target().map(Oid::from)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e).context(format!("Failed to find reference '{}'", name)),
        }
    }

    fn list_references(&self, prefix: &str) -> Result<Vec<(String, Oid)>> {
        let mut refs = Vec::new();

        for reference in self.repo.references().context("Failed to list references")? {
            let reference = reference?;
            // Symbolic refs have no direct target and are skipped here
            if let (Some(name), Some(oid)) = (reference.name(), reference.target()) {
                if name.starts_with(prefix) {
                    refs.push((name.to_string(), Oid::from(oid)));
                }
            }
        }

        refs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(refs)
    }

    // =========================================================================
    // Blob operations
    // =========================================================================

    fn create_blob(&self, content: &[u8]) -> Result<Oid> {
        let oid = self.repo.blob(content).context("Failed to create blob")?;

        Ok(Oid::from(oid))
    }

    fn read_blob(&self, oid: &Oid) -> Result<Vec<u8>> {
        let git_oid = oid.to_git2()?;

        let blob = self.repo.find_blob(git_oid).context("Failed to find blob")?;

        Ok(blob.content().to_vec())
    }
}
