//! Shared helpers for unit tests.
//!
//! Repositories are built with git2 inside a `tempfile::tempdir()`, so tests
//! run in parallel and never touch the working directory of the process.
//! `FaultyBackend` wraps a real backend and fails chosen primitives, which
//! is how multi-step failure paths are exercised.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::git_backend::{CommitInfo, Git2Backend, GitBackend, Oid, RefFormat};
use crate::git_gateway::GitGateway;

/// Initialize a test repository with consistent "main" branch naming.
///
/// Creates a git repository with an initial commit on the "main" branch,
/// ensuring consistency across all platforms (CI defaults to "master" without this).
pub fn init_test_repo(path: &Path) -> Result<git2::Repository> {
    let repo = git2::Repository::init(path)?;

    // Configure git user for the test repo (needed for commits in CI)
    let mut config = repo.config()?;
    config.set_str("user.name", "Test User")?;
    config.set_str("user.email", "test@example.com")?;
    drop(config);

    let sig = git2::Signature::now("Test User", "test@example.com")?;
    let tree_id = repo.index()?.write_tree()?;
    let tree = repo.find_tree(tree_id)?;
    repo.commit(Some("refs/heads/main"), &sig, &sig, "Initial commit", &tree, &[])?;
    drop(tree);

    repo.set_head("refs/heads/main")?;

    Ok(repo)
}

/// Add an empty commit dated `when` on top of `branch`, creating the branch
/// from HEAD if it doesn't exist yet. Returns the new commit id.
pub fn commit_at(repo: &git2::Repository, branch: &str, message: &str, when: DateTime<Utc>) -> Result<git2::Oid> {
    let refname = format!("refs/heads/{}", branch);
    let parent = match repo.find_reference(&refname) {
        Ok(reference) => reference.peel_to_commit()?,
        Err(_) => repo.head()?.peel_to_commit()?,
    };

    let time = git2::Time::new(when.timestamp(), 0);
    let sig = git2::Signature::new("Test User", "test@example.com", &time)?;
    let tree = parent.tree()?;
    let oid = repo.commit(Some(&refname), &sig, &sig, message, &tree, &[&parent])?;
    Ok(oid)
}

/// Create a branch pointing at the tip of `from`
pub fn branch_from(repo: &git2::Repository, name: &str, from: &str) -> Result<git2::Oid> {
    let commit = repo.revparse_single(from)?.peel_to_commit()?;
    repo.branch(name, &commit, false)?;
    Ok(commit.id())
}

/// Add a linked worktree at `path` with `branch` checked out
pub fn add_worktree(repo: &git2::Repository, name: &str, path: &Path, branch: &str) -> Result<()> {
    let reference = repo.find_reference(&format!("refs/heads/{}", branch))?;
    let mut opts = git2::WorktreeAddOptions::new();
    opts.reference(Some(&reference));
    repo.worktree(name, path, Some(&opts))?;
    Ok(())
}

/// Gateway over a plain git2 backend
pub fn open_gateway(path: &Path, log: slog::Logger) -> Result<GitGateway> {
    Ok(GitGateway::with_backend(Box::new(Git2Backend::open(path)?), log))
}

/// Primitive a `FaultyBackend` can be told to fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// `create_reference` on refs starting with the prefix
    Create(String),
    /// `update_reference` on refs starting with the prefix
    Update(String),
    /// `delete_reference` on refs starting with the prefix
    Delete(String),
    /// `is_ancestor` and `ahead_behind` when either side contains the text
    History(String),
    /// `create_blob`
    Blob,
    /// `commit_info` for refs containing the text
    CommitInfo(String),
}

#[derive(Debug, Clone, Copy)]
enum RefOp {
    Create,
    Update,
    Delete,
}

/// Backend wrapper that injects failures and counts ref/blob writes.
pub struct FaultyBackend {
    inner: Box<dyn GitBackend>,
    faults: Vec<Fault>,
    mutations: Arc<AtomicUsize>,
}

impl FaultyBackend {
    pub fn new(inner: Box<dyn GitBackend>) -> Self {
        Self {
            inner,
            faults: Vec::new(),
            mutations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.faults.push(fault);
        self
    }

    /// Shared counter of successful create/update/delete/blob calls
    pub fn mutation_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.mutations)
    }

    fn ref_fault(&self, op: RefOp, name: &str) -> bool {
        self.faults.iter().any(|f| match (op, f) {
            (RefOp::Create, Fault::Create(prefix))
            | (RefOp::Update, Fault::Update(prefix))
            | (RefOp::Delete, Fault::Delete(prefix)) => name.starts_with(prefix.as_str()),
            _ => false,
        })
    }

    fn history_fault(&self, a: &str, b: &str) -> bool {
        self.faults.iter().any(|f| match f {
            Fault::History(text) => a.contains(text.as_str()) || b.contains(text.as_str()),
            _ => false,
        })
    }

    fn record_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

impl GitBackend for FaultyBackend {
    fn git_dir(&self) -> &Path {
        self.inner.git_dir()
    }

    fn workdir(&self) -> &Path {
        self.inner.workdir()
    }

    fn ref_format(&self) -> RefFormat {
        self.inner.ref_format()
    }

    fn current_branch(&self) -> Result<Option<String>> {
        self.inner.current_branch()
    }

    fn commit_info(&self, reference: &str) -> Result<Option<CommitInfo>> {
        let failing = self.faults.iter().any(|f| match f {
            Fault::CommitInfo(text) => reference.contains(text.as_str()),
            _ => false,
        });
        if failing {
            bail!("injected commit lookup failure for '{}'", reference);
        }
        self.inner.commit_info(reference)
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        if self.history_fault(ancestor, descendant) {
            bail!("injected history failure");
        }
        self.inner.is_ancestor(ancestor, descendant)
    }

    fn ahead_behind(&self, base: &str, branch: &str) -> Result<(usize, usize)> {
        if self.history_fault(base, branch) {
            bail!("injected history failure");
        }
        self.inner.ahead_behind(base, branch)
    }

    fn upstream_of(&self, branch: &str) -> Result<Option<String>> {
        self.inner.upstream_of(branch)
    }

    fn checked_out_branches(&self) -> Result<Vec<String>> {
        self.inner.checked_out_branches()
    }

    fn create_reference(&self, name: &str, target: &Oid, msg: &str) -> Result<()> {
        if self.ref_fault(RefOp::Create, name) {
            bail!("injected create failure for '{}'", name);
        }
        self.inner.create_reference(name, target, msg)?;
        self.record_mutation();
        Ok(())
    }

    fn update_reference(&self, name: &str, target: &Oid, msg: &str) -> Result<()> {
        if self.ref_fault(RefOp::Update, name) {
            bail!("injected update failure for '{}'", name);
        }
        self.inner.update_reference(name, target, msg)?;
        self.record_mutation();
        Ok(())
    }

    fn delete_reference(&self, name: &str) -> Result<()> {
        if self.ref_fault(RefOp::Delete, name) {
            bail!("injected delete failure for '{}'", name);
        }
        self.inner.delete_reference(name)?;
        self.record_mutation();
        Ok(())
    }

    fn find_reference(&self, name: &str) -> Result<Option<Oid>> {
        self.inner.find_reference(name)
    }

    fn list_references(&self, prefix: &str) -> Result<Vec<(String, Oid)>> {
        self.inner.list_references(prefix)
    }

    fn create_blob(&self, content: &[u8]) -> Result<Oid> {
        if self.faults.contains(&Fault::Blob) {
            bail!("injected blob failure");
        }
        let oid = self.inner.create_blob(content)?;
        self.record_mutation();
        Ok(oid)
    }

    fn read_blob(&self, oid: &Oid) -> Result<Vec<u8>> {
        self.inner.read_blob(oid)
    }
}
