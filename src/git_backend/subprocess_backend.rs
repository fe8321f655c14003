//! Subprocess-based implementation of GitBackend.
//!
//! This backend uses git CLI commands for all operations.
//! It works on any repository format, including reftable.
//!
//! Each call spawns one git process; a snapshot of N branches costs a few
//! processes per branch, which is the price of reftable support.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use super::{timestamp_to_utc, CommitInfo, GitBackend, Oid, RefFormat};

/// Field separator for `--format` strings (ASCII unit separator)
const FIELD_SEP: char = '\u{1f}';

/// Subprocess-based backend implementation
pub struct SubprocessBackend {
    git_dir: PathBuf,
    workdir: PathBuf,
    ref_format: RefFormat,
}

impl SubprocessBackend {
    /// Open a repository at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Get git directory
        let output = Command::new("git")
            .args(["rev-parse", "--git-dir"])
            .current_dir(path)
            .output()
            .context("Failed to find git directory")?;

        if !output.status.success() {
            bail!("Not a git repository");
        }

        let git_dir_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let git_dir = if Path::new(&git_dir_str).is_absolute() {
            PathBuf::from(git_dir_str)
        } else {
            path.join(git_dir_str)
        };

        // Get working directory
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(path)
            .output()
            .context("Failed to find working directory")?;

        if !output.status.success() {
            bail!("Not a working tree");
        }

        let workdir = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());

        // Detect ref format
        let ref_format = super::detect_ref_format(path)?;

        Ok(Self {
            git_dir,
            workdir,
            ref_format,
        })
    }

    /// Run a git command and return output
    fn run_git(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .context(format!("Failed to run git {}", args.join(" ")))
    }

    /// Run a git command and check for success
    fn run_git_success(&self, args: &[&str]) -> Result<()> {
        let output = self.run_git(args)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git {} failed: {}", args.join(" "), stderr.trim());
        }

        Ok(())
    }

    /// Run a git command and return stdout as string
    fn run_git_stdout(&self, args: &[&str]) -> Result<String> {
        let output = self.run_git(args)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git {} failed: {}", args.join(" "), stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Resolve a revision to a commit OID, or None if it does not name a commit
    fn resolve_commit(&self, reference: &str) -> Result<Option<Oid>> {
        let revspec = format!("{}^{{commit}}", reference);
        let output = self.run_git(&["rev-parse", "--verify", "--quiet", &revspec])?;
        if !output.status.success() {
            return Ok(None);
        }
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(Oid::from_str_unchecked(&sha)))
    }

    fn require_commit(&self, reference: &str) -> Result<Oid> {
        self.resolve_commit(reference)?
            .with_context(|| format!("Failed to resolve '{}'", reference))
    }
}

/// Parse `%H<US>%ct<US>%an<US>%s` output into commit metadata
fn parse_commit_line(line: &str) -> Result<CommitInfo> {
    let mut fields = line.splitn(4, FIELD_SEP);
    let hash = fields.next().context("Missing commit hash")?;
    let timestamp = fields.next().context("Missing commit time")?;
    let author = fields.next().unwrap_or("");
    let subject = fields.next().unwrap_or("");

    let secs: i64 = timestamp.trim().parse().context("Failed to parse commit time")?;

    Ok(CommitInfo {
        hash: Oid::from_str_unchecked(hash),
        date: timestamp_to_utc(secs)?,
        message: subject.to_string(),
        author: if author.is_empty() { None } else { Some(author.to_string()) },
    })
}

impl GitBackend for SubprocessBackend {
    fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn ref_format(&self) -> RefFormat {
        self.ref_format
    }

    // =========================================================================
    // Branch / history queries
    // =========================================================================

    fn current_branch(&self) -> Result<Option<String>> {
        let output = self.run_git(&["symbolic-ref", "--quiet", "--short", "HEAD"])?;
        if !output.status.success() {
            return Ok(None);
        }
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if name.is_empty() {
            return Ok(None);
        }
        // Unborn branch: HEAD names a branch that has no commit yet
        if self.resolve_commit(&format!("refs/heads/{}", name))?.is_none() {
            return Ok(None);
        }
        Ok(Some(name))
    }

    fn commit_info(&self, reference: &str) -> Result<Option<CommitInfo>> {
        let oid = match self.resolve_commit(reference)? {
            Some(oid) => oid,
            None => return Ok(None),
        };

        let format = format!("--format=%H{sep}%ct{sep}%an{sep}%s", sep = FIELD_SEP);
        let line = self.run_git_stdout(&["show", "-s", &format, oid.as_str()])?;
        parse_commit_line(&line).map(Some)
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let output = self.run_git(&["merge-base", "--is-ancestor", ancestor, descendant])?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                bail!("git merge-base --is-ancestor failed: {}", stderr.trim())
            }
        }
    }

    fn ahead_behind(&self, base: &str, branch: &str) -> Result<(usize, usize)> {
        let base_oid = self.require_commit(base)?;
        let branch_oid = self.require_commit(branch)?;
        let range = format!("{}...{}", base_oid, branch_oid);

        // Left side counts base-only commits, right side branch-only commits
        let counts = self.run_git_stdout(&["rev-list", "--left-right", "--count", &range])?;
        let mut parts = counts.split_whitespace();
        let behind: usize = parts
            .next()
            .context("Missing left count")?
            .parse()
            .context("Failed to parse left count")?;
        let ahead: usize = parts
            .next()
            .context("Missing right count")?
            .parse()
            .context("Failed to parse right count")?;

        Ok((ahead, behind))
    }

    fn upstream_of(&self, branch: &str) -> Result<Option<String>> {
        let refname = format!("refs/heads/{}", branch);
        let format = format!("--format=%(refname){}%(upstream)", FIELD_SEP);
        let output = self.run_git_stdout(&["for-each-ref", &format, &refname])?;

        // The pattern also matches refs below it (refs/heads/<branch>/...), so match exactly
        for line in output.lines() {
            if let Some((name, upstream)) = line.split_once(FIELD_SEP) {
                if name == refname {
                    let upstream = upstream.trim();
                    return Ok(if upstream.is_empty() {
                        None
                    } else {
                        Some(upstream.to_string())
                    });
                }
            }
        }

        Ok(None)
    }

    fn checked_out_branches(&self) -> Result<Vec<String>> {
        let output = self.run_git_stdout(&["worktree", "list", "--porcelain"])?;
        let mut branches: Vec<String> = output
            .lines()
            .filter_map(|line| line.strip_prefix("branch refs/heads/"))
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string())
            .collect();

        branches.sort();
        branches.dedup();
        Ok(branches)
    }

    // =========================================================================
    // Ref operations
    // =========================================================================

    fn create_reference(&self, name: &str, target: &Oid, msg: &str) -> Result<()> {
        // An empty old-value makes git refuse if the ref already exists
        self.run_git_success(&["update-ref", "-m", msg, name, target.as_str(), ""])
    }

    fn update_reference(&self, name: &str, target: &Oid, msg: &str) -> Result<()> {
        self.run_git_success(&["update-ref", "-m", msg, name, target.as_str()])
    }

    fn delete_reference(&self, name: &str) -> Result<()> {
        // Idempotent - succeeds even if ref doesn't exist
        let output = self.run_git(&["update-ref", "-d", name])?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // Ignore "not found" errors for idempotent behavior
            if !stderr.contains("not exist") && !stderr.contains("not found") && !stderr.contains("No such ref") {
                bail!("git update-ref -d {} failed: {}", name, stderr.trim());
            }
        }

        Ok(())
    }

    fn find_reference(&self, name: &str) -> Result<Option<Oid>> {
        let output = self.run_git(&["show-ref", "--verify", name])?;

        if !output.status.success() {
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);

        // Format: "sha1 refname"
        let parts: Vec<&str> = stdout.split_whitespace().collect();
        if parts.len() >= 2 {
            Ok(Some(Oid::from_str_unchecked(parts[0])))
        } else {
            Ok(None)
        }
    }

    fn list_references(&self, prefix: &str) -> Result<Vec<(String, Oid)>> {
        let format = format!("--format=%(objectname){sep}%(refname){sep}%(symref)", sep = FIELD_SEP);
        let output = self.run_git(&["for-each-ref", &format, prefix])?;

        if !output.status.success() {
            return Ok(Vec::new());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut refs = Vec::new();

        for line in stdout.lines() {
            let parts: Vec<&str> = line.split(FIELD_SEP).collect();
            if parts.len() < 2 || !parts[1].starts_with(prefix) {
                continue;
            }
            // A non-empty symref field marks a symbolic ref such as refs/remotes/origin/HEAD
            if parts.get(2).is_some_and(|symref| !symref.is_empty()) {
                continue;
            }
            refs.push((parts[1].to_string(), Oid::from_str_unchecked(parts[0])));
        }

        refs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(refs)
    }

    // =========================================================================
    // Blob operations
    // =========================================================================

    fn create_blob(&self, content: &[u8]) -> Result<Oid> {
        use std::io::Write;
        use std::process::Stdio;

        let mut child = Command::new("git")
            .args(["hash-object", "-w", "--stdin"])
            .current_dir(&self.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .context("Failed to spawn git hash-object")?;

        child
            .stdin
            .as_mut()
            .context("Failed to get stdin")?
            .write_all(content)
            .context("Failed to write to stdin")?;

        let output = child.wait_with_output()?;

        if !output.status.success() {
            bail!("Failed to create blob");
        }

        let oid = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Oid::from_str_unchecked(&oid))
    }

    fn read_blob(&self, oid: &Oid) -> Result<Vec<u8>> {
        let output = self.run_git(&["cat-file", "blob", oid.as_str()])?;

        if !output.status.success() {
            bail!("Failed to read blob {}", oid);
        }

        Ok(output.stdout)
    }
}
