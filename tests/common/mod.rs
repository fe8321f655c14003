use anyhow::{bail, Result};
use std::fs;
use std::path::Path;
use std::process::Command;

use branchbin::{logging, BranchEngine, GitConfig};

/// Helper to initialize a test git repository with an initial commit on "main"
#[allow(dead_code)]
pub fn init_test_repo(dir: &Path) -> Result<()> {
    init_repo_with_args(dir, &["init", "-b", "main"])
}

/// Initialize a reftable test repository
#[allow(dead_code)]
pub fn init_reftable_repo(dir: &Path) -> Result<()> {
    init_repo_with_args(dir, &["init", "-b", "main", "--ref-format=reftable"])
}

fn init_repo_with_args(dir: &Path, init_args: &[&str]) -> Result<()> {
    let status = Command::new("git").args(init_args).current_dir(dir).status()?;
    if !status.success() {
        bail!("git {} failed", init_args.join(" "));
    }

    run_git(dir, &["config", "user.name", "Test User"])?;
    run_git(dir, &["config", "user.email", "test@example.com"])?;
    run_git(dir, &["config", "commit.gpgsign", "false"])?;

    fs::write(dir.join("README.md"), "# Test Repo")?;
    run_git(dir, &["add", "."])?;
    run_git(dir, &["commit", "-m", "Initial commit"])?;
    Ok(())
}

/// Check if git version supports reftable (2.45+)
#[allow(dead_code)]
pub fn git_supports_reftable() -> bool {
    let output = Command::new("git").args(["--version"]).output().ok();

    if let Some(output) = output {
        let version = String::from_utf8_lossy(&output.stdout);
        if let Some(v) = version.strip_prefix("git version ") {
            let parts: Vec<&str> = v.trim().split('.').collect();
            if parts.len() >= 2 {
                let major: u32 = parts[0].parse().unwrap_or(0);
                let minor: u32 = parts[1].parse().unwrap_or(0);
                return major > 2 || (major == 2 && minor >= 45);
            }
        }
    }
    false
}

/// Helper to run git commands directly, failing on a non-zero exit
pub fn run_git(dir: &Path, args: &[&str]) -> Result<std::process::Output> {
    let output = Command::new("git").args(args).current_dir(dir).output()?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(output)
}

/// Create a branch from HEAD and add one commit to it, staying on the
/// current branch. `days_ago` backdates the commit.
#[allow(dead_code)]
pub fn create_branch_with_commit(dir: &Path, name: &str, days_ago: i64) -> Result<()> {
    let original = get_current_branch(dir)?;
    run_git(dir, &["checkout", "-q", "-b", name])?;

    let filename = format!("{}.txt", name.replace('/', "_"));
    fs::write(dir.join(&filename), name)?;
    run_git(dir, &["add", &filename])?;

    let date = (chrono::Utc::now() - chrono::Duration::days(days_ago)).to_rfc3339();
    let output = Command::new("git")
        .args(["commit", "-q", "-m", &format!("Work on {}", name)])
        .env("GIT_AUTHOR_DATE", &date)
        .env("GIT_COMMITTER_DATE", &date)
        .current_dir(dir)
        .output()?;
    if !output.status.success() {
        bail!("commit on {} failed", name);
    }

    run_git(dir, &["checkout", "-q", &original])?;
    Ok(())
}

/// Create a branch at HEAD without adding commits
#[allow(dead_code)]
pub fn create_branch(dir: &Path, name: &str) -> Result<()> {
    run_git(dir, &["branch", name])?;
    Ok(())
}

/// Helper to get current git branch
#[allow(dead_code)]
pub fn get_current_branch(dir: &Path) -> Result<String> {
    let output = run_git(dir, &["branch", "--show-current"])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Helper to check if a ref exists
#[allow(dead_code)]
pub fn ref_exists(dir: &Path, refname: &str) -> bool {
    Command::new("git")
        .args(["show-ref", "--verify", "--quiet", refname])
        .current_dir(dir)
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Helper to get commit hash for a revision
#[allow(dead_code)]
pub fn get_commit_hash(dir: &Path, rev: &str) -> Result<String> {
    let output = run_git(dir, &["rev-parse", rev])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Engine over `dir` with default config and no log output
#[allow(dead_code)]
pub fn open_engine(dir: &Path) -> Result<BranchEngine> {
    Ok(BranchEngine::open(dir, GitConfig::default(), logging::discard_logger())?)
}
