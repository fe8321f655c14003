//! Tests for GitGateway.

use super::*;
use anyhow::Result;
use chrono::{Duration, Utc};
use git2::Repository;
use std::process::Command;
use tempfile::tempdir;

use crate::git_backend::{Oid, SubprocessBackend};
use crate::logging::capture::CaptureDrain;
use crate::logging::discard_logger;
use crate::models::UpstreamTrack;
use crate::test_support::{add_worktree, branch_from, commit_at, init_test_repo, open_gateway};

/// Helper to set upstream config for a branch using git CLI
fn set_upstream_config(path: &Path, branch: &str, remote: &str, merge: &str) -> Result<()> {
    for (key, value) in [
        (format!("branch.{}.remote", branch), remote),
        (format!("branch.{}.merge", branch), merge),
    ] {
        let status = Command::new("git")
            .args(["config", &key, value])
            .current_dir(path)
            .status()?;
        if !status.success() {
            anyhow::bail!("Failed to set {}", key);
        }
    }
    Ok(())
}

/// Helper to register a remote so upstream refspecs resolve
fn add_remote(path: &Path, name: &str) -> Result<()> {
    let status = Command::new("git")
        .args(["remote", "add", name, "https://example.invalid/repo.git"])
        .current_dir(path)
        .status()?;
    if !status.success() {
        anyhow::bail!("Failed to add remote");
    }
    Ok(())
}

fn head_oid(repo: &Repository) -> Result<Oid> {
    Ok(Oid::from(repo.head()?.peel_to_commit()?.id()))
}

#[test]
fn test_open_non_repository_is_not_a_repository() -> Result<()> {
    let dir = tempdir()?;
    let err = match GitGateway::open(dir.path(), discard_logger()) {
        Ok(_) => panic!("opening a plain directory should fail"),
        Err(e) => e,
    };
    assert!(matches!(err, EngineError::NotARepository { .. }));
    assert!(err.is_fatal());
    Ok(())
}

#[test]
fn test_open_detects_files_format() -> Result<()> {
    let dir = tempdir()?;
    let _repo = init_test_repo(dir.path())?;

    let gateway = GitGateway::open(dir.path(), discard_logger())?;
    assert_eq!(gateway.ref_format(), RefFormat::Files);
    assert!(gateway.git_dir().ends_with(".git"));
    assert_eq!(gateway.workdir().canonicalize()?, dir.path().canonicalize()?);
    Ok(())
}

#[test]
fn test_list_local_pointers() -> Result<()> {
    let dir = tempdir()?;
    let repo = init_test_repo(dir.path())?;
    branch_from(&repo, "feature/a", "main")?;
    branch_from(&repo, "bugfix", "main")?;

    let gateway = open_gateway(dir.path(), discard_logger())?;
    let names: Vec<String> = gateway.list_local_pointers()?.into_iter().map(|p| p.name).collect();

    assert_eq!(names, vec!["bugfix", "feature/a", "main"]);
    Ok(())
}

#[test]
fn test_list_remote_pointers_skips_head_marker() -> Result<()> {
    let dir = tempdir()?;
    let repo = init_test_repo(dir.path())?;
    let tip = repo.head()?.peel_to_commit()?.id();
    repo.reference("refs/remotes/origin/main", tip, false, "test")?;
    repo.reference("refs/remotes/origin/feature", tip, false, "test")?;
    repo.reference_symbolic("refs/remotes/origin/HEAD", "refs/remotes/origin/main", false, "test")?;
    // A direct HEAD marker must be filtered as well
    repo.reference("refs/remotes/upstream/HEAD", tip, false, "test")?;

    let gateway = open_gateway(dir.path(), discard_logger())?;
    let remotes = gateway.list_remote_pointers()?;
    let names: Vec<&str> = remotes.iter().map(|p| p.name.as_str()).collect();

    assert_eq!(names, vec!["origin/feature", "origin/main"]);
    assert_eq!(remotes[0].ref_name, "refs/remotes/origin/feature");
    Ok(())
}

#[test]
fn test_current_branch_and_detached_head() -> Result<()> {
    let dir = tempdir()?;
    let repo = init_test_repo(dir.path())?;
    let gateway = open_gateway(dir.path(), discard_logger())?;

    assert_eq!(gateway.current_branch()?.as_deref(), Some("main"));

    let tip = repo.head()?.peel_to_commit()?.id();
    repo.set_head_detached(tip)?;
    assert_eq!(gateway.current_branch()?, None);
    Ok(())
}

#[test]
fn test_get_latest_commit() -> Result<()> {
    let dir = tempdir()?;
    let repo = init_test_repo(dir.path())?;
    let when = Utc::now() - Duration::days(12);
    let oid = commit_at(&repo, "feature", "Add feature", when)?;

    let gateway = open_gateway(dir.path(), discard_logger())?;
    let info = gateway.get_latest_commit("refs/heads/feature")?.expect("commit");

    assert_eq!(info.hash.as_str(), oid.to_string());
    assert_eq!(info.message, "Add feature");
    assert_eq!(info.date.timestamp(), when.timestamp());
    assert_eq!(info.author.as_deref(), Some("Test User"));

    assert!(gateway.get_latest_commit("refs/heads/missing")?.is_none());
    Ok(())
}

#[test]
fn test_is_ancestor_merged() -> Result<()> {
    let dir = tempdir()?;
    let repo = init_test_repo(dir.path())?;
    branch_from(&repo, "merged", "main")?;
    commit_at(&repo, "unmerged", "Work", Utc::now())?;

    let gateway = open_gateway(dir.path(), discard_logger())?;
    assert!(gateway.is_ancestor_merged("refs/heads/merged", "main")?);
    assert!(!gateway.is_ancestor_merged("refs/heads/unmerged", "main")?);
    assert!(gateway.is_ancestor_merged("refs/heads/missing", "main").is_err());
    Ok(())
}

#[test]
fn test_ahead_behind_count() -> Result<()> {
    let dir = tempdir()?;
    let repo = init_test_repo(dir.path())?;
    commit_at(&repo, "feature", "One", Utc::now())?;
    commit_at(&repo, "feature", "Two", Utc::now())?;
    commit_at(&repo, "main", "Main moved", Utc::now())?;

    let gateway = open_gateway(dir.path(), discard_logger())?;
    assert_eq!(gateway.ahead_behind_count("main", "refs/heads/feature"), Some((2, 1)));
    assert_eq!(gateway.ahead_behind_count("main", "refs/heads/main"), Some((0, 0)));
    // Unresolvable refs never error
    assert_eq!(gateway.ahead_behind_count("main", "refs/heads/missing"), None);
    Ok(())
}

#[test]
fn test_create_pointer_fails_if_exists() -> Result<()> {
    let dir = tempdir()?;
    let repo = init_test_repo(dir.path())?;
    let gateway = open_gateway(dir.path(), discard_logger())?;
    let tip = head_oid(&repo)?;

    gateway.create_pointer("refs/branchbin/trash/x", &tip, "test")?;
    assert!(gateway.pointer_exists("refs/branchbin/trash/x")?);

    let err = gateway
        .create_pointer("refs/branchbin/trash/x", &tip, "test")
        .unwrap_err();
    assert!(matches!(err, EngineError::Gateway { .. }));

    // update overwrites
    gateway.update_pointer("refs/branchbin/trash/x", &tip, "test")?;
    assert_eq!(gateway.find_pointer("refs/branchbin/trash/x")?, Some(tip));
    Ok(())
}

#[test]
fn test_delete_pointer_is_idempotent() -> Result<()> {
    let dir = tempdir()?;
    let repo = init_test_repo(dir.path())?;
    branch_from(&repo, "gone", "main")?;
    let gateway = open_gateway(dir.path(), discard_logger())?;

    gateway.delete_pointer("refs/heads/gone")?;
    gateway.delete_pointer("refs/heads/gone")?;
    assert!(!gateway.pointer_exists("refs/heads/gone")?);
    Ok(())
}

#[test]
fn test_blob_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let _repo = init_test_repo(dir.path())?;
    let gateway = open_gateway(dir.path(), discard_logger())?;

    let oid = gateway.write_blob(b"2026-01-01T00:00:00+00:00")?;
    assert_eq!(gateway.read_blob(&oid)?, b"2026-01-01T00:00:00+00:00");
    Ok(())
}

#[test]
fn test_upstream_status_variants() -> Result<()> {
    let dir = tempdir()?;
    let repo = init_test_repo(dir.path())?;
    add_remote(dir.path(), "origin")?;
    let tip = repo.head()?.peel_to_commit()?.id();
    repo.reference("refs/remotes/origin/synced", tip, false, "test")?;
    branch_from(&repo, "synced", "main")?;
    set_upstream_config(dir.path(), "synced", "origin", "refs/heads/synced")?;

    repo.reference("refs/remotes/origin/ahead", tip, false, "test")?;
    commit_at(&repo, "ahead", "Local work", Utc::now())?;
    set_upstream_config(dir.path(), "ahead", "origin", "refs/heads/ahead")?;

    branch_from(&repo, "orphan", "main")?;
    set_upstream_config(dir.path(), "orphan", "origin", "refs/heads/deleted-upstream")?;

    branch_from(&repo, "untracked", "main")?;

    let gateway = open_gateway(dir.path(), discard_logger())?;

    let synced = gateway.upstream_status("synced")?.expect("upstream");
    assert_eq!(synced.name, "origin/synced");
    assert_eq!(synced.track, UpstreamTrack::InSync);

    let ahead = gateway.upstream_status("ahead")?.expect("upstream");
    assert_eq!(ahead.track, UpstreamTrack::Ahead { ahead: 1 });

    let orphan = gateway.upstream_status("orphan")?.expect("upstream");
    assert_eq!(orphan.name, "origin/deleted-upstream");
    assert_eq!(orphan.track, UpstreamTrack::Gone);

    assert!(gateway.upstream_status("untracked")?.is_none());
    Ok(())
}

#[test]
fn test_detect_compare_branch() -> Result<()> {
    let dir = tempdir()?;
    let repo = init_test_repo(dir.path())?;
    let gateway = open_gateway(dir.path(), discard_logger())?;

    assert_eq!(gateway.detect_compare_branch(None)?.as_deref(), Some("main"));

    branch_from(&repo, "develop", "main")?;
    assert_eq!(gateway.detect_compare_branch(Some("develop"))?.as_deref(), Some("develop"));
    // A typo in the setting falls back to the defaults
    assert_eq!(gateway.detect_compare_branch(Some("nope"))?.as_deref(), Some("main"));
    Ok(())
}

#[test]
fn test_unresolved_compare_branch_without_candidates() -> Result<()> {
    let dir = tempdir()?;
    let repo = init_test_repo(dir.path())?;
    branch_from(&repo, "trunk-ish", "main")?;
    repo.set_head("refs/heads/trunk-ish")?;
    repo.find_reference("refs/heads/main")?.delete()?;

    let capture = CaptureDrain::default();
    let gateway = open_gateway(dir.path(), capture.logger())?;
    assert_eq!(gateway.detect_compare_branch(Some("nope"))?, None);
    assert_eq!(capture.count_at(slog::Level::Warning), 1);
    Ok(())
}

#[test]
fn test_detect_compare_branch_falls_back_to_master() -> Result<()> {
    let dir = tempdir()?;
    let repo = init_test_repo(dir.path())?;
    branch_from(&repo, "master", "main")?;
    repo.set_head("refs/heads/master")?;
    repo.find_reference("refs/heads/main")?.delete()?;

    let gateway = open_gateway(dir.path(), discard_logger())?;
    assert_eq!(gateway.detect_compare_branch(None)?.as_deref(), Some("master"));
    Ok(())
}

#[test]
fn test_subprocess_backend_matches_git2() -> Result<()> {
    let dir = tempdir()?;
    let repo = init_test_repo(dir.path())?;
    commit_at(&repo, "feature", "One", Utc::now() - Duration::days(3))?;
    branch_from(&repo, "merged", "main")?;

    let git2 = open_gateway(dir.path(), discard_logger())?;
    let cli = GitGateway::with_backend(Box::new(SubprocessBackend::open(dir.path())?), discard_logger());

    assert_eq!(git2.list_local_pointers()?, cli.list_local_pointers()?);
    assert_eq!(git2.current_branch()?, cli.current_branch()?);
    assert_eq!(
        git2.get_latest_commit("refs/heads/feature")?,
        cli.get_latest_commit("refs/heads/feature")?
    );
    assert_eq!(
        git2.ahead_behind_count("main", "refs/heads/feature"),
        cli.ahead_behind_count("main", "refs/heads/feature")
    );
    assert_eq!(
        git2.is_ancestor_merged("refs/heads/merged", "main")?,
        cli.is_ancestor_merged("refs/heads/merged", "main")?
    );

    let tip = head_oid(&repo)?;
    cli.create_pointer("refs/branchbin/trash/cli", &tip, "test")?;
    assert!(cli.create_pointer("refs/branchbin/trash/cli", &tip, "test").is_err());
    assert_eq!(git2.find_pointer("refs/branchbin/trash/cli")?, Some(tip));
    cli.delete_pointer("refs/branchbin/trash/cli")?;
    cli.delete_pointer("refs/branchbin/trash/cli")?;
    assert!(!git2.pointer_exists("refs/branchbin/trash/cli")?);
    Ok(())
}

#[test]
fn test_subprocess_backend_matches_git2_on_upstreams() -> Result<()> {
    let dir = tempdir()?;
    let repo = init_test_repo(dir.path())?;
    add_remote(dir.path(), "origin")?;
    let tip = repo.head()?.peel_to_commit()?.id();

    repo.reference("refs/remotes/origin/synced", tip, false, "test")?;
    branch_from(&repo, "synced", "main")?;
    set_upstream_config(dir.path(), "synced", "origin", "refs/heads/synced")?;

    repo.reference("refs/remotes/origin/ahead", tip, false, "test")?;
    commit_at(&repo, "ahead", "Local work", Utc::now())?;
    set_upstream_config(dir.path(), "ahead", "origin", "refs/heads/ahead")?;

    branch_from(&repo, "orphan", "main")?;
    set_upstream_config(dir.path(), "orphan", "origin", "refs/heads/deleted-upstream")?;
    branch_from(&repo, "untracked", "main")?;

    repo.reference_symbolic("refs/remotes/origin/HEAD", "refs/remotes/origin/synced", false, "test")?;

    let git2 = open_gateway(dir.path(), discard_logger())?;
    let cli = GitGateway::with_backend(Box::new(SubprocessBackend::open(dir.path())?), discard_logger());

    for branch in ["synced", "ahead", "orphan", "untracked"] {
        assert_eq!(git2.upstream_status(branch)?, cli.upstream_status(branch)?, "{}", branch);
    }
    assert_eq!(
        cli.upstream_status("ahead")?.map(|u| u.track),
        Some(UpstreamTrack::Ahead { ahead: 1 })
    );
    assert_eq!(
        cli.upstream_status("orphan")?.map(|u| u.track),
        Some(UpstreamTrack::Gone)
    );

    // The symbolic origin/HEAD is skipped by both
    let remotes = cli.list_remote_pointers()?;
    assert_eq!(remotes, git2.list_remote_pointers()?);
    let names: Vec<&str> = remotes.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["origin/ahead", "origin/synced"]);
    assert_eq!(
        cli.list_pointers("refs/remotes/")?.len(),
        git2.list_pointers("refs/remotes/")?.len()
    );
    Ok(())
}

#[test]
fn test_subprocess_backend_matches_git2_on_blobs_and_updates() -> Result<()> {
    let dir = tempdir()?;
    let repo = init_test_repo(dir.path())?;
    let first = head_oid(&repo)?;
    let second = Oid::from(commit_at(&repo, "feature", "Work", Utc::now())?);

    let git2 = open_gateway(dir.path(), discard_logger())?;
    let cli = GitGateway::with_backend(Box::new(SubprocessBackend::open(dir.path())?), discard_logger());

    let content = b"2026-06-01T12:00:00+00:00";
    let from_cli = cli.write_blob(content)?;
    let from_git2 = git2.write_blob(content)?;
    assert_eq!(from_cli, from_git2);
    assert_eq!(git2.read_blob(&from_cli)?, content);
    assert_eq!(cli.read_blob(&from_git2)?, content);

    // update creates, then overwrites
    cli.update_pointer("refs/branchbin/trashed-at/x", &first, "test")?;
    assert_eq!(git2.find_pointer("refs/branchbin/trashed-at/x")?, Some(first));
    cli.update_pointer("refs/branchbin/trashed-at/x", &second, "test")?;
    assert_eq!(git2.find_pointer("refs/branchbin/trashed-at/x")?, Some(second.clone()));
    assert_eq!(cli.find_pointer("refs/branchbin/trashed-at/x")?, Some(second));
    Ok(())
}

#[test]
fn test_checked_out_branches_include_linked_worktrees() -> Result<()> {
    let dir = tempdir()?;
    let wt_root = tempdir()?;
    let repo = init_test_repo(dir.path())?;
    branch_from(&repo, "feature", "main")?;
    branch_from(&repo, "idle", "main")?;

    let git2 = open_gateway(dir.path(), discard_logger())?;
    assert_eq!(git2.checked_out_branches()?, vec!["main".to_string()]);

    add_worktree(&repo, "wt", &wt_root.path().join("wt"), "feature")?;
    let cli = GitGateway::with_backend(Box::new(SubprocessBackend::open(dir.path())?), discard_logger());

    let expected = vec!["feature".to_string(), "main".to_string()];
    assert_eq!(git2.checked_out_branches()?, expected);
    assert_eq!(cli.checked_out_branches()?, expected);

    // Seen the same way from inside the linked worktree
    let inside = open_gateway(&wt_root.path().join("wt"), discard_logger())?;
    assert_eq!(inside.current_branch()?.as_deref(), Some("feature"));
    assert_eq!(inside.checked_out_branches()?, expected);
    Ok(())
}
