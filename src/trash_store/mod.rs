//! TrashStore provides soft-delete for branches using a private ref namespace.
//!
//! A trashed branch is stored as:
//!   refs/branchbin/trash/<branch> -> the branch's last commit
//!
//! and the moment it was trashed as:
//!   refs/branchbin/trashed-at/<branch> -> blob containing an RFC 3339 time
//!
//! The trash namespace is disjoint from `refs/heads/`, so git never shows
//! trashed branches as branches, yet their commits stay reachable and are
//! not garbage collected.
//!
//! Moving a branch in or out of the trash takes two ref updates that git
//! cannot apply atomically. The order is fixed so the commit is never
//! unreferenced: the destination pointer is always written before the
//! source pointer is removed. If the removal fails the name exists in both
//! namespaces and the caller gets `PartialTrashAnomaly`; no automatic
//! repair is attempted.

mod lock;


pub use lock::TrashLockGuard;

use chrono::{DateTime, Duration, Utc};
use slog::{debug, error, info, warn, Logger};

use crate::classifier::base_record;
use crate::config::GitConfig;
use crate::error::{EngineError, Result};
use crate::git_backend::Oid;
use crate::git_gateway::{BranchPointer, GitGateway, LOCAL_PREFIX};
use crate::models::{BranchKind, BranchState, TrashEntry};

/// Prefix for trash pointers
pub const TRASH_REF_PREFIX: &str = "refs/branchbin/trash/";
/// Prefix for trashing-time stamps
pub const STAMP_REF_PREFIX: &str = "refs/branchbin/trashed-at/";

/// Full ref of a live branch
pub fn live_ref(name: &str) -> String {
    format!("{}{}", LOCAL_PREFIX, name)
}

/// Full ref of a trash entry
pub fn trash_ref(name: &str) -> String {
    format!("{}{}", TRASH_REF_PREFIX, name)
}

/// Full ref of a trash entry's stamp
pub fn stamp_ref(name: &str) -> String {
    format!("{}{}", STAMP_REF_PREFIX, name)
}

/// Outcome of a TTL sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Entries permanently removed
    pub expired: Vec<String>,
    /// Expired entries that could not be removed; retried on the next sweep
    pub failed: Vec<String>,
    /// Stamps without a matching trash pointer that were removed
    pub orphan_stamps: usize,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.failed.is_empty() && self.orphan_stamps == 0
    }
}

/// Manages the trash namespace through a GitGateway.
pub struct TrashStore<'a> {
    gateway: &'a GitGateway,
    config: &'a GitConfig,
    log: Logger,
}

impl<'a> TrashStore<'a> {
    pub fn new(gateway: &'a GitGateway, config: &'a GitConfig, log: Logger) -> Self {
        Self { gateway, config, log }
    }

    /// Acquire an exclusive lock on the trash store.
    ///
    /// Hold the guard across a sequence of moves to keep other processes
    /// from interleaving with it. The lock is released on drop.
    pub fn lock(&self) -> Result<TrashLockGuard> {
        TrashLockGuard::acquire(self.gateway.git_dir()).map_err(EngineError::gateway)
    }

    /// Try to acquire the lock without blocking; None if another process holds it
    pub fn try_lock(&self) -> Result<Option<TrashLockGuard>> {
        TrashLockGuard::try_acquire(self.gateway.git_dir()).map_err(EngineError::gateway)
    }

    /// Where a branch name currently lives.
    ///
    /// A name present in both namespaces is reported as an error:
    /// `PartialTrashAnomaly` when both pointers agree (an interrupted move),
    /// `TrashSlotOccupied` when they point at different commits.
    pub fn state_of(&self, name: &str) -> Result<BranchState> {
        let live = self.gateway.find_pointer(&live_ref(name))?;
        let trash = self.gateway.find_pointer(&trash_ref(name))?;

        match (live, trash) {
            (Some(l), Some(t)) => Err(self.conflict(name, &l, &t)),
            (Some(_), None) => Ok(BranchState::Live),
            (None, Some(_)) => Ok(BranchState::InTrash),
            (None, None) => Ok(BranchState::Absent),
        }
    }

    fn conflict(&self, name: &str, live: &Oid, trash: &Oid) -> EngineError {
        if live == trash {
            EngineError::PartialTrashAnomaly {
                name: name.to_string(),
                reason: "live and trash pointers both exist".to_string(),
            }
        } else {
            EngineError::TrashSlotOccupied { name: name.to_string() }
        }
    }

    /// Move a live branch to the trash, returning the commit it pointed at
    pub fn move_to_trash(&self, name: &str) -> Result<Oid> {
        self.move_to_trash_at(name, Utc::now())
    }

    /// Move a live branch to the trash, stamping it with `now`.
    ///
    /// Policy checks run before any ref is touched. A branch checked out in
    /// any worktree counts as current.
    pub fn move_to_trash_at(&self, name: &str, now: DateTime<Utc>) -> Result<Oid> {
        if self.config.is_excluded(name) {
            return Err(EngineError::ExcludedBranch { name: name.to_string() });
        }
        // Linked worktrees count, not just our HEAD
        if self.gateway.checked_out_branches()?.iter().any(|b| b == name) {
            return Err(EngineError::CurrentBranchProtected { name: name.to_string() });
        }

        let live_name = live_ref(name);
        let trash_name = trash_ref(name);

        let target = match self.gateway.find_pointer(&live_name)? {
            Some(target) => target,
            None => return Err(EngineError::BranchNotFound { name: name.to_string() }),
        };
        if let Some(existing) = self.gateway.find_pointer(&trash_name)? {
            return Err(self.conflict(name, &target, &existing));
        }

        // Step 1: trash pointer. Fails without side effects if the slot was taken meanwhile.
        self.gateway
            .create_pointer(&trash_name, &target, &format!("branchbin: trash {}", name))?;

        self.write_stamp(name, now);

        // Step 2: live pointer
        if let Err(e) = self.gateway.delete_pointer(&live_name) {
            error!(self.log, "branch left in both live and trash namespaces";
                "branch" => name, "target" => %target, "error" => %e);
            return Err(EngineError::PartialTrashAnomaly {
                name: name.to_string(),
                reason: e.to_string(),
            });
        }

        info!(self.log, "moved branch to trash"; "branch" => name, "target" => %target);
        Ok(target)
    }

    /// Record the trashing time. Best-effort: the commit date stands in when missing.
    fn write_stamp(&self, name: &str, now: DateTime<Utc>) {
        let result = self
            .gateway
            .write_blob(now.to_rfc3339().as_bytes())
            .and_then(|blob| {
                self.gateway
                    .update_pointer(&stamp_ref(name), &blob, &format!("branchbin: stamp {}", name))
            });
        if let Err(e) = result {
            warn!(self.log, "failed to record trash time"; "branch" => name, "error" => %e);
        }
    }

    /// Move a trashed branch back to `refs/heads/`, returning its commit
    pub fn restore_from_trash(&self, name: &str) -> Result<Oid> {
        let live_name = live_ref(name);
        let trash_name = trash_ref(name);

        // Step 1: verify
        let target = match self.gateway.find_pointer(&trash_name)? {
            Some(target) => target,
            None => return Err(EngineError::NotFoundInTrash { name: name.to_string() }),
        };

        // Step 2: live pointer
        let msg = format!("branchbin: restore {}", name);
        match self.gateway.find_pointer(&live_name)? {
            None => self.gateway.create_pointer(&live_name, &target, &msg)?,
            // Left over from an interrupted move; finishing the restore resolves it
            Some(live) if live == target => self.gateway.update_pointer(&live_name, &target, &msg)?,
            Some(_) => return Err(EngineError::LiveBranchExists { name: name.to_string() }),
        }

        // Step 3: trash pointer
        if let Err(e) = self.gateway.delete_pointer(&trash_name) {
            error!(self.log, "branch left in both live and trash namespaces";
                "branch" => name, "target" => %target, "error" => %e);
            return Err(EngineError::PartialTrashAnomaly {
                name: name.to_string(),
                reason: e.to_string(),
            });
        }
        self.remove_stamp(name);

        info!(self.log, "restored branch from trash"; "branch" => name, "target" => %target);
        Ok(target)
    }

    /// Permanently delete a trash entry, returning the commit it held
    pub fn prune(&self, name: &str) -> Result<Oid> {
        let trash_name = trash_ref(name);
        let target = match self.gateway.find_pointer(&trash_name)? {
            Some(target) => target,
            None => return Err(EngineError::NotFoundInTrash { name: name.to_string() }),
        };

        self.gateway.delete_pointer(&trash_name)?;
        self.remove_stamp(name);

        info!(self.log, "pruned trash entry"; "branch" => name, "target" => %target);
        Ok(target)
    }

    fn remove_stamp(&self, name: &str) {
        if let Err(e) = self.gateway.delete_pointer(&stamp_ref(name)) {
            // An orphaned stamp is swept by the next cleanup
            warn!(self.log, "failed to remove trash stamp"; "branch" => name, "error" => %e);
        }
    }

    /// Every trash entry, most recently trashed first
    pub fn list_trash(&self) -> Result<Vec<TrashEntry>> {
        self.list_trash_at(Utc::now())
    }

    /// Every trash entry, with staleness measured against `now`
    pub fn list_trash_at(&self, now: DateTime<Utc>) -> Result<Vec<TrashEntry>> {
        let mut entries = Vec::new();

        for (ref_name, target) in self.gateway.list_pointers(TRASH_REF_PREFIX)? {
            let pointer = BranchPointer {
                name: ref_name[TRASH_REF_PREFIX.len()..].to_string(),
                ref_name,
                target,
            };
            let commit = match self.gateway.get_latest_commit(&pointer.ref_name) {
                Ok(Some(commit)) => commit,
                Ok(None) => {
                    debug!(self.log, "skipping trash entry without a commit"; "ref" => &pointer.ref_name);
                    continue;
                }
                Err(e) => {
                    warn!(self.log, "failed to read trash entry"; "ref" => &pointer.ref_name, "error" => %e);
                    continue;
                }
            };

            let deletion_date = self.deletion_date(&pointer.name).unwrap_or(commit.date);
            entries.push(TrashEntry {
                branch: base_record(&pointer, BranchKind::Local, &commit, self.config, now),
                deletion_date,
            });
        }

        entries.sort_by(|a, b| {
            b.deletion_date
                .cmp(&a.deletion_date)
                .then_with(|| a.branch.name.cmp(&b.branch.name))
        });
        Ok(entries)
    }

    /// Trashing time from the stamp, if one exists and parses
    fn deletion_date(&self, name: &str) -> Option<DateTime<Utc>> {
        let read = || -> Result<Option<DateTime<Utc>>> {
            let Some(blob) = self.gateway.find_pointer(&stamp_ref(name))? else {
                return Ok(None);
            };
            let content = self.gateway.read_blob(&blob)?;
            Ok(std::str::from_utf8(&content)
                .ok()
                .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
                .map(|dt| dt.with_timezone(&Utc)))
        };

        match read() {
            Ok(date) => date,
            Err(e) => {
                debug!(self.log, "unreadable trash stamp, using commit date"; "branch" => name, "error" => %e);
                None
            }
        }
    }

    /// Permanently delete every entry older than the TTL
    pub fn cleanup_expired(&self) -> CleanupReport {
        self.cleanup_expired_at(Utc::now())
    }

    /// TTL sweep relative to a fixed clock.
    ///
    /// An entry expires when strictly more than `trash_ttl_days` have passed
    /// since it was trashed. Failures are logged and skipped per entry; the
    /// sweep itself never fails.
    pub fn cleanup_expired_at(&self, now: DateTime<Utc>) -> CleanupReport {
        let mut report = CleanupReport::default();
        let ttl = Duration::days(i64::from(self.config.trash_ttl_days));

        let entries = match self.list_trash_at(now) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(self.log, "trash cleanup skipped"; "error" => %e);
                return report;
            }
        };

        for entry in entries {
            let name = &entry.branch.name;
            if now - entry.deletion_date <= ttl {
                continue;
            }
            match self.gateway.delete_pointer(&trash_ref(name)) {
                Ok(()) => {
                    self.remove_stamp(name);
                    info!(self.log, "expired trash entry removed";
                        "branch" => name.as_str(), "deleted_at" => %entry.deletion_date);
                    report.expired.push(name.clone());
                }
                Err(e) => {
                    warn!(self.log, "failed to remove expired trash entry"; "branch" => name.as_str(), "error" => %e);
                    report.failed.push(name.clone());
                }
            }
        }

        report.orphan_stamps = self.sweep_orphan_stamps();
        report
    }

    /// Remove stamps whose trash pointer is gone
    fn sweep_orphan_stamps(&self) -> usize {
        let stamps = match self.gateway.list_pointers(STAMP_REF_PREFIX) {
            Ok(stamps) => stamps,
            Err(e) => {
                warn!(self.log, "failed to list trash stamps"; "error" => %e);
                return 0;
            }
        };

        let mut removed = 0;
        for (ref_name, _) in stamps {
            let name = &ref_name[STAMP_REF_PREFIX.len()..];
            match self.gateway.pointer_exists(&trash_ref(name)) {
                Ok(true) => {}
                Ok(false) => match self.gateway.delete_pointer(&ref_name) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(self.log, "failed to remove orphaned stamp"; "ref" => &ref_name, "error" => %e),
                },
                Err(e) => warn!(self.log, "failed to check trash entry"; "ref" => &ref_name, "error" => %e),
            }
        }
        removed
    }
}
