//! Turns raw branch pointers into classified `BranchRecord`s.
//!
//! Classification never mutates the repository. A failure computing the
//! merge state of one branch is logged and leaves that branch with
//! conservative defaults; it never aborts the snapshot.

use chrono::{DateTime, Utc};
use slog::{debug, warn, Logger};

use crate::config::GitConfig;
use crate::error::Result;
use crate::git_backend::CommitInfo;
use crate::git_gateway::{BranchPointer, GitGateway};
use crate::models::{BranchKind, BranchRecord, UpstreamTrack};

/// Whole days between `date` and `now`; future dates count as zero
pub fn stale_days(date: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let days = (now - date).num_days().max(0);
    u32::try_from(days).unwrap_or(u32::MAX)
}

/// Record with everything that needs no history walk filled in.
///
/// Merge state and compare counts start as "not computed".
pub(crate) fn base_record(
    pointer: &BranchPointer,
    kind: BranchKind,
    commit: &CommitInfo,
    config: &GitConfig,
    now: DateTime<Utc>,
) -> BranchRecord {
    let days = stale_days(commit.date, now);
    BranchRecord {
        name: pointer.name.clone(),
        ref_name: pointer.ref_name.clone(),
        is_current: false,
        kind,
        last_commit_hash: commit.hash.to_string(),
        last_commit_date: commit.date,
        last_commit_message: commit.message.clone(),
        last_commit_author: commit.author.clone(),
        is_merged: None,
        is_stale: days > config.stale_days_threshold,
        stale_days: days,
        upstream_branch: None,
        upstream_track: UpstreamTrack::NoUpstream,
        ahead_by: None,
        behind_by: None,
    }
}

/// Builds branch records from the gateway's view of the repository.
pub struct BranchClassifier<'a> {
    gateway: &'a GitGateway,
    config: &'a GitConfig,
    log: Logger,
}

impl<'a> BranchClassifier<'a> {
    pub fn new(gateway: &'a GitGateway, config: &'a GitConfig, log: Logger) -> Self {
        Self { gateway, config, log }
    }

    /// Classify every local branch, and remote-tracking branches if asked
    pub fn classify(&self, include_remote: bool) -> Result<Vec<BranchRecord>> {
        self.classify_at(include_remote, Utc::now())
    }

    /// Classify relative to a fixed clock
    pub fn classify_at(&self, include_remote: bool, now: DateTime<Utc>) -> Result<Vec<BranchRecord>> {
        let current = self.gateway.current_branch()?;
        let compare = self
            .gateway
            .detect_compare_branch(self.config.merge_compare_branch.as_deref())?;
        if compare.is_none() {
            debug!(self.log, "no compare branch; merge state not computed");
        }

        let mut records = Vec::new();

        for pointer in self.gateway.list_local_pointers()? {
            let Some(mut record) = self.record_for(&pointer, BranchKind::Local, now) else {
                continue;
            };
            record.is_current = current.as_deref() == Some(pointer.name.as_str());
            self.enrich_local(&mut record, compare.as_deref());
            records.push(record);
        }

        if include_remote {
            for pointer in self.gateway.list_remote_pointers()? {
                if let Some(record) = self.record_for(&pointer, BranchKind::Remote, now) {
                    records.push(record);
                }
            }
        }

        Ok(records)
    }

    /// Base record for a pointer, or None if its commit can't be read
    fn record_for(&self, pointer: &BranchPointer, kind: BranchKind, now: DateTime<Utc>) -> Option<BranchRecord> {
        match self.gateway.get_latest_commit(&pointer.ref_name) {
            Ok(Some(commit)) => Some(base_record(pointer, kind, &commit, self.config, now)),
            Ok(None) => {
                debug!(self.log, "dropping branch without a readable commit"; "ref" => &pointer.ref_name);
                None
            }
            Err(e) => {
                warn!(self.log, "failed to read branch commit, skipping"; "ref" => &pointer.ref_name, "error" => %e);
                None
            }
        }
    }

    fn enrich_local(&self, record: &mut BranchRecord, compare: Option<&str>) {
        match self.gateway.upstream_status(&record.name) {
            Ok(Some(upstream)) => {
                record.upstream_branch = Some(upstream.name);
                record.upstream_track = upstream.track;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(self.log, "failed to read upstream"; "branch" => &record.name, "error" => %e);
            }
        }

        // The checked out branch is never a removal candidate
        if record.is_current {
            return;
        }

        record.is_merged = Some(false);
        let Some(compare) = compare else {
            return;
        };

        match self.gateway.is_ancestor_merged(&record.ref_name, compare) {
            Ok(merged) => {
                record.is_merged = Some(merged);
                if let Some((ahead, behind)) = self.gateway.ahead_behind_count(compare, &record.ref_name) {
                    record.ahead_by = Some(ahead);
                    record.behind_by = Some(behind);
                }
            }
            Err(e) => {
                warn!(self.log, "failed to compute merge state"; "branch" => &record.name, "compare" => compare, "error" => %e);
            }
        }
    }
}
