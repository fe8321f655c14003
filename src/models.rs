//! Branch and trash records handed to front ends.
//!
//! Records are snapshots: they are rebuilt from git on every request and
//! must not be trusted after any mutating operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which ref namespace a branch lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchKind {
    /// `refs/heads/*`
    Local,
    /// `refs/remotes/*`
    Remote,
}

/// Relationship of a local branch to its configured upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum UpstreamTrack {
    /// No upstream configured (or not computed, for remote branches)
    #[default]
    #[serde(rename = "none")]
    NoUpstream,
    InSync,
    Ahead { ahead: u32 },
    Behind { behind: u32 },
    Diverged { ahead: u32, behind: u32 },
    /// Upstream configured but its ref no longer exists
    Gone,
}

impl UpstreamTrack {
    /// Classify ahead/behind counts of a branch relative to its upstream
    pub fn from_counts(ahead: u32, behind: u32) -> Self {
        match (ahead, behind) {
            (0, 0) => Self::InSync,
            (a, 0) => Self::Ahead { ahead: a },
            (0, b) => Self::Behind { behind: b },
            (a, b) => Self::Diverged { ahead: a, behind: b },
        }
    }
}

/// One local or remote-tracking branch at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchRecord {
    /// Short name, unique within its namespace ("feature", "origin/feature")
    pub name: String,
    /// Fully qualified ref ("refs/heads/feature")
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub is_current: bool,
    pub kind: BranchKind,
    pub last_commit_hash: String,
    pub last_commit_date: DateTime<Utc>,
    pub last_commit_message: String,
    pub last_commit_author: Option<String>,
    /// Merged into the compare branch; None when not computed (remote, current)
    pub is_merged: Option<bool>,
    pub is_stale: bool,
    pub stale_days: u32,
    pub upstream_branch: Option<String>,
    pub upstream_track: UpstreamTrack,
    /// Commits on this branch not on the compare branch
    pub ahead_by: Option<u32>,
    /// Commits on the compare branch not on this branch
    pub behind_by: Option<u32>,
}

impl BranchRecord {
    pub fn is_local(&self) -> bool {
        self.kind == BranchKind::Local
    }

    pub fn is_remote(&self) -> bool {
        self.kind == BranchKind::Remote
    }

    /// Merged, treating "not computed" as unmerged
    pub fn merged(&self) -> bool {
        self.is_merged == Some(true)
    }
}

/// A trashed branch: the record read from its trash ref plus when it was trashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashEntry {
    #[serde(flatten)]
    pub branch: BranchRecord,
    pub deletion_date: DateTime<Utc>,
}

/// Where a branch name currently lives.
///
/// Live and trash pointers for the same name are not a state: the store
/// reports that combination as an anomaly or a conflict instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchState {
    Live,
    InTrash,
    Absent,
}

/// What a batch operation does to its branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Move a live branch to the trash
    Trash,
    /// Move a trashed branch back to the live namespace
    Restore,
    /// Permanently delete a trash entry
    Prune,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trash => write!(f, "trash"),
            Self::Restore => write!(f, "restore"),
            Self::Prune => write!(f, "prune"),
        }
    }
}

/// One step of a batch. Built per batch, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchOperation {
    pub kind: OperationKind,
    pub branch: BranchRecord,
}

impl BranchOperation {
    pub fn trash(branch: BranchRecord) -> Self {
        Self {
            kind: OperationKind::Trash,
            branch,
        }
    }

    pub fn restore(branch: BranchRecord) -> Self {
        Self {
            kind: OperationKind::Restore,
            branch,
        }
    }

    pub fn prune(branch: BranchRecord) -> Self {
        Self {
            kind: OperationKind::Prune,
            branch,
        }
    }
}
