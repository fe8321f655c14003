use std::{path::PathBuf, result::Result as StdResult};
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = StdResult<T, EngineError>;

/// Errors surfaced by the branch engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The path is not inside a git repository. Fatal for the session.
    #[error("Not a git repository: {}", path.display())]
    NotARepository {
        /// Path that was opened.
        path: PathBuf,
    },

    /// A git plumbing call failed (process, IO, lock contention, unknown ref).
    #[error("Git error: {reason}")]
    Gateway {
        /// Human-readable failure description.
        reason: String,
    },

    /// Restore or prune of a name with no trash entry.
    #[error("No trash entry for branch '{name}'")]
    NotFoundInTrash {
        /// Branch name.
        name: String,
    },

    /// Trash of a name with no live branch.
    #[error("Branch '{name}' does not exist")]
    BranchNotFound {
        /// Branch name.
        name: String,
    },

    /// The branch is protected by configuration.
    #[error("Branch '{name}' is protected and cannot be trashed")]
    ExcludedBranch {
        /// Branch name.
        name: String,
    },

    /// The branch is checked out, here or in a linked worktree.
    #[error("Branch '{name}' is checked out and cannot be trashed")]
    CurrentBranchProtected {
        /// Branch name.
        name: String,
    },

    /// A different, earlier-trashed branch already holds this name in the trash.
    #[error("Trash already holds a different branch named '{name}'; restore or prune it first")]
    TrashSlotOccupied {
        /// Branch name.
        name: String,
    },

    /// Restoring would overwrite a live branch that points elsewhere.
    #[error("A live branch named '{name}' already exists at a different commit")]
    LiveBranchExists {
        /// Branch name.
        name: String,
    },

    /// The second step of a trash or restore failed after the first succeeded.
    #[error("Branch '{name}' may exist in two places, please verify manually ({reason})")]
    PartialTrashAnomaly {
        /// Branch name.
        name: String,
        /// Failure of the step that did not complete.
        reason: String,
    },

    /// User input does not form a valid branch name.
    #[error("Invalid branch name: '{name}'")]
    InvalidBranchName {
        /// Rejected input.
        name: String,
    },

    /// Unknown filter preset name.
    #[error("Unknown filter preset: '{name}' (expected all, merged, stale or unmerged)")]
    UnknownFilterPreset {
        /// Rejected preset name.
        name: String,
    },

    /// Configuration could not be loaded or saved.
    #[error("Config error: {message}")]
    Config {
        /// Human-readable error description.
        message: String,
    },
}

impl EngineError {
    /// Build a gateway error from a backend failure, keeping the context chain.
    pub(crate) fn gateway(err: anyhow::Error) -> Self {
        Self::Gateway {
            reason: format!("{:#}", err),
        }
    }

    /// Whether the session cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NotARepository { .. })
    }

    /// Whether this is a policy rejection that never touched any ref.
    pub fn is_policy_rejection(&self) -> bool {
        matches!(
            self,
            Self::ExcludedBranch { .. } | Self::CurrentBranchProtected { .. }
        )
    }

    /// Whether the ref namespace may now hold the branch twice.
    pub fn is_anomaly(&self) -> bool {
        matches!(self, Self::PartialTrashAnomaly { .. })
    }
}
