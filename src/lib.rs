//! branchbin: a branch lifecycle and trash engine for git repositories.
//!
//! Branches are classified (merged, stale, upstream tracking) into
//! snapshots that can be filtered and searched, and can be moved into a
//! private trash namespace instead of being deleted outright. Trashed
//! branches are restorable until they are pruned or expire.
//!
//! ```no_run
//! use branchbin::{BranchEngine, ConfigLoader, logging};
//!
//! # fn main() -> branchbin::Result<()> {
//! let log = logging::terminal_logger();
//! let loader = ConfigLoader::for_git_dir(std::path::Path::new(".git"));
//! let engine = BranchEngine::open(".", loader.load(), log)?;
//!
//! let records = engine.snapshot(false)?;
//! let merged = engine.filter(&records, &engine.apply_filter_preset("merged")?);
//! for record in &merged {
//!     println!("{} ({} days)", record.name, record.stale_days);
//! }
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod git_backend;
pub mod git_gateway;
pub mod logging;
pub mod models;
pub mod names;
pub mod operation_log;
pub mod query;
pub mod trash_store;

#[cfg(test)]
mod test_support;

pub use batch::{BatchExecutor, BatchReport, OperationOutcome};
pub use classifier::BranchClassifier;
pub use config::{ConfigLoader, GitConfig};
pub use engine::BranchEngine;
pub use error::{EngineError, Result};
pub use git_gateway::GitGateway;
pub use models::{BranchKind, BranchOperation, BranchRecord, BranchState, OperationKind, TrashEntry, UpstreamTrack};
pub use names::normalize_branch_name;
pub use operation_log::{LogEntry, Operation, OperationLog};
pub use query::{BranchFilterOptions, FilterPreset};
pub use trash_store::{CleanupReport, TrashLockGuard, TrashStore};
