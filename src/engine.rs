//! The engine facade embedding applications talk to.
//!
//! `BranchEngine` owns the gateway and the session configuration and hands
//! out short-lived classifiers, stores and executors per call. Nothing is
//! cached between calls: every snapshot is rebuilt from git.

use chrono::{DateTime, Utc};
use slog::{debug, info, warn, Logger};
use std::path::Path;

use crate::batch::{BatchExecutor, BatchReport};
use crate::classifier::BranchClassifier;
use crate::config::GitConfig;
use crate::error::{EngineError, Result};
use crate::git_backend::Oid;
use crate::git_gateway::GitGateway;
use crate::models::{BranchOperation, BranchRecord, BranchState, TrashEntry};
use crate::names;
use crate::operation_log::{LogEntry, Operation, OperationLog};
use crate::query::{self, BranchFilterOptions};
use crate::trash_store::{CleanupReport, TrashLockGuard, TrashStore};

/// Branch lifecycle and trash engine for one repository.
pub struct BranchEngine {
    gateway: GitGateway,
    config: GitConfig,
    history: OperationLog,
    log: Logger,
}

impl BranchEngine {
    /// Open the repository containing `path`.
    ///
    /// Fails with `NotARepository` when `path` is not inside a git work tree.
    pub fn open<P: AsRef<Path>>(path: P, config: GitConfig, log: Logger) -> Result<Self> {
        let gateway = GitGateway::open(path, log.clone())?;
        Ok(Self::new(gateway, config, log))
    }

    /// Engine over an existing gateway
    pub fn new(gateway: GitGateway, config: GitConfig, log: Logger) -> Self {
        let history = OperationLog::for_git_dir(gateway.git_dir());
        info!(log, "branch engine ready";
            "git_dir" => %gateway.git_dir().display(), "format" => ?gateway.ref_format());
        Self {
            gateway,
            config,
            history,
            log,
        }
    }

    pub fn config(&self) -> &GitConfig {
        &self.config
    }

    pub fn gateway(&self) -> &GitGateway {
        &self.gateway
    }

    /// Log of completed trash operations
    pub fn history(&self) -> &OperationLog {
        &self.history
    }

    fn store(&self) -> TrashStore<'_> {
        TrashStore::new(&self.gateway, &self.config, self.log.new(slog::o!("component" => "trash")))
    }

    /// Fresh, sorted records for every local branch (and remote-tracking
    /// branches when `include_remote`)
    pub fn snapshot(&self, include_remote: bool) -> Result<Vec<BranchRecord>> {
        self.snapshot_at(include_remote, Utc::now())
    }

    /// Snapshot relative to a fixed clock
    pub fn snapshot_at(&self, include_remote: bool, now: DateTime<Utc>) -> Result<Vec<BranchRecord>> {
        let classifier = BranchClassifier::new(
            &self.gateway,
            &self.config,
            self.log.new(slog::o!("component" => "classifier")),
        );
        let mut records = classifier.classify_at(include_remote, now)?;
        query::sort(&mut records);
        debug!(self.log, "snapshot built"; "branches" => records.len());
        Ok(records)
    }

    /// Every trash entry, most recently trashed first
    pub fn list_trash(&self) -> Result<Vec<TrashEntry>> {
        self.store().list_trash()
    }

    /// Where a branch name currently lives
    pub fn state_of(&self, name: &str) -> Result<BranchState> {
        self.store().state_of(name)
    }

    /// Filter options of a named preset
    pub fn apply_filter_preset(&self, name: &str) -> Result<BranchFilterOptions> {
        query::apply_filter_preset(name)
    }

    pub fn filter(&self, records: &[BranchRecord], options: &BranchFilterOptions) -> Vec<BranchRecord> {
        query::filter(records, options)
    }

    pub fn search(&self, records: &[BranchRecord], query: &str) -> Vec<BranchRecord> {
        query::search(records, query)
    }

    /// Run a batch in order, reporting each failure to `on_error`.
    ///
    /// Holds the trash lock for the whole batch, so it must not be called
    /// while the caller holds a guard from `lock()`.
    pub fn execute_batch<F>(&self, operations: Vec<BranchOperation>, on_error: F) -> BatchReport
    where
        F: FnMut(&BranchOperation, &EngineError),
    {
        let store = self.store();
        BatchExecutor::new(&store, self.log.new(slog::o!("component" => "batch")))
            .with_history(&self.history)
            .run(operations, on_error)
    }

    /// Remove trash entries older than the TTL. Never fails.
    pub fn cleanup_expired(&self) -> CleanupReport {
        self.cleanup_expired_at(Utc::now())
    }

    /// TTL sweep relative to a fixed clock.
    ///
    /// Skipped when another process holds the trash lock; the next call
    /// catches up.
    pub fn cleanup_expired_at(&self, now: DateTime<Utc>) -> CleanupReport {
        let store = self.store();
        let _lock = match store.try_lock() {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                debug!(self.log, "trash store busy, cleanup skipped");
                return CleanupReport::default();
            }
            Err(e) => {
                warn!(self.log, "trash cleanup skipped"; "error" => %e);
                return CleanupReport::default();
            }
        };

        let report = store.cleanup_expired_at(now);
        for name in &report.expired {
            self.record(Operation::TrashExpired { branch: name.clone() });
        }
        report
    }

    /// Normalize user input into a branch name
    pub fn normalize_branch_name(&self, input: &str) -> Result<String> {
        names::normalize_branch_name(input)
    }

    /// Acquire the cross-process trash lock for a sequence of single operations
    pub fn lock(&self) -> Result<TrashLockGuard> {
        self.store().lock()
    }

    /// Move one branch to the trash. `name` may be given in any form
    /// `normalize_branch_name` accepts.
    pub fn move_to_trash(&self, name: &str) -> Result<()> {
        let name = names::normalize_branch_name(name)?;
        let target = self.store().move_to_trash(&name)?;
        self.record(Operation::BranchTrashed {
            branch: name,
            target: target.to_string(),
        });
        Ok(())
    }

    /// Move one branch back from the trash
    pub fn restore_from_trash(&self, name: &str) -> Result<()> {
        let name = names::normalize_branch_name(name)?;
        let target = self.store().restore_from_trash(&name)?;
        self.record(Operation::BranchRestored {
            branch: name,
            target: target.to_string(),
        });
        Ok(())
    }

    /// Permanently delete one trash entry
    pub fn prune(&self, name: &str) -> Result<()> {
        let name = names::normalize_branch_name(name)?;
        let target: Oid = self.store().prune(&name)?;
        self.record(Operation::TrashPruned {
            branch: name,
            target: target.to_string(),
        });
        Ok(())
    }

    fn record(&self, operation: Operation) {
        if let Err(e) = self.history.log(LogEntry::new(operation)) {
            warn!(self.log, "failed to write operation log"; "error" => %format!("{:#}", e));
        }
    }
}
