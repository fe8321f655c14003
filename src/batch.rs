//! Sequential execution of trash, restore and prune batches.
//!
//! Operations run one at a time in input order. A failing operation is
//! reported to the caller's sink and recorded; the batch always moves on to
//! the next item and never rolls back earlier ones.

use slog::{info, warn, Logger};

use crate::error::{EngineError, Result};
use crate::git_backend::Oid;
use crate::models::{BranchOperation, OperationKind};
use crate::operation_log::{LogEntry, Operation, OperationLog};
use crate::trash_store::TrashStore;

/// What happened to one operation of a batch.
#[derive(Debug)]
pub struct OperationOutcome {
    pub operation: BranchOperation,
    pub result: Result<()>,
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&EngineError> {
        self.result.as_ref().err()
    }
}

/// One outcome per input operation, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<OperationOutcome>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Human readable tally, e.g. "2 succeeded, 1 failed"
    pub fn summary(&self) -> String {
        format!("{} succeeded, {} failed", self.succeeded(), self.failed())
    }
}

/// Runs batches against a TrashStore.
pub struct BatchExecutor<'s, 'a> {
    store: &'s TrashStore<'a>,
    history: Option<&'s OperationLog>,
    log: Logger,
}

impl<'s, 'a> BatchExecutor<'s, 'a> {
    pub fn new(store: &'s TrashStore<'a>, log: Logger) -> Self {
        Self {
            store,
            history: None,
            log,
        }
    }

    /// Append every successful operation to `history`
    pub fn with_history(mut self, history: &'s OperationLog) -> Self {
        self.history = Some(history);
        self
    }

    /// Run `operations` in order, passing each failure to `on_error`.
    ///
    /// The trash lock is held for the whole batch.
    pub fn run<F>(&self, operations: Vec<BranchOperation>, mut on_error: F) -> BatchReport
    where
        F: FnMut(&BranchOperation, &EngineError),
    {
        let mut report = BatchReport::default();

        let _lock = match self.store.lock() {
            Ok(guard) => guard,
            Err(e) => {
                warn!(self.log, "could not lock trash store, batch not run"; "error" => %e);
                let reason = e.to_string();
                for operation in operations {
                    let err = EngineError::Gateway { reason: reason.clone() };
                    on_error(&operation, &err);
                    report.outcomes.push(OperationOutcome {
                        operation,
                        result: Err(err),
                    });
                }
                return report;
            }
        };

        for operation in operations {
            let result = self.execute(&operation);
            match &result {
                Ok(target) => self.record(&operation, target),
                Err(e) => {
                    warn!(self.log, "batch operation failed";
                        "operation" => %operation.kind, "branch" => &operation.branch.name, "error" => %e);
                    on_error(&operation, e);
                }
            }
            report.outcomes.push(OperationOutcome {
                operation,
                result: result.map(|_| ()),
            });
        }

        info!(self.log, "batch finished"; "succeeded" => report.succeeded(), "failed" => report.failed());
        report
    }

    fn execute(&self, operation: &BranchOperation) -> Result<Oid> {
        let name = &operation.branch.name;
        if operation.branch.is_remote() {
            // Only local branches have a trash slot
            return Err(EngineError::BranchNotFound { name: name.clone() });
        }
        match operation.kind {
            OperationKind::Trash => self.store.move_to_trash(name),
            OperationKind::Restore => self.store.restore_from_trash(name),
            OperationKind::Prune => self.store.prune(name),
        }
    }

    /// Best-effort history entry for a successful operation
    fn record(&self, operation: &BranchOperation, target: &Oid) {
        let Some(history) = self.history else {
            return;
        };
        let branch = operation.branch.name.clone();
        let target = target.to_string();
        let entry = LogEntry::new(match operation.kind {
            OperationKind::Trash => Operation::BranchTrashed { branch, target },
            OperationKind::Restore => Operation::BranchRestored { branch, target },
            OperationKind::Prune => Operation::TrashPruned { branch, target },
        });
        if let Err(e) = history.log(entry) {
            warn!(self.log, "failed to write operation log"; "error" => %format!("{:#}", e));
        }
    }
}
