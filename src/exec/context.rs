//! # Per-Statement Execution Context
//!
//! Every statement runs with one [`ExecutionContext`]: the resolved active
//! branch, a cache of branch lineages, the cancellation flag, and the
//! statement arena. There is no process-wide execution state — anything an
//! operator needs flows through this context.
//!
//! The arena backs hash-join build rows, group-by state, and other
//! statement-scoped scratch; it is dropped (bulk-freeing everything) when
//! the physical root returns from `produce`.

use crate::database::Database;
use crate::error::Error;
use crate::types::BranchId;
use crate::version::Lineage;
use bumpalo::Bump;
use hashbrown::HashMap;
use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct ExecutionContext<'db> {
    pub db: &'db Database,
    /// Active branch of the statement (the DML target's branch; master for
    /// pure queries unless a `VERSION` clause overrides per scan).
    pub branch_id: BranchId,
    lineages: RefCell<HashMap<BranchId, Lineage>>,
    cancel: Arc<AtomicBool>,
    pub arena: Bump,
    pub rows_affected: Cell<u64>,
}

impl<'db> ExecutionContext<'db> {
    pub fn new(db: &'db Database, branch_id: BranchId) -> Self {
        Self::with_cancel(db, branch_id, Arc::new(AtomicBool::new(false)))
    }

    /// Context sharing an externally owned cancellation flag.
    pub fn with_cancel(db: &'db Database, branch_id: BranchId, cancel: Arc<AtomicBool>) -> Self {
        Self {
            db,
            branch_id,
            lineages: RefCell::new(HashMap::new()),
            cancel,
            arena: Bump::new(),
            rows_affected: Cell::new(0),
        }
    }

    /// The lineage of `branch`, cached per statement. The lineage always
    /// begins with `branch` and ends at master.
    pub fn lineage(&self, branch: BranchId) -> Lineage {
        if let Some(lineage) = self.lineages.borrow().get(&branch) {
            return lineage.clone();
        }
        let lineage = self.db.construct_branch_lineage(branch);
        self.lineages
            .borrow_mut()
            .insert(branch, lineage.clone());
        lineage
    }

    /// Shareable handle for requesting cancellation from outside.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Polled at the top of scan iterations and hash-table emissions.
    pub fn check_cancelled(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn add_rows_affected(&self, n: u64) {
        self.rows_affected.set(self.rows_affected.get() + n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MASTER_BRANCH_ID;

    #[test]
    fn lineage_is_cached_and_starts_at_branch() {
        let db = Database::new();
        let b1 = db.create_branch("b1", MASTER_BRANCH_ID).unwrap();
        let ctx = ExecutionContext::new(&db, b1);
        let first = ctx.lineage(b1);
        let second = ctx.lineage(b1);
        assert_eq!(first, second);
        assert_eq!(first.first(), Some(&b1));
        assert_eq!(first.last(), Some(&MASTER_BRANCH_ID));
    }

    #[test]
    fn cancellation_surfaces_as_error() {
        let db = Database::new();
        let ctx = ExecutionContext::new(&db, MASTER_BRANCH_ID);
        assert!(ctx.check_cancelled().is_ok());
        ctx.cancel_flag().store(true, Ordering::Relaxed);
        assert!(matches!(ctx.check_cancelled(), Err(Error::Cancelled)));
    }
}
