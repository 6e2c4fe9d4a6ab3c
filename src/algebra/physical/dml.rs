//! DML verbs: thin shims over the version manager.
//!
//! Update and delete consume their child's tuples; row identity arrives
//! through the threaded `tid` IU (dangling bit included). Affected-row
//! counts accumulate on the execution context. Side effects that already
//! reached the version manager stay visible if a later tuple fails — there
//! is no transactional rollback.

use crate::algebra::physical::PhysicalOp;
use crate::error::{Error, RuntimeError};
use crate::exec::context::ExecutionContext;
use crate::plan::iu::IuId;
use crate::storage::Table;
use crate::types::{BranchId, SqlTuple, Tid, Value};
use crate::version::manager::{delete_tuple, insert_tuple, update_tuple};
use std::sync::Arc;

pub struct InsertOp {
    pub table: Arc<Table>,
    pub tuple: SqlTuple,
    pub branch: BranchId,
}

impl InsertOp {
    pub fn produce(&self, ctx: &ExecutionContext<'_>) -> Result<(), Error> {
        insert_tuple(&self.tuple, &self.table, ctx, self.branch)?;
        ctx.add_rows_affected(1);
        Ok(())
    }
}

pub struct UpdateOp {
    pub child: Box<PhysicalOp>,
    pub table: Arc<Table>,
    /// One entry per column: `(IU, Some(value))` overwrites, `(IU, None)`
    /// keeps the scanned value.
    pub assignments: Vec<(IuId, Option<Value>)>,
    pub branch: BranchId,
    pub tid_iu: IuId,
}

impl UpdateOp {
    pub fn produce(&self, ctx: &ExecutionContext<'_>) -> Result<(), Error> {
        self.child.produce(ctx, &mut |values| {
            let tid = tid_from(values.get(self.tid_iu))?;
            let tuple = SqlTuple::new(
                self.assignments
                    .iter()
                    .map(|(iu, assigned)| match assigned {
                        Some(value) => value.clone(),
                        None => values.get(*iu).cloned().unwrap_or(Value::Null),
                    })
                    .collect(),
            );
            update_tuple(tid, &tuple, &self.table, ctx, self.branch)?;
            ctx.add_rows_affected(1);
            Ok(())
        })
    }
}

pub struct DeleteOp {
    pub child: Box<PhysicalOp>,
    pub table: Arc<Table>,
    pub tid_iu: IuId,
    pub branch: BranchId,
}

impl DeleteOp {
    pub fn produce(&self, ctx: &ExecutionContext<'_>) -> Result<(), Error> {
        self.child.produce(ctx, &mut |values| {
            let tid = tid_from(values.get(self.tid_iu))?;
            delete_tuple(tid, &self.table, ctx, self.branch)?;
            ctx.add_rows_affected(1);
            Ok(())
        })
    }
}

/// Recovers the tid (dangling bit included) from the threaded IU value.
fn tid_from(value: Option<&Value>) -> Result<Tid, Error> {
    match value {
        Some(Value::LongInteger(raw)) => Ok(*raw as Tid),
        _ => Err(Error::Runtime(RuntimeError::NotFound(u64::MAX))),
    }
}
