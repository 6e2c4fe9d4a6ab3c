//! # Physical Operator Pipeline
//!
//! The executable plan is a push pipeline: `produce()` drives an operator's
//! children and, for every tuple materialising at its output, calls the
//! parent's consumer with an IU → value map that is only guaranteed alive
//! for the duration of that call.
//!
//! ```text
//! Result ◀── consume ── Select ◀── consume ── TableScan
//!    │                     │                      │
//!    └──── produce ───────▶└──── produce ────────▶│ (drives tids)
//! ```
//!
//! Execution is depth-first and left-deep; a hash join's build side runs to
//! completion before its probe side starts, and nothing else buffers. The
//! tree is interpreted directly — code generation could slot in behind the
//! same produce/consume contract, but no operator depends on it.
//!
//! The root is either a [`result::ResultOp`] sink (print or tuple stream,
//! chosen at runtime) or a DML verb; both are driven by [`execute`].

pub mod dml;
pub mod group_by;
pub mod hash_join;
pub mod result;
pub mod select;
pub mod table_scan;

use crate::error::Error;
use crate::exec::context::ExecutionContext;
use crate::plan::expr::ValueMap;

pub use dml::{DeleteOp, InsertOp, UpdateOp};
pub use group_by::GroupByOp;
pub use hash_join::HashJoinOp;
pub use result::{ResultOp, ResultSink};
pub use select::SelectOp;
pub use table_scan::TableScanOp;

/// Receives one tuple per call; alive only for the call.
pub type Consumer<'a> = dyn FnMut(&ValueMap) -> Result<(), Error> + 'a;

/// Physical operator tree.
pub enum PhysicalOp {
    TableScan(TableScanOp),
    Select(SelectOp),
    HashJoin(HashJoinOp),
    GroupBy(GroupByOp),
    Insert(InsertOp),
    Update(UpdateOp),
    Delete(DeleteOp),
    Result(ResultOp),
}

impl PhysicalOp {
    /// Drives this operator, pushing every output tuple into `out`.
    pub fn produce(&self, ctx: &ExecutionContext<'_>, out: &mut Consumer<'_>) -> Result<(), Error> {
        match self {
            PhysicalOp::TableScan(op) => op.produce(ctx, out),
            PhysicalOp::Select(op) => op.produce(ctx, out),
            PhysicalOp::HashJoin(op) => op.produce(ctx, out),
            PhysicalOp::GroupBy(op) => op.produce(ctx, out),
            PhysicalOp::Insert(op) => op.produce(ctx),
            PhysicalOp::Update(op) => op.produce(ctx),
            PhysicalOp::Delete(op) => op.produce(ctx),
            PhysicalOp::Result(_) => Err(Error::Semantic(
                crate::error::SemanticError::UnsupportedFeature(
                    "result sink cannot feed another operator",
                ),
            )),
        }
    }
}

/// Runs a complete physical tree against its sink.
pub fn execute(
    root: &PhysicalOp,
    ctx: &ExecutionContext<'_>,
    sink: &mut ResultSink<'_>,
) -> Result<(), Error> {
    match root {
        PhysicalOp::Result(op) => op.produce(ctx, sink),
        PhysicalOp::Insert(op) => op.produce(ctx),
        PhysicalOp::Update(op) => op.produce(ctx),
        PhysicalOp::Delete(op) => op.produce(ctx),
        other => {
            let mut discard = |_: &ValueMap| Ok(());
            other.produce(ctx, &mut discard)
        }
    }
}
