//! Table scan: tids ascending, branch-visibility filtered.
//!
//! Master scans materialise straight from the columnar slots; other branches
//! go through the version manager's chain walk and then sweep the dangling
//! array. Only the columns some ancestor requires are materialised, and the
//! synthetic `tid` IU is emitted when a parent (update/delete) needs row
//! identity. Cancellation is polled per iteration inside `scan_relation`.

use crate::algebra::physical::Consumer;
use crate::error::Error;
use crate::exec::context::ExecutionContext;
use crate::plan::expr::ValueMap;
use crate::plan::iu::IuId;
use crate::storage::Table;
use crate::types::{BranchId, Value};
use crate::version::manager::{scan_relation, ChainElement};
use std::sync::Arc;

pub struct TableScanOp {
    pub table: Arc<Table>,
    pub branch: BranchId,
    /// (IU, column index) for every required column.
    pub columns: Vec<(IuId, usize)>,
    /// Set when a parent requires row identity.
    pub tid_iu: Option<IuId>,
}

impl TableScanOp {
    pub fn produce(&self, ctx: &ExecutionContext<'_>, out: &mut Consumer<'_>) -> Result<(), Error> {
        scan_relation(&self.table, ctx, self.branch, |tid, element| {
            let mut values = ValueMap::new();
            for &(iu, column) in &self.columns {
                let value = match element {
                    ChainElement::Master => self.table.read_master_value(tid, column),
                    ChainElement::Node(node) => self.table.unpack_value(&node.data, column),
                };
                values.insert(iu, value);
            }
            if let Some(tid_iu) = self.tid_iu {
                // the dangling bit rides along in the tid value
                values.insert(tid_iu, Value::LongInteger(tid as i64));
            }
            out(&values)
        })
    }
}
