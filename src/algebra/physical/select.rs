//! Selection: forwards tuples whose predicate evaluates to true.
//!
//! A null predicate result counts as not-satisfied (SQL semantics).

use crate::algebra::physical::{Consumer, PhysicalOp};
use crate::error::Error;
use crate::exec::context::ExecutionContext;
use crate::plan::expr::Expr;

pub struct SelectOp {
    pub child: Box<PhysicalOp>,
    pub predicate: Expr,
}

impl SelectOp {
    pub fn produce(&self, ctx: &ExecutionContext<'_>, out: &mut Consumer<'_>) -> Result<(), Error> {
        self.child.produce(ctx, &mut |values| {
            if self.predicate.eval_predicate(values)? {
                out(values)?;
            }
            Ok(())
        })
    }
}
