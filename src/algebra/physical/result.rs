//! Result sinks.
//!
//! The plan root serialises each tuple's selected IUs either as
//! `|`-separated text lines (Print) or as materialised rows handed to a
//! caller-provided consumer (TupleStream). Both are runtime choices on the
//! same operator; streamed values are detached from table-owned storage
//! before leaving the engine.

use crate::algebra::physical::PhysicalOp;
use crate::error::Error;
use crate::exec::context::ExecutionContext;
use crate::plan::iu::IuId;
use crate::types::Value;
use std::io::Write;

pub enum ResultSink<'s> {
    Print(&'s mut dyn Write),
    Stream(&'s mut dyn FnMut(Vec<Value>) -> Result<(), Error>),
}

pub struct ResultOp {
    pub child: Box<PhysicalOp>,
    pub selection: Vec<IuId>,
}

impl ResultOp {
    pub fn produce(
        &self,
        ctx: &ExecutionContext<'_>,
        sink: &mut ResultSink<'_>,
    ) -> Result<(), Error> {
        match sink {
            ResultSink::Print(writer) => self.child.produce(ctx, &mut |values| {
                let mut line = String::new();
                for (i, iu) in self.selection.iter().enumerate() {
                    if i > 0 {
                        line.push('|');
                    }
                    match values.get(*iu) {
                        Some(value) => line.push_str(&value.to_string()),
                        None => line.push_str("null"),
                    }
                }
                line.push('\n');
                writer.write_all(line.as_bytes())?;
                Ok(())
            }),
            ResultSink::Stream(consumer) => self.child.produce(ctx, &mut |values| {
                let row: Vec<Value> = self
                    .selection
                    .iter()
                    .map(|iu| {
                        values
                            .get(*iu)
                            .cloned()
                            .unwrap_or(Value::Null)
                            .into_owned()
                    })
                    .collect();
                consumer(row)
            }),
        }
    }
}
