//! # Statement Execution
//!
//! The executor ties the compilation chain together:
//!
//! ```text
//! SQL text ──parse──▶ ParserResult ──analyse──▶ logical tree
//!     ──analyze/validate──▶ IU flow ──translate──▶ physical tree
//!     ──produce──▶ sink (print / stream) or version-manager effects
//! ```
//!
//! Each statement runs on one thread with one [`ExecutionContext`]; errors
//! propagate to the caller unchanged and completed DML side effects stay
//! visible (no rollback).

pub mod context;
pub mod executor;

pub use context::ExecutionContext;
pub use executor::{
    execute, execute_print, load_table_dump, query, query_cancellable, query_with,
    query_with_columns, ExecuteResult, Row,
};
