//! # Plan Foundations: Information Units and Expressions
//!
//! An *information unit* (IU) identifies one attribute value at one point in
//! a plan — an address in the attribute-flow graph, never a value. IUs are
//! produced by table scans (one per column plus the synthetic `tid`) and by
//! group-by aggregators, and are consumed by expressions and sinks.
//!
//! Expressions are scalar trees over IU identifiers with SQL ternary-logic
//! evaluation; they are shared between the logical algebra (for
//! produced/required analysis) and the physical pipeline (for evaluation
//! against per-tuple value maps).

pub mod expr;
pub mod iu;

pub use expr::{ComparisonMode, Expr, ValueMap};
pub use iu::{ColumnOrigin, InformationUnit, IuFactory, IuId, IuSet};
