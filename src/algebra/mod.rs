//! # Relational Algebras
//!
//! Two operator trees tied together by IU flow analysis:
//!
//! - [`logical`] — the descriptive tree built by the semantic analyser.
//!   Operators are a tagged sum; `PlanAnalysis` computes each node's
//!   produced/required IU sets and the validator checks that every edge is
//!   well-formed.
//! - [`physical`] — the executable producer/consumer pipeline. Each operator
//!   drives its children and pushes tuples (IU → value maps) into its
//!   parent's consumer, synchronously and without buffering except at hash
//!   builds and group-by state.
//! - [`translation`] — the straightforward logical → physical mapping.

pub mod logical;
pub mod physical;
pub mod translation;
