//! Logical → physical translation.
//!
//! A straight post-order mapping over the tagged sum. Joins are restricted
//! to conjunctions of equality comparisons whose sides can be attributed to
//! one input each (the hash join contract); anything else is an unsupported
//! feature, as is the purely logical `Map` operator.

use crate::algebra::logical::{JoinMethod, LogicalOp, PlanAnalysis};
use crate::algebra::physical::{
    DeleteOp, GroupByOp, HashJoinOp, InsertOp, PhysicalOp, ResultOp, SelectOp, TableScanOp,
    UpdateOp,
};
use crate::error::{Error, SemanticError};
use crate::plan::expr::{ComparisonMode, Expr};
use crate::plan::iu::IuFactory;

pub fn translate(
    op: &LogicalOp,
    analysis: &PlanAnalysis,
    factory: &IuFactory,
) -> Result<PhysicalOp, Error> {
    match op {
        LogicalOp::TableScan(scan) => {
            let required = analysis.required(op);
            let columns = scan
                .column_ius
                .iter()
                .enumerate()
                .filter(|(_, iu)| required.contains(iu))
                .map(|(index, iu)| (*iu, index))
                .collect();
            Ok(PhysicalOp::TableScan(TableScanOp {
                table: scan.table.clone(),
                branch: scan.branch,
                columns,
                tid_iu: required.contains(&scan.tid_iu).then_some(scan.tid_iu),
            }))
        }
        LogicalOp::Select {
            child, predicate, ..
        } => Ok(PhysicalOp::Select(SelectOp {
            child: Box::new(translate(child, analysis, factory)?),
            predicate: predicate.clone(),
        })),
        LogicalOp::Map { .. } => Err(Error::Semantic(SemanticError::UnsupportedFeature(
            "map operator has no physical form",
        ))),
        LogicalOp::Join {
            left,
            right,
            method: JoinMethod::Hash,
            conditions,
            ..
        } => {
            let left_produced = analysis.produced(left);
            let mut pairs = Vec::with_capacity(conditions.len());
            for condition in conditions {
                let Expr::Comparison(ComparisonMode::Eq, lhs, rhs) = condition else {
                    return Err(Error::Semantic(SemanticError::UnsupportedFeature(
                        "hash join requires equality conditions",
                    )));
                };
                if lhs.required().is_subset(left_produced) {
                    pairs.push(((**lhs).clone(), (**rhs).clone()));
                } else if rhs.required().is_subset(left_produced) {
                    pairs.push(((**rhs).clone(), (**lhs).clone()));
                } else {
                    return Err(Error::Semantic(SemanticError::UnsupportedFeature(
                        "join condition spans both inputs on one side",
                    )));
                }
            }
            let stored = analysis
                .required(op)
                .intersection(left_produced)
                .map(|iu| (*iu, factory.sql_type(*iu)))
                .collect();
            Ok(PhysicalOp::HashJoin(HashJoinOp {
                left: Box::new(translate(left, analysis, factory)?),
                right: Box::new(translate(right, analysis, factory)?),
                pairs,
                stored,
            }))
        }
        LogicalOp::GroupBy {
            child, aggregations, ..
        } => Ok(PhysicalOp::GroupBy(GroupByOp {
            child: Box::new(translate(child, analysis, factory)?),
            aggregations: aggregations.clone(),
        })),
        LogicalOp::Insert {
            table, tuple, branch, ..
        } => Ok(PhysicalOp::Insert(InsertOp {
            table: table.clone(),
            tuple: tuple.clone(),
            branch: *branch,
        })),
        LogicalOp::Update {
            child,
            table,
            assignments,
            branch,
            tid_iu,
            ..
        } => Ok(PhysicalOp::Update(UpdateOp {
            child: Box::new(translate(child, analysis, factory)?),
            table: table.clone(),
            assignments: assignments.clone(),
            branch: *branch,
            tid_iu: *tid_iu,
        })),
        LogicalOp::Delete {
            child,
            table,
            tid_iu,
            branch,
            ..
        } => Ok(PhysicalOp::Delete(DeleteOp {
            child: Box::new(translate(child, analysis, factory)?),
            table: table.clone(),
            tid_iu: *tid_iu,
            branch: *branch,
        })),
        LogicalOp::Result {
            child, selection, ..
        } => Ok(PhysicalOp::Result(ResultOp {
            child: Box::new(translate(child, analysis, factory)?),
            selection: selection.clone(),
        })),
    }
}
