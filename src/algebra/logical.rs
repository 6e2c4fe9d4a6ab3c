//! # Logical Operator Tree
//!
//! Purely descriptive relational operators:
//!
//! | Operator | Arity | Produces | Requires |
//! |----------|-------|----------|----------|
//! | TableScan(table, branch) | 0 | column IUs + `tid` | expected ∩ produced |
//! | Select(expr) | 1 | child's IUs | expected ∪ expr IUs |
//! | Map(mappings) | 1 | child ∪ targets | (expected − targets) ∪ expr IUs |
//! | Join(method, exprs) | 2 | left ∪ right | expected ∪ condition IUs |
//! | GroupBy(aggs) | 1 | aggregator IUs | ⋃ aggregator inputs |
//! | Insert | 0 | ∅ | ∅ |
//! | Update | 1 | ∅ | column IUs + `tid` |
//! | Delete | 1 | ∅ | `tid` |
//! | Result(selection) | 1 | ∅ | selection |
//!
//! `required` always includes what the *parent* expects from this node
//! (fed downward), so a node's requirement is the union of its own needs and
//! its parent's. GroupBy is the one barrier: the child's IUs do not pass up
//! through it.
//!
//! [`PlanAnalysis`] computes both set families in one walk (produced
//! bottom-up, required top-down) keyed by operator uid; rebuilding the
//! analysis after mutating the tree is the invalidation story. The
//! validator checks `required(parent) ⊆ produced(child)` on every edge
//! (split across the two children of a join).

use crate::plan::expr::Expr;
use crate::plan::iu::{IuFactory, IuId, IuSet};
use crate::storage::Table;
use crate::types::{BranchId, SqlTuple, SqlType, Value};
use hashbrown::HashMap;
use std::sync::Arc;

/// Sink behaviour of the plan root, a runtime choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultMode {
    /// Serialise `|`-separated rows to a writer.
    Print,
    /// Hand each row to a caller-provided consumer.
    TupleStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMethod {
    Hash,
}

/// One map output: evaluate `expr`, bind it to `out`.
#[derive(Debug, Clone)]
pub struct Mapping {
    pub out: IuId,
    pub expr: Expr,
}

/// Base-relation access on one branch.
#[derive(Debug, Clone)]
pub struct TableScan {
    pub uid: u32,
    pub table: Arc<Table>,
    pub branch: BranchId,
    pub alias: String,
    /// One IU per table column, in column order.
    pub column_ius: Vec<IuId>,
    /// The synthetic row-identity attribute.
    pub tid_iu: IuId,
}

impl TableScan {
    /// Builds the scan and registers its produced IUs with the factory.
    pub fn new(
        factory: &mut IuFactory,
        table: Arc<Table>,
        branch: BranchId,
        alias: impl Into<String>,
    ) -> Self {
        let uid = factory.next_operator_uid();
        let column_ius = (0..table.column_count())
            .map(|idx| {
                let (name, ty) = {
                    let ci = table.column_info(idx);
                    (ci.name.clone(), ci.ty)
                };
                factory.create_column_iu(uid, &table, Some(idx), &name, ty)
            })
            .collect();
        let tid_iu = factory.create_column_iu(
            uid,
            &table,
            None,
            "tid",
            SqlType::long_integer(false),
        );
        Self {
            uid,
            table,
            branch,
            alias: alias.into(),
            column_ius,
            tid_iu,
        }
    }
}

/// Group-by aggregators; each produces exactly one IU.
#[derive(Debug, Clone)]
pub enum Aggregation {
    /// Forward the grouping key attribute.
    Keep { iu: IuId, produced: IuId },
    Sum { expr: Expr, produced: IuId },
    Avg { expr: Expr, produced: IuId },
    CountAll { produced: IuId },
    Min { expr: Expr, produced: IuId },
}

impl Aggregation {
    pub fn keep(factory: &mut IuFactory, producer: u32, iu: IuId) -> Self {
        let ty = factory.sql_type(iu);
        Aggregation::Keep {
            iu,
            produced: factory.create_iu(producer, ty),
        }
    }

    pub fn sum(factory: &mut IuFactory, producer: u32, expr: Expr) -> Self {
        let ty = expr.sql_type();
        Aggregation::Sum {
            expr,
            produced: factory.create_iu(producer, ty),
        }
    }

    /// Average; non-numeric inputs are coerced to `Numeric` first.
    pub fn avg(factory: &mut IuFactory, producer: u32, expr: Expr) -> Self {
        let ty = expr.sql_type();
        let expr = if matches!(ty.tag, crate::types::TypeTag::Numeric { .. }) {
            expr
        } else {
            let target = SqlType::numeric(18, 4, ty.nullable);
            Expr::Cast(Box::new(expr), target)
        };
        let ty = expr.sql_type();
        Aggregation::Avg {
            expr,
            produced: factory.create_iu(producer, ty),
        }
    }

    pub fn count_all(factory: &mut IuFactory, producer: u32) -> Self {
        Aggregation::CountAll {
            produced: factory.create_iu(producer, SqlType::integer(false)),
        }
    }

    pub fn min(factory: &mut IuFactory, producer: u32, expr: Expr) -> Self {
        let ty = expr.sql_type();
        Aggregation::Min {
            expr,
            produced: factory.create_iu(producer, ty),
        }
    }

    pub fn produced(&self) -> IuId {
        match self {
            Aggregation::Keep { produced, .. }
            | Aggregation::Sum { produced, .. }
            | Aggregation::Avg { produced, .. }
            | Aggregation::CountAll { produced }
            | Aggregation::Min { produced, .. } => *produced,
        }
    }

    pub fn required(&self) -> IuSet {
        match self {
            Aggregation::Keep { iu, .. } => std::iter::once(*iu).collect(),
            Aggregation::Sum { expr, .. }
            | Aggregation::Avg { expr, .. }
            | Aggregation::Min { expr, .. } => expr.required(),
            Aggregation::CountAll { .. } => IuSet::new(),
        }
    }
}

/// The logical operator tree, a tagged sum consumed by pattern matching.
#[derive(Debug, Clone)]
pub enum LogicalOp {
    TableScan(TableScan),
    Select {
        uid: u32,
        child: Box<LogicalOp>,
        predicate: Expr,
    },
    Map {
        uid: u32,
        child: Box<LogicalOp>,
        mappings: Vec<Mapping>,
    },
    Join {
        uid: u32,
        left: Box<LogicalOp>,
        right: Box<LogicalOp>,
        method: JoinMethod,
        conditions: Vec<Expr>,
    },
    GroupBy {
        uid: u32,
        child: Box<LogicalOp>,
        aggregations: Vec<Aggregation>,
    },
    Insert {
        uid: u32,
        table: Arc<Table>,
        tuple: SqlTuple,
        branch: BranchId,
    },
    Update {
        uid: u32,
        child: Box<LogicalOp>,
        table: Arc<Table>,
        /// One entry per table column: `(column IU, Some(new value))` for
        /// assigned columns, `(column IU, None)` to keep the child's value.
        assignments: Vec<(IuId, Option<Value>)>,
        branch: BranchId,
        tid_iu: IuId,
    },
    Delete {
        uid: u32,
        child: Box<LogicalOp>,
        table: Arc<Table>,
        tid_iu: IuId,
        branch: BranchId,
    },
    Result {
        uid: u32,
        child: Box<LogicalOp>,
        selection: Vec<IuId>,
        mode: ResultMode,
    },
}

impl LogicalOp {
    pub fn uid(&self) -> u32 {
        match self {
            LogicalOp::TableScan(scan) => scan.uid,
            LogicalOp::Select { uid, .. }
            | LogicalOp::Map { uid, .. }
            | LogicalOp::Join { uid, .. }
            | LogicalOp::GroupBy { uid, .. }
            | LogicalOp::Insert { uid, .. }
            | LogicalOp::Update { uid, .. }
            | LogicalOp::Delete { uid, .. }
            | LogicalOp::Result { uid, .. } => *uid,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            LogicalOp::TableScan(_) | LogicalOp::Insert { .. } => 0,
            LogicalOp::Join { .. } => 2,
            _ => 1,
        }
    }

    /// (left/only child, right child).
    pub fn children(&self) -> (Option<&LogicalOp>, Option<&LogicalOp>) {
        match self {
            LogicalOp::TableScan(_) | LogicalOp::Insert { .. } => (None, None),
            LogicalOp::Select { child, .. }
            | LogicalOp::Map { child, .. }
            | LogicalOp::GroupBy { child, .. }
            | LogicalOp::Update { child, .. }
            | LogicalOp::Delete { child, .. }
            | LogicalOp::Result { child, .. } => (Some(child), None),
            LogicalOp::Join { left, right, .. } => (Some(left), Some(right)),
        }
    }
}

/// Produced/required IU sets for every node of one tree, keyed by uid.
///
/// Computed in one walk after the tree is assembled; mutating the tree means
/// recomputing the analysis (wholesale invalidation).
#[derive(Debug, Default)]
pub struct PlanAnalysis {
    produced: HashMap<u32, IuSet>,
    required: HashMap<u32, IuSet>,
}

impl PlanAnalysis {
    pub fn analyze(root: &LogicalOp) -> Self {
        let mut analysis = PlanAnalysis::default();
        analysis.compute_produced(root);
        analysis.compute_required(root, &IuSet::new());
        analysis
    }

    pub fn produced(&self, op: &LogicalOp) -> &IuSet {
        &self.produced[&op.uid()]
    }

    pub fn required(&self, op: &LogicalOp) -> &IuSet {
        &self.required[&op.uid()]
    }

    /// What `parent` expects from `child`: the parent's requirement,
    /// intersected with the child's production for binary parents.
    pub fn expected(&self, parent: &LogicalOp, child: &LogicalOp) -> IuSet {
        let parent_required = self.required(parent);
        if parent.arity() > 1 {
            parent_required
                .intersection(self.produced(child))
                .copied()
                .collect()
        } else {
            parent_required.clone()
        }
    }

    fn compute_produced(&mut self, op: &LogicalOp) -> IuSet {
        let produced = match op {
            LogicalOp::TableScan(scan) => {
                let mut set: IuSet = scan.column_ius.iter().copied().collect();
                set.insert(scan.tid_iu);
                set
            }
            LogicalOp::Select { child, .. } => self.compute_produced(child),
            LogicalOp::Map { child, mappings, .. } => {
                let mut set = self.compute_produced(child);
                set.extend(mappings.iter().map(|m| m.out));
                set
            }
            LogicalOp::Join { left, right, .. } => {
                let mut set = self.compute_produced(left);
                set.extend(self.compute_produced(right));
                set
            }
            LogicalOp::GroupBy {
                child, aggregations, ..
            } => {
                // the group-by operator doesn't pass up its child's IUs
                self.compute_produced(child);
                aggregations.iter().map(|a| a.produced()).collect()
            }
            LogicalOp::Insert { .. } => IuSet::new(),
            LogicalOp::Update { child, .. }
            | LogicalOp::Delete { child, .. }
            | LogicalOp::Result { child, .. } => {
                self.compute_produced(child);
                IuSet::new()
            }
        };
        self.produced.insert(op.uid(), produced.clone());
        produced
    }

    fn compute_required(&mut self, op: &LogicalOp, expected: &IuSet) {
        let required: IuSet = match op {
            LogicalOp::TableScan(_) => expected
                .intersection(&self.produced[&op.uid()])
                .copied()
                .collect(),
            LogicalOp::Select { predicate, .. } => {
                let mut set = expected.clone();
                predicate.collect_required(&mut set);
                set
            }
            LogicalOp::Map { mappings, .. } => {
                let mut set: IuSet = expected
                    .iter()
                    .copied()
                    .filter(|iu| !mappings.iter().any(|m| m.out == *iu))
                    .collect();
                for mapping in mappings {
                    mapping.expr.collect_required(&mut set);
                }
                set
            }
            LogicalOp::Join { conditions, .. } => {
                let mut set = expected.clone();
                for condition in conditions {
                    condition.collect_required(&mut set);
                }
                set
            }
            LogicalOp::GroupBy { aggregations, .. } => {
                let mut set = IuSet::new();
                for aggregation in aggregations {
                    set.extend(aggregation.required());
                }
                set
            }
            LogicalOp::Insert { .. } => IuSet::new(),
            LogicalOp::Update {
                assignments,
                tid_iu,
                ..
            } => {
                let mut set: IuSet = assignments.iter().map(|(iu, _)| *iu).collect();
                set.insert(*tid_iu);
                set
            }
            LogicalOp::Delete { tid_iu, .. } => std::iter::once(*tid_iu).collect(),
            LogicalOp::Result { selection, .. } => selection.iter().copied().collect(),
        };
        self.required.insert(op.uid(), required);

        let (left, right) = op.children();
        if let Some(child) = left {
            let child_expected = self.expected(op, child);
            self.compute_required(child, &child_expected);
        }
        if let Some(child) = right {
            let child_expected = self.expected(op, child);
            self.compute_required(child, &child_expected);
        }
    }

    /// Plan validity: on every edge the parent's requirement (restricted to
    /// the child's side for joins) is covered by the child's production.
    pub fn validate(&self, root: &LogicalOp) -> bool {
        let (left, right) = root.children();
        for child in [left, right].into_iter().flatten() {
            let expected = self.expected(root, child);
            if !expected.is_subset(self.produced(child)) {
                return false;
            }
            if !self.validate(child) {
                return false;
            }
        }
        true
    }
}
