//! Per-statement analysers.
//!
//! Each statement kind gets its own assembly path over a shared toolkit:
//! scan construction, scope resolution, constant selections, and the join
//! spanning tree. The output is a [`QueryTree`] (logical root plus the IU
//! factory that owns its attribute identities) or a DDL description for the
//! executor to apply.

use crate::algebra::logical::{JoinMethod, LogicalOp, ResultMode, TableScan};
use crate::database::Database;
use crate::error::{Error, SemanticError};
use crate::plan::expr::Expr;
use crate::plan::iu::{IuFactory, IuId};
use crate::sql::ast::{
    ColumnRef, CreateBranchStatement, CreateTableStatement, DeleteStatement, InsertStatement,
    ParserResult, SelectStatement, TableRef, UpdateStatement,
};
use crate::semantic::join_graph::JoinGraph;
use crate::types::{BranchId, SqlTuple, SqlType, Value, MASTER_BRANCH_ID};
use hashbrown::HashMap;

/// An analysed query or DML statement, ready for translation.
pub struct QueryTree {
    pub root: LogicalOp,
    pub factory: IuFactory,
    /// Branch the statement's side effects target (master for pure reads).
    pub active_branch: BranchId,
}

/// Analysis result: a plan to run, or a DDL action to apply.
pub enum AnalysedStatement {
    Query(QueryTree),
    CreateTable {
        name: String,
        columns: Vec<(String, SqlType)>,
    },
    CreateBranch {
        name: String,
        parent: BranchId,
    },
}

pub fn analyse(
    db: &Database,
    stmt: &ParserResult,
    mode: ResultMode,
) -> Result<AnalysedStatement, Error> {
    let mut analysis = Analysis {
        db,
        factory: IuFactory::new(),
    };
    match stmt {
        ParserResult::Select(stmt) => analysis.analyse_select(stmt, mode).map(AnalysedStatement::Query),
        ParserResult::Insert(stmt) => analysis.analyse_insert(stmt).map(AnalysedStatement::Query),
        ParserResult::Update(stmt) => analysis.analyse_update(stmt).map(AnalysedStatement::Query),
        ParserResult::Delete(stmt) => analysis.analyse_delete(stmt).map(AnalysedStatement::Query),
        ParserResult::CreateTable(stmt) => analyse_create_table(db, stmt),
        ParserResult::CreateBranch(stmt) => analyse_create_branch(db, stmt),
    }
}

// ----------------------------------------------------------------------
// Shared toolkit

/// Per-binding IU registry and the dangling per-relation productions that
/// selections and joins fold together.
#[derive(Default)]
struct QueryPlan {
    bindings: Vec<String>,
    /// binding → [(column name, iu)] in declaration order; `tid` last.
    ius: HashMap<String, Vec<(String, IuId)>>,
    productions: HashMap<String, LogicalOp>,
}

impl QueryPlan {
    fn iu_of(&self, binding: &str, column: &str) -> Option<IuId> {
        self.ius
            .get(binding)?
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, iu)| *iu)
    }
}

/// Bare and qualified attribute names; bare collisions are ambiguous.
struct Scope {
    entries: HashMap<String, ScopeEntry>,
}

#[derive(Clone)]
enum ScopeEntry {
    Unique { binding: String, iu: IuId },
    Ambiguous,
}

impl Scope {
    fn build(plan: &QueryPlan) -> Self {
        let mut entries: HashMap<String, ScopeEntry> = HashMap::new();
        for binding in &plan.bindings {
            for (column, iu) in &plan.ius[binding] {
                entries.insert(
                    format!("{binding}.{column}"),
                    ScopeEntry::Unique {
                        binding: binding.clone(),
                        iu: *iu,
                    },
                );
                entries
                    .entry(column.clone())
                    .and_modify(|e| *e = ScopeEntry::Ambiguous)
                    .or_insert(ScopeEntry::Unique {
                        binding: binding.clone(),
                        iu: *iu,
                    });
            }
        }
        Self { entries }
    }

    /// Resolves an attribute to exactly one binding, fully qualifying bare
    /// names.
    fn resolve(&self, column: &ColumnRef) -> Result<(String, IuId), SemanticError> {
        let key = column.to_string();
        match self.entries.get(&key) {
            None => Err(SemanticError::UnknownColumn(key)),
            Some(ScopeEntry::Ambiguous) => Err(SemanticError::AmbiguousColumn(key)),
            Some(ScopeEntry::Unique { binding, iu }) => Ok((binding.clone(), *iu)),
        }
    }
}

struct Analysis<'db> {
    db: &'db Database,
    factory: IuFactory,
}

impl<'db> Analysis<'db> {
    fn resolve_branch(&self, version: &Option<String>) -> Result<BranchId, SemanticError> {
        match version.as_deref() {
            None | Some("master") => Ok(MASTER_BRANCH_ID),
            Some(name) => self
                .db
                .branch_id(name)
                .ok_or_else(|| SemanticError::UnknownBranch(name.to_string())),
        }
    }

    /// One TableScan per relation; registers every produced IU under the
    /// relation's binding.
    fn construct_scans(
        &mut self,
        plan: &mut QueryPlan,
        relations: &[TableRef],
    ) -> Result<(), Error> {
        for relation in relations {
            let table = self
                .db
                .get_table(&relation.table)
                .ok_or_else(|| SemanticError::UnknownRelation(relation.table.clone()))?;
            let branch = self.resolve_branch(&relation.version)?;
            let binding = relation.binding().to_string();
            if plan.ius.contains_key(&binding) {
                return Err(SemanticError::DuplicateTable(binding).into());
            }

            let scan = TableScan::new(&mut self.factory, table, branch, &binding);
            let mut ius: Vec<(String, IuId)> = scan
                .table
                .column_names()
                .zip(&scan.column_ius)
                .map(|(name, iu)| (name.to_string(), *iu))
                .collect();
            ius.push(("tid".to_string(), scan.tid_iu));

            plan.bindings.push(binding.clone());
            plan.ius.insert(binding.clone(), ius);
            plan.productions
                .insert(binding, LogicalOp::TableScan(scan));
        }
        Ok(())
    }

    /// Layers a `Select` with `attr = literal` over the owning production.
    fn construct_selects(
        &mut self,
        plan: &mut QueryPlan,
        scope: &Scope,
        selections: &[(ColumnRef, String)],
    ) -> Result<(), Error> {
        for (column, literal) in selections {
            let (binding, iu) = scope.resolve(column)?;
            let ty = self.factory.sql_type(iu).not_nullable();
            let value = Value::cast_from_string(literal, ty)
                .map_err(|_| SemanticError::TypeMismatch(column.to_string()))?;
            let predicate = Expr::equals(
                Expr::Identifier(iu, self.factory.sql_type(iu)),
                Expr::Constant(value, ty),
            );
            let child = plan
                .productions
                .remove(&binding)
                .expect("scope and productions agree on bindings");
            plan.productions.insert(
                binding,
                LogicalOp::Select {
                    uid: self.factory.next_operator_uid(),
                    child: Box::new(child),
                    predicate,
                },
            );
        }
        Ok(())
    }

    /// Builds the join graph and folds it left-deep along a DFS spanning
    /// tree rooted at the first relation.
    fn construct_joins(
        &mut self,
        plan: &mut QueryPlan,
        scope: &Scope,
        join_conditions: &[(ColumnRef, ColumnRef)],
    ) -> Result<LogicalOp, Error> {
        let mut graph = JoinGraph::new();
        let bindings = plan.bindings.clone();
        for binding in &bindings {
            let production = plan
                .productions
                .remove(binding)
                .expect("every binding has a production");
            graph.add_vertex(binding, production);
        }

        for (lhs, rhs) in join_conditions {
            let (lb, liu) = scope.resolve(lhs)?;
            let (rb, riu) = scope.resolve(rhs)?;
            let condition = Expr::equals(
                Expr::Identifier(liu, self.factory.sql_type(liu)),
                Expr::Identifier(riu, self.factory.sql_type(riu)),
            );
            if lb == rb {
                // same relation on both sides: a plain selection
                let vertex = graph.vertex_mut(&lb).expect("vertex exists");
                let child = vertex.production.take().expect("production present");
                vertex.production = Some(LogicalOp::Select {
                    uid: self.factory.next_operator_uid(),
                    child: Box::new(child),
                    predicate: condition,
                });
            } else {
                if !graph.has_edge(&lb, &rb) {
                    graph.add_edge(&lb, &rb);
                }
                graph
                    .edge_conditions_mut(&lb, &rb)
                    .expect("edge just ensured")
                    .push(condition);
            }
        }

        let first = graph
            .first_vertex_name()
            .expect("at least one relation")
            .to_string();
        let mut joined = None;
        self.construct_join(&mut graph, &first, &mut joined)?;
        if !graph.all_visited() {
            return Err(SemanticError::UnsupportedFeature(
                "cross products without join predicates",
            )
            .into());
        }
        Ok(joined.expect("spanning tree produced a root"))
    }

    fn construct_join(
        &mut self,
        graph: &mut JoinGraph,
        name: &str,
        joined: &mut Option<LogicalOp>,
    ) -> Result<(), Error> {
        if let Some(vertex) = graph.vertex_mut(name) {
            vertex.visited = true;
            if joined.is_none() {
                *joined = vertex.production.take();
            }
        }

        for edge_index in graph.connected_edges(name) {
            let (u, v) = {
                let edge = graph.edge(edge_index);
                (edge.u.clone(), edge.v.clone())
            };
            let neighbour = if u == name { v.clone() } else { u.clone() };
            let neighbour_vertex = graph.vertex_mut(&neighbour).expect("vertex exists");
            if neighbour_vertex.visited {
                continue;
            }
            let neighbour_production = neighbour_vertex
                .production
                .take()
                .expect("unvisited vertex still owns its production");
            let conditions = graph.take_edge_conditions(edge_index);
            let current = joined.take().expect("join root seeded");

            // keep the edge's recorded orientation: an edge pointing at the
            // current vertex puts the neighbour on the build side
            let (left, right) = if v == name {
                (neighbour_production, current)
            } else {
                (current, neighbour_production)
            };
            *joined = Some(LogicalOp::Join {
                uid: self.factory.next_operator_uid(),
                left: Box::new(left),
                right: Box::new(right),
                method: JoinMethod::Hash,
                conditions,
            });
            self.construct_join(graph, &neighbour, joined)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // SELECT

    fn analyse_select(
        &mut self,
        stmt: &SelectStatement,
        mode: ResultMode,
    ) -> Result<QueryTree, Error> {
        let mut plan = QueryPlan::default();
        self.construct_scans(&mut plan, &stmt.relations)?;
        let scope = Scope::build(&plan);

        // resolve the projection before any plan surgery so ambiguity and
        // unknown-column diagnostics win over structural errors
        let selection = if stmt.star {
            let mut ius = Vec::new();
            for binding in &plan.bindings {
                for (column, iu) in &plan.ius[binding] {
                    if column != "tid" {
                        ius.push(*iu);
                    }
                }
            }
            ius
        } else {
            stmt.projections
                .iter()
                .map(|p| scope.resolve(p).map(|(_, iu)| iu))
                .collect::<Result<Vec<_>, _>>()?
        };

        self.construct_selects(&mut plan, &scope, &stmt.selections)?;

        let child = if plan.bindings.len() == 1 {
            if !stmt.join_conditions.is_empty() {
                // single-relation equalities behave like selections
                self.construct_joins(&mut plan, &scope, &stmt.join_conditions)?
            } else {
                let binding = plan.bindings[0].clone();
                plan.productions.remove(&binding).expect("single production")
            }
        } else {
            self.construct_joins(&mut plan, &scope, &stmt.join_conditions)?
        };

        let root = LogicalOp::Result {
            uid: self.factory.next_operator_uid(),
            child: Box::new(child),
            selection,
            mode,
        };
        Ok(QueryTree {
            root,
            factory: std::mem::take(&mut self.factory),
            active_branch: MASTER_BRANCH_ID,
        })
    }

    // ------------------------------------------------------------------
    // INSERT

    fn analyse_insert(&mut self, stmt: &InsertStatement) -> Result<QueryTree, Error> {
        let table = self
            .db
            .get_table(&stmt.relation.table)
            .ok_or_else(|| SemanticError::UnknownRelation(stmt.relation.table.clone()))?;
        let branch = self.resolve_branch(&stmt.relation.version)?;

        if stmt.columns.len() != stmt.values.len() {
            return Err(SemanticError::TypeMismatch(format!(
                "{} values for {} columns",
                stmt.values.len(),
                stmt.columns.len()
            ))
            .into());
        }

        let mut assigned: HashMap<usize, Value> = HashMap::new();
        for (column, literal) in stmt.columns.iter().zip(&stmt.values) {
            let ci = table
                .get_ci(column)
                .ok_or_else(|| SemanticError::UnknownColumn(column.clone()))?;
            if assigned.contains_key(&ci.index) {
                return Err(SemanticError::DuplicateColumn(column.clone()).into());
            }
            let value = Value::cast_from_string(literal, ci.ty.not_nullable())
                .map_err(|_| SemanticError::TypeMismatch(column.clone()))?;
            assigned.insert(ci.index, value);
        }

        let values = (0..table.column_count())
            .map(|index| match assigned.remove(&index) {
                Some(value) => value,
                None => {
                    let ty = table.column_info(index).ty;
                    if ty.nullable {
                        Value::Null
                    } else {
                        Value::zero(ty)
                    }
                }
            })
            .collect();

        let root = LogicalOp::Insert {
            uid: self.factory.next_operator_uid(),
            table,
            tuple: SqlTuple::new(values),
            branch,
        };
        Ok(QueryTree {
            root,
            factory: std::mem::take(&mut self.factory),
            active_branch: branch,
        })
    }

    // ------------------------------------------------------------------
    // UPDATE

    fn analyse_update(&mut self, stmt: &UpdateStatement) -> Result<QueryTree, Error> {
        if !stmt.join_conditions.is_empty() {
            return Err(
                SemanticError::UnsupportedFeature("join predicates in UPDATE").into(),
            );
        }
        let branch = self.resolve_branch(&stmt.relation.version)?;
        let mut plan = QueryPlan::default();
        self.construct_scans(&mut plan, std::slice::from_ref(&stmt.relation))?;
        let scope = Scope::build(&plan);
        self.construct_selects(&mut plan, &scope, &stmt.selections)?;

        let binding = plan.bindings[0].clone();
        let table = self.db.get_table(&stmt.relation.table).expect("scanned");

        let mut new_values: HashMap<usize, Value> = HashMap::new();
        for (column, literal) in &stmt.assignments {
            let ci = table
                .get_ci(column)
                .ok_or_else(|| SemanticError::UnknownColumn(column.clone()))?;
            if new_values.contains_key(&ci.index) {
                return Err(SemanticError::DuplicateColumn(column.clone()).into());
            }
            let value = Value::cast_from_string(literal, ci.ty.not_nullable())
                .map_err(|_| SemanticError::TypeMismatch(column.clone()))?;
            new_values.insert(ci.index, value);
        }

        let assignments = (0..table.column_count())
            .map(|index| {
                let name = table.column_info(index).name.clone();
                let iu = plan.iu_of(&binding, &name).expect("scan registered column");
                (iu, new_values.remove(&index))
            })
            .collect();
        let tid_iu = plan.iu_of(&binding, "tid").expect("scan registered tid");

        let child = plan.productions.remove(&binding).expect("single production");
        let root = LogicalOp::Update {
            uid: self.factory.next_operator_uid(),
            child: Box::new(child),
            table,
            assignments,
            branch,
            tid_iu,
        };
        Ok(QueryTree {
            root,
            factory: std::mem::take(&mut self.factory),
            active_branch: branch,
        })
    }

    // ------------------------------------------------------------------
    // DELETE

    fn analyse_delete(&mut self, stmt: &DeleteStatement) -> Result<QueryTree, Error> {
        if !stmt.join_conditions.is_empty() {
            return Err(
                SemanticError::UnsupportedFeature("join predicates in DELETE").into(),
            );
        }
        let branch = self.resolve_branch(&stmt.relation.version)?;
        let mut plan = QueryPlan::default();
        self.construct_scans(&mut plan, std::slice::from_ref(&stmt.relation))?;
        let scope = Scope::build(&plan);
        self.construct_selects(&mut plan, &scope, &stmt.selections)?;

        let binding = plan.bindings[0].clone();
        let table = self.db.get_table(&stmt.relation.table).expect("scanned");
        let tid_iu = plan.iu_of(&binding, "tid").expect("scan registered tid");
        let child = plan.productions.remove(&binding).expect("single production");

        let root = LogicalOp::Delete {
            uid: self.factory.next_operator_uid(),
            child: Box::new(child),
            table,
            tid_iu,
            branch,
        };
        Ok(QueryTree {
            root,
            factory: std::mem::take(&mut self.factory),
            active_branch: branch,
        })
    }
}

// ----------------------------------------------------------------------
// DDL

fn analyse_create_table(
    db: &Database,
    stmt: &CreateTableStatement,
) -> Result<AnalysedStatement, Error> {
    if db.has_table(&stmt.table) {
        return Err(SemanticError::DuplicateTable(stmt.table.clone()).into());
    }
    let mut seen = std::collections::HashSet::new();
    let mut columns = Vec::with_capacity(stmt.columns.len());
    for spec in &stmt.columns {
        if !seen.insert(spec.name.clone()) {
            return Err(SemanticError::DuplicateColumn(spec.name.clone()).into());
        }
        let ty = SqlType::from_type_name(
            &spec.type_name,
            spec.length,
            spec.precision,
            !spec.not_null,
        )
        .map_err(|_| SemanticError::TypeMismatch(spec.type_name.clone()))?;
        columns.push((spec.name.clone(), ty));
    }
    Ok(AnalysedStatement::CreateTable {
        name: stmt.table.clone(),
        columns,
    })
}

fn analyse_create_branch(
    db: &Database,
    stmt: &CreateBranchStatement,
) -> Result<AnalysedStatement, Error> {
    let parent = db
        .branch_id(&stmt.parent)
        .ok_or_else(|| SemanticError::UnknownBranch(stmt.parent.clone()))?;
    if db.branch_id(&stmt.branch).is_some() {
        return Err(SemanticError::DuplicateBranch(stmt.branch.clone()).into());
    }
    Ok(AnalysedStatement::CreateBranch {
        name: stmt.branch.clone(),
        parent,
    })
}
