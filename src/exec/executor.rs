//! Statement driver: parse → analyse → validate → translate → produce.

use crate::algebra::logical::{LogicalOp, PlanAnalysis, ResultMode};
use crate::algebra::physical::{self, ResultSink};
use crate::algebra::translation::translate;
use crate::database::Database;
use crate::error::{Result, SemanticError};
use crate::exec::context::ExecutionContext;
use crate::semantic::{analyse, AnalysedStatement, QueryTree};
use crate::sql::parse_statement;
use crate::types::{BranchId, SqlTuple, Value};
use crate::version::manager::insert_tuple;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// One materialised result row; values are detached from table storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub values: Vec<Value>,
}

/// Outcome of one statement.
#[derive(Debug)]
pub enum ExecuteResult {
    /// Query rows (tuple-stream sink).
    Rows(Vec<Row>),
    /// DML row count.
    RowsAffected(u64),
    /// Query output went to a print sink.
    Printed,
    TableCreated { name: String },
    BranchCreated { name: String, id: BranchId },
}

/// Parses and executes `sql`; queries collect their rows.
pub fn execute(db: &Database, sql: &str) -> Result<ExecuteResult> {
    execute_with(db, sql, ResultMode::TupleStream, None)
}

/// Parses and executes, printing query output to `writer` as `|`-separated
/// lines.
pub fn execute_print<W: std::io::Write>(
    db: &Database,
    sql: &str,
    writer: &mut W,
) -> Result<ExecuteResult> {
    let stmt = parse_statement(sql)?;
    let analysed = analyse(db, &stmt, ResultMode::Print)?;
    match analysed {
        AnalysedStatement::Query(tree) => {
            let is_query = matches!(tree.root, LogicalOp::Result { .. });
            let ctx = ExecutionContext::new(db, tree.active_branch);
            let physical = prepare(&tree)?;
            let mut sink = ResultSink::Print(writer);
            physical::execute(&physical, &ctx, &mut sink)?;
            if is_query {
                Ok(ExecuteResult::Printed)
            } else {
                Ok(ExecuteResult::RowsAffected(ctx.rows_affected.get()))
            }
        }
        other => apply_ddl(db, other),
    }
}

/// Runs a query and collects its rows; DML is rejected.
pub fn query(db: &Database, sql: &str) -> Result<Vec<Row>> {
    match execute(db, sql)? {
        ExecuteResult::Rows(rows) => Ok(rows),
        _ => Err(SemanticError::UnsupportedFeature("statement is not a query").into()),
    }
}

/// Runs a query, streaming each row into `f` as it materialises.
pub fn query_with<F: FnMut(Row) -> Result<()>>(
    db: &Database,
    sql: &str,
    mut f: F,
) -> Result<()> {
    let stmt = parse_statement(sql)?;
    let analysed = analyse(db, &stmt, ResultMode::TupleStream)?;
    let AnalysedStatement::Query(tree) = analysed else {
        return Err(SemanticError::UnsupportedFeature("statement is not a query").into());
    };
    if !matches!(tree.root, LogicalOp::Result { .. }) {
        return Err(SemanticError::UnsupportedFeature("statement is not a query").into());
    }
    let ctx = ExecutionContext::new(db, tree.active_branch);
    let physical = prepare(&tree)?;
    let mut stream = |values: Vec<Value>| f(Row { values });
    let mut sink = ResultSink::Stream(&mut stream);
    physical::execute(&physical, &ctx, &mut sink)
}

/// Runs a query and returns projected column names alongside the rows.
pub fn query_with_columns(db: &Database, sql: &str) -> Result<(Vec<String>, Vec<Row>)> {
    let stmt = parse_statement(sql)?;
    let analysed = analyse(db, &stmt, ResultMode::TupleStream)?;
    let AnalysedStatement::Query(tree) = analysed else {
        return Err(SemanticError::UnsupportedFeature("statement is not a query").into());
    };
    let LogicalOp::Result { selection, .. } = &tree.root else {
        return Err(SemanticError::UnsupportedFeature("statement is not a query").into());
    };
    let columns = selection
        .iter()
        .map(|iu| {
            tree.factory
                .get(*iu)
                .column
                .as_ref()
                .map(|origin| origin.name.clone())
                .unwrap_or_else(|| format!("col{iu}"))
        })
        .collect();

    let ctx = ExecutionContext::new(db, tree.active_branch);
    let physical = prepare(&tree)?;
    let mut rows = Vec::new();
    let mut stream = |values: Vec<Value>| {
        rows.push(Row { values });
        Ok(())
    };
    let mut sink = ResultSink::Stream(&mut stream);
    physical::execute(&physical, &ctx, &mut sink)?;
    Ok((columns, rows))
}

/// Like [`query`], but polls an external cancellation flag.
pub fn query_cancellable(
    db: &Database,
    sql: &str,
    cancel: Arc<AtomicBool>,
) -> Result<Vec<Row>> {
    let stmt = parse_statement(sql)?;
    let analysed = analyse(db, &stmt, ResultMode::TupleStream)?;
    let AnalysedStatement::Query(tree) = analysed else {
        return Err(SemanticError::UnsupportedFeature("statement is not a query").into());
    };
    let ctx = ExecutionContext::with_cancel(db, tree.active_branch, cancel);
    let physical = prepare(&tree)?;
    let mut rows = Vec::new();
    let mut stream = |values: Vec<Value>| {
        rows.push(Row { values });
        Ok(())
    };
    let mut sink = ResultSink::Stream(&mut stream);
    physical::execute(&physical, &ctx, &mut sink)?;
    Ok(rows)
}

fn execute_with(
    db: &Database,
    sql: &str,
    mode: ResultMode,
    cancel: Option<Arc<AtomicBool>>,
) -> Result<ExecuteResult> {
    let stmt = parse_statement(sql)?;
    let analysed = analyse(db, &stmt, mode)?;
    match analysed {
        AnalysedStatement::Query(tree) => {
            let ctx = match cancel {
                Some(flag) => ExecutionContext::with_cancel(db, tree.active_branch, flag),
                None => ExecutionContext::new(db, tree.active_branch),
            };
            let physical = prepare(&tree)?;
            if matches!(tree.root, LogicalOp::Result { .. }) {
                let mut rows = Vec::new();
                let mut stream = |values: Vec<Value>| {
                    rows.push(Row { values });
                    Ok(())
                };
                let mut sink = ResultSink::Stream(&mut stream);
                physical::execute(&physical, &ctx, &mut sink)?;
                Ok(ExecuteResult::Rows(rows))
            } else {
                let mut stream = |_: Vec<Value>| Ok(());
                let mut sink = ResultSink::Stream(&mut stream);
                physical::execute(&physical, &ctx, &mut sink)?;
                Ok(ExecuteResult::RowsAffected(ctx.rows_affected.get()))
            }
        }
        other => apply_ddl(db, other),
    }
}

/// Analysis + validation + translation for one query tree.
fn prepare(tree: &QueryTree) -> Result<crate::algebra::physical::PhysicalOp> {
    let analysis = PlanAnalysis::analyze(&tree.root);
    if !analysis.validate(&tree.root) {
        return Err(
            SemanticError::UnsupportedFeature("plan failed dependency validation").into(),
        );
    }
    translate(&tree.root, &analysis, &tree.factory)
}

fn apply_ddl(db: &Database, analysed: AnalysedStatement) -> Result<ExecuteResult> {
    match analysed {
        AnalysedStatement::CreateTable { name, columns } => {
            db.create_table(&name, &columns)?;
            Ok(ExecuteResult::TableCreated { name })
        }
        AnalysedStatement::CreateBranch { name, parent } => {
            let id = db.create_branch(&name, parent)?;
            Ok(ExecuteResult::BranchCreated { name, id })
        }
        AnalysedStatement::Query(_) => unreachable!("queries handled by the caller"),
    }
}

/// Loads a `|`-separated dump into `table` on `branch`, one insert per
/// line. Fields match the table's columns positionally; `|` never occurs in
/// payloads (the dump format substitutes it on write).
pub fn load_table_dump<R: std::io::BufRead>(
    db: &Database,
    table_name: &str,
    branch: BranchId,
    reader: R,
) -> eyre::Result<usize> {
    let table = db
        .get_table(table_name)
        .ok_or_else(|| eyre::eyre!("unknown relation '{table_name}'"))?;
    let ctx = ExecutionContext::new(db, branch);
    let mut loaded = 0usize;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() != table.column_count() {
            eyre::bail!(
                "line {}: expected {} fields, found {}",
                line_no + 1,
                table.column_count(),
                fields.len()
            );
        }
        let values = fields
            .iter()
            .copied()
            .enumerate()
            .map(|(index, field)| {
                let ty = table.column_info(index).ty.not_nullable();
                Value::cast_from_string(field, ty)
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| eyre::eyre!("line {}: {e}", line_no + 1))?;
        insert_tuple(&SqlTuple::new(values), &table, &ctx, branch)?;
        loaded += 1;
    }
    Ok(loaded)
}
