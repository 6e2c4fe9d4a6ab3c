//! Parse results and the canonical printer.
//!
//! [`ParserResult`] is the tagged output of the statement state machine.
//! All payloads are plain owned strings — literal typing and name
//! resolution happen in the semantic analyser, not here.
//!
//! `Display` renders every statement in canonical form; parsing the printed
//! text yields the same parse result (the printer/parser round-trip).

use std::fmt;

/// A possibly binding-qualified attribute (`x.a` or bare `a`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub binding: Option<String>,
    pub name: String,
}

impl ColumnRef {
    /// Splits `x.a` into binding and attribute; a bare name has no binding.
    pub fn parse(text: &str) -> Self {
        match text.split_once('.') {
            Some((binding, name)) => Self {
                binding: Some(binding.to_string()),
                name: name.to_string(),
            },
            None => Self {
                binding: None,
                name: text.to_string(),
            },
        }
    }

}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.binding {
            Some(binding) => write!(f, "{binding}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A relation reference with optional branch version and alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub table: String,
    pub version: Option<String>,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn named(table: &str) -> Self {
        Self {
            table: table.to_string(),
            version: None,
            alias: None,
        }
    }

    /// Binding name used in scopes: the alias, or the table name itself.
    pub fn binding(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.table)?;
        if let Some(version) = &self.version {
            write!(f, " VERSION {version}")?;
        }
        if let Some(alias) = &self.alias {
            write!(f, " {alias}")?;
        }
        Ok(())
    }
}

/// Prints a literal canonically: numbers bare, everything else quoted.
fn fmt_literal(f: &mut fmt::Formatter<'_>, literal: &str) -> fmt::Result {
    let numeric = !literal.is_empty()
        && literal
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == '-');
    if numeric {
        f.write_str(literal)
    } else {
        write!(f, "'{literal}'")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectStatement {
    pub star: bool,
    pub projections: Vec<ColumnRef>,
    pub relations: Vec<TableRef>,
    /// `attr = attr` conjuncts.
    pub join_conditions: Vec<(ColumnRef, ColumnRef)>,
    /// `attr = literal` conjuncts.
    pub selections: Vec<(ColumnRef, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    pub relation: TableRef,
    pub columns: Vec<String>,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatement {
    pub relation: TableRef,
    pub assignments: Vec<(String, String)>,
    pub selections: Vec<(ColumnRef, String)>,
    pub join_conditions: Vec<(ColumnRef, ColumnRef)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteStatement {
    pub relation: TableRef,
    pub selections: Vec<(ColumnRef, String)>,
    pub join_conditions: Vec<(ColumnRef, ColumnRef)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub type_name: String,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub not_null: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTableStatement {
    pub table: String,
    pub columns: Vec<ColumnSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBranchStatement {
    pub branch: String,
    pub parent: String,
}

/// Tagged parse result, one variant per statement kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserResult {
    Select(SelectStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    CreateTable(CreateTableStatement),
    CreateBranch(CreateBranchStatement),
}

fn fmt_where(
    f: &mut fmt::Formatter<'_>,
    join_conditions: &[(ColumnRef, ColumnRef)],
    selections: &[(ColumnRef, String)],
) -> fmt::Result {
    if join_conditions.is_empty() && selections.is_empty() {
        return Ok(());
    }
    f.write_str(" WHERE ")?;
    let mut first = true;
    for (lhs, rhs) in join_conditions {
        if !first {
            f.write_str(" AND ")?;
        }
        write!(f, "{lhs} = {rhs}")?;
        first = false;
    }
    for (attr, literal) in selections {
        if !first {
            f.write_str(" AND ")?;
        }
        write!(f, "{attr} = ")?;
        fmt_literal(f, literal)?;
        first = false;
    }
    Ok(())
}

impl fmt::Display for ParserResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserResult::Select(stmt) => {
                f.write_str("SELECT ")?;
                if stmt.star {
                    f.write_str("*")?;
                } else {
                    for (i, projection) in stmt.projections.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{projection}")?;
                    }
                }
                f.write_str(" FROM ")?;
                for (i, relation) in stmt.relations.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{relation}")?;
                }
                fmt_where(f, &stmt.join_conditions, &stmt.selections)?;
                f.write_str(";")
            }
            ParserResult::Insert(stmt) => {
                write!(f, "INSERT INTO {} (", stmt.relation)?;
                for (i, column) in stmt.columns.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(column)?;
                }
                f.write_str(") VALUES (")?;
                for (i, value) in stmt.values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    fmt_literal(f, value)?;
                }
                f.write_str(");")
            }
            ParserResult::Update(stmt) => {
                write!(f, "UPDATE {} SET ", stmt.relation)?;
                for (i, (column, value)) in stmt.assignments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{column} = ")?;
                    fmt_literal(f, value)?;
                }
                fmt_where(f, &stmt.join_conditions, &stmt.selections)?;
                f.write_str(";")
            }
            ParserResult::Delete(stmt) => {
                write!(f, "DELETE FROM {}", stmt.relation)?;
                fmt_where(f, &stmt.join_conditions, &stmt.selections)?;
                f.write_str(";")
            }
            ParserResult::CreateTable(stmt) => {
                write!(f, "CREATE TABLE {} (", stmt.table)?;
                for (i, column) in stmt.columns.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {}", column.name, column.type_name)?;
                    match (column.length, column.precision) {
                        (Some(len), Some(prec)) => write!(f, "({len}, {prec})")?,
                        (Some(len), None) => write!(f, "({len})")?,
                        _ => {}
                    }
                    if column.not_null {
                        f.write_str(" NOT NULL")?;
                    }
                }
                f.write_str(");")
            }
            ParserResult::CreateBranch(stmt) => {
                write!(f, "CREATE BRANCH {} FROM {};", stmt.branch, stmt.parent)
            }
        }
    }
}
