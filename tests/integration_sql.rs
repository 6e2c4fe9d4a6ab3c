//! # End-to-End SQL Tests
//!
//! Exercises the full chain — parse, analyse, translate, execute — through
//! the public `Database` API. Expected values are computed by hand, never
//! derived from running the engine.

use branchdb::error::{Error, SemanticError};
use branchdb::exec::Row;
use branchdb::{Database, Value};

fn execute(db: &Database, sql: &str) {
    if let Err(e) = db.execute(sql) {
        panic!("SQL failed: {sql}\nerror: {e:?}");
    }
}

fn query_cells(db: &Database, sql: &str) -> Vec<Vec<String>> {
    db.query(sql)
        .unwrap()
        .into_iter()
        .map(|row| row.values.iter().map(|v| v.to_string()).collect())
        .collect()
}

fn assert_rows(actual: Vec<Vec<String>>, expected: &[&[&str]]) {
    let expected: Vec<Vec<String>> = expected
        .iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect();
    assert_eq!(actual, expected);
}

fn semantic_error(db: &Database, sql: &str) -> SemanticError {
    let report = db.execute(sql).unwrap_err();
    match report.downcast_ref::<Error>() {
        Some(Error::Semantic(semantic)) => semantic.clone(),
        other => panic!("expected a semantic error for {sql}, got {other:?}"),
    }
}

#[test]
fn single_row_insert_and_select() {
    let db = Database::new();
    execute(&db, "CREATE TABLE t (a INTEGER NOT NULL, b INTEGER NOT NULL);");
    execute(&db, "INSERT INTO t (a, b) VALUES (1, 2);");
    assert_rows(query_cells(&db, "SELECT a, b FROM t x;"), &[&["1", "2"]]);
}

#[test]
fn branch_update_is_isolated_from_master() {
    let db = Database::new();
    execute(&db, "CREATE TABLE t (a INTEGER NOT NULL, b INTEGER NOT NULL);");
    execute(&db, "INSERT INTO t (a, b) VALUES (1, 2);");
    execute(&db, "CREATE BRANCH b1 FROM master;");
    execute(&db, "UPDATE t VERSION b1 SET b = 3 WHERE a = 1;");

    assert_rows(query_cells(&db, "SELECT b FROM t VERSION b1 x;"), &[&["3"]]);
    assert_rows(query_cells(&db, "SELECT b FROM t x;"), &[&["2"]]);
}

#[test]
fn branch_insert_is_dangling() {
    let db = Database::new();
    execute(&db, "CREATE TABLE t (a INTEGER NOT NULL, b INTEGER NOT NULL);");
    execute(&db, "INSERT INTO t (a, b) VALUES (1, 2);");
    execute(&db, "CREATE BRANCH b1 FROM master;");
    execute(&db, "INSERT INTO t VERSION b1 (a, b) VALUES (9, 9);");

    assert_rows(query_cells(&db, "SELECT a FROM t x;"), &[&["1"]]);
    assert_rows(
        query_cells(&db, "SELECT a FROM t VERSION b1 x;"),
        &[&["1"], &["9"]],
    );
}

#[test]
fn equi_join_two_tables() {
    let db = Database::new();
    execute(&db, "CREATE TABLE t (a INTEGER NOT NULL, b INTEGER NOT NULL);");
    execute(&db, "INSERT INTO t (a, b) VALUES (1, 2);");
    execute(&db, "CREATE TABLE u (a INTEGER NOT NULL, c INTEGER NOT NULL);");
    execute(&db, "INSERT INTO u (a, c) VALUES (1, 7);");

    assert_rows(
        query_cells(&db, "SELECT b, c FROM t x, u y WHERE x.a = y.a;"),
        &[&["2", "7"]],
    );
}

#[test]
fn bare_ambiguous_column_is_rejected() {
    let db = Database::new();
    execute(&db, "CREATE TABLE t (a INTEGER NOT NULL, b INTEGER NOT NULL);");
    execute(&db, "CREATE TABLE u2 (a INTEGER NOT NULL);");
    assert_eq!(
        semantic_error(&db, "SELECT a FROM t x, u2 y;"),
        SemanticError::AmbiguousColumn("a".to_string())
    );
}

#[test]
fn qualified_names_resolve_despite_collision() {
    let db = Database::new();
    execute(&db, "CREATE TABLE t (a INTEGER NOT NULL, b INTEGER NOT NULL);");
    execute(&db, "CREATE TABLE u2 (a INTEGER NOT NULL);");
    execute(&db, "INSERT INTO t (a, b) VALUES (5, 6);");
    execute(&db, "INSERT INTO u2 (a) VALUES (5);");
    assert_rows(
        query_cells(&db, "SELECT x.a FROM t x, u2 y WHERE x.a = y.a;"),
        &[&["5"]],
    );
}

#[test]
fn star_expands_all_relations() {
    let db = Database::new();
    execute(&db, "CREATE TABLE t (a INTEGER NOT NULL, b INTEGER NOT NULL);");
    execute(&db, "INSERT INTO t (a, b) VALUES (1, 2);");
    assert_rows(query_cells(&db, "SELECT * FROM t;"), &[&["1", "2"]]);
}

#[test]
fn delete_removes_rows_per_branch() {
    let db = Database::new();
    execute(&db, "CREATE TABLE t (a INTEGER NOT NULL, b INTEGER NOT NULL);");
    execute(&db, "INSERT INTO t (a, b) VALUES (1, 2);");
    execute(&db, "INSERT INTO t (a, b) VALUES (3, 4);");
    execute(&db, "CREATE BRANCH b1 FROM master;");
    execute(&db, "DELETE FROM t VERSION b1 WHERE a = 1;");

    assert_rows(query_cells(&db, "SELECT a FROM t VERSION b1 x;"), &[&["3"]]);
    assert_rows(query_cells(&db, "SELECT a FROM t x;"), &[&["1"], &["3"]]);
}

#[test]
fn master_delete_hides_the_row() {
    let db = Database::new();
    execute(&db, "CREATE TABLE t (a INTEGER NOT NULL, b INTEGER NOT NULL);");
    execute(&db, "INSERT INTO t (a, b) VALUES (1, 2);");
    execute(&db, "INSERT INTO t (a, b) VALUES (3, 4);");
    execute(&db, "DELETE FROM t WHERE a = 3;");
    assert_rows(query_cells(&db, "SELECT a FROM t x;"), &[&["1"]]);
}

#[test]
fn update_on_master_is_destructive() {
    let db = Database::new();
    execute(&db, "CREATE TABLE t (a INTEGER NOT NULL, b INTEGER NOT NULL);");
    execute(&db, "INSERT INTO t (a, b) VALUES (1, 2);");
    execute(&db, "UPDATE t SET b = 20 WHERE a = 1;");
    assert_rows(query_cells(&db, "SELECT b FROM t x;"), &[&["20"]]);
}

#[test]
fn nested_branches_read_through_lineage() {
    let db = Database::new();
    execute(&db, "CREATE TABLE t (a INTEGER NOT NULL, b INTEGER NOT NULL);");
    execute(&db, "INSERT INTO t (a, b) VALUES (1, 10);");
    execute(&db, "CREATE BRANCH b1 FROM master;");
    execute(&db, "UPDATE t VERSION b1 SET b = 11 WHERE a = 1;");
    execute(&db, "CREATE BRANCH b2 FROM b1;");

    // b2 inherits b1's revision, then diverges
    assert_rows(query_cells(&db, "SELECT b FROM t VERSION b2 x;"), &[&["11"]]);
    execute(&db, "UPDATE t VERSION b2 SET b = 12 WHERE a = 1;");
    assert_rows(query_cells(&db, "SELECT b FROM t VERSION b2 x;"), &[&["12"]]);
    assert_rows(query_cells(&db, "SELECT b FROM t VERSION b1 x;"), &[&["11"]]);
    assert_rows(query_cells(&db, "SELECT b FROM t x;"), &[&["10"]]);
}

#[test]
fn version_clause_on_insert_update_delete_round_trip() {
    let db = Database::new();
    execute(&db, "CREATE TABLE t (a INTEGER NOT NULL, b TEXT);");
    execute(&db, "CREATE BRANCH dev FROM master;");
    execute(&db, "INSERT INTO t VERSION dev (a, b) VALUES (1, 'only in dev');");
    execute(&db, "UPDATE t VERSION dev SET b = 'rewritten' WHERE a = 1;");

    assert_rows(
        query_cells(&db, "SELECT b FROM t VERSION dev x;"),
        &[&["rewritten"]],
    );
    assert!(query_cells(&db, "SELECT b FROM t x;").is_empty());

    execute(&db, "DELETE FROM t VERSION dev WHERE a = 1;");
    assert!(query_cells(&db, "SELECT b FROM t VERSION dev x;").is_empty());
}

#[test]
fn text_and_numeric_columns_round_trip() {
    let db = Database::new();
    execute(
        &db,
        "CREATE TABLE items (name TEXT NOT NULL, price NUMERIC(10, 2) NOT NULL);",
    );
    execute(
        &db,
        "INSERT INTO items (name, price) VALUES ('a reasonably long product name', 12.5);",
    );
    assert_rows(
        query_cells(&db, "SELECT name, price FROM items x;"),
        &[&["a reasonably long product name", "12.50"]],
    );
}

#[test]
fn semantic_error_taxonomy() {
    let db = Database::new();
    execute(&db, "CREATE TABLE t (a INTEGER NOT NULL);");

    assert_eq!(
        semantic_error(&db, "SELECT a FROM missing x;"),
        SemanticError::UnknownRelation("missing".to_string())
    );
    assert_eq!(
        semantic_error(&db, "SELECT nope FROM t x;"),
        SemanticError::UnknownColumn("nope".to_string())
    );
    assert_eq!(
        semantic_error(&db, "CREATE TABLE t (a INTEGER);"),
        SemanticError::DuplicateTable("t".to_string())
    );
    assert_eq!(
        semantic_error(&db, "CREATE TABLE u (a INTEGER, a INTEGER);"),
        SemanticError::DuplicateColumn("a".to_string())
    );
    assert_eq!(
        semantic_error(&db, "SELECT a FROM t VERSION nope x;"),
        SemanticError::UnknownBranch("nope".to_string())
    );
    assert_eq!(
        semantic_error(&db, "INSERT INTO t (a) VALUES ('not a number');"),
        SemanticError::TypeMismatch("a".to_string())
    );

    execute(&db, "CREATE BRANCH dup FROM master;");
    assert_eq!(
        semantic_error(&db, "CREATE BRANCH dup FROM master;"),
        SemanticError::DuplicateBranch("dup".to_string())
    );
}

#[test]
fn syntax_errors_carry_position() {
    let db = Database::new();
    let report = db.execute("SELEKT a FROM t;").unwrap_err();
    match report.downcast_ref::<Error>() {
        Some(Error::Syntax { position, .. }) => assert_eq!(*position, 0),
        other => panic!("expected syntax error, got {other:?}"),
    }
}

#[test]
fn print_sink_writes_pipe_separated_lines() {
    let db = Database::new();
    execute(&db, "CREATE TABLE t (a INTEGER NOT NULL, b TEXT NOT NULL);");
    execute(&db, "INSERT INTO t (a, b) VALUES (1, 'one');");
    execute(&db, "INSERT INTO t (a, b) VALUES (2, 'two');");

    let mut out = Vec::new();
    db.execute_print("SELECT a, b FROM t x;", &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "1|one\n2|two\n");
}

#[test]
fn streaming_sink_sees_rows_in_scan_order() {
    let db = Database::new();
    execute(&db, "CREATE TABLE t (a INTEGER NOT NULL);");
    for i in 0..5 {
        execute(&db, &format!("INSERT INTO t (a) VALUES ({i});"));
    }
    let mut seen = Vec::new();
    db.query_with("SELECT a FROM t x;", |row: Row| {
        if let Value::Integer(v) = row.values[0] {
            seen.push(v);
        }
        Ok(())
    })
    .unwrap();
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
}

#[test]
fn rows_affected_counts() {
    let db = Database::new();
    execute(&db, "CREATE TABLE t (a INTEGER NOT NULL, b INTEGER NOT NULL);");
    for i in 0..4 {
        execute(&db, &format!("INSERT INTO t (a, b) VALUES ({i}, 0);"));
    }
    match db.execute("UPDATE t SET b = 1 WHERE a = 2;").unwrap() {
        branchdb::ExecuteResult::RowsAffected(n) => assert_eq!(n, 1),
        other => panic!("unexpected result {other:?}"),
    }
    match db.execute("DELETE FROM t;").unwrap() {
        branchdb::ExecuteResult::RowsAffected(n) => assert_eq!(n, 4),
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn table_dump_loader_appends_rows() {
    let db = Database::new();
    execute(&db, "CREATE TABLE page (id INTEGER NOT NULL, title TEXT NOT NULL);");
    let dump = "1|First Page\n2|Second ~ Page\n";
    let loaded = db
        .load_table_dump("page", branchdb::MASTER_BRANCH_ID, dump.as_bytes())
        .unwrap();
    assert_eq!(loaded, 2);
    assert_rows(
        query_cells(&db, "SELECT title FROM page x;"),
        &[&["First Page"], &["Second ~ Page"]],
    );
}
