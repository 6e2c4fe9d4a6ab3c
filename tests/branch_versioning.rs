//! # Version-Manager Properties
//!
//! Quantified invariants of the branch-versioned storage, driven through
//! the version-manager API and cross-checked through SQL.

use branchdb::exec::ExecutionContext;
use branchdb::storage::Table;
use branchdb::types::{is_dangling, mark_dangling, SqlTuple, SqlType, Tid, Value, MASTER_BRANCH_ID};
use branchdb::version::{
    construct_branch_lineage, delete_tuple, get_earliest_tuple, get_latest_tuple, get_tuple,
    insert_tuple, scan_relation, update_tuple,
};
use branchdb::Database;
use std::sync::Arc;

fn setup() -> (Database, Arc<Table>) {
    let db = Database::new();
    let table = db
        .create_table(
            "t",
            &[
                ("a".to_string(), SqlType::integer(false)),
                ("b".to_string(), SqlType::integer(false)),
            ],
        )
        .unwrap();
    (db, table)
}

fn row(a: i32, b: i32) -> SqlTuple {
    SqlTuple::new(vec![Value::Integer(a), Value::Integer(b)])
}

/// Property 1: in master, `get_latest_tuple` returns exactly the columnar
/// image for every tid.
#[test]
fn master_lookup_equals_columnar_image() {
    let (db, table) = setup();
    let ctx = ExecutionContext::new(&db, MASTER_BRANCH_ID);
    for i in 0..50 {
        insert_tuple(&row(i, i * 2), &table, &ctx, MASTER_BRANCH_ID).unwrap();
    }
    for tid in 0..table.size() as Tid {
        let via_chain = get_latest_tuple(tid, &table, &ctx, MASTER_BRANCH_ID)
            .unwrap()
            .unwrap();
        assert_eq!(via_chain, table.read_master_tuple(tid));
    }
}

/// Property 2: scanning a branch yields the same rows as pointwise
/// `get_latest_tuple` over all tids (dangling included), nulls filtered.
#[test]
fn scan_equals_pointwise_lookup() {
    let (db, table) = setup();
    let master_ctx = ExecutionContext::new(&db, MASTER_BRANCH_ID);
    for i in 0..20 {
        insert_tuple(&row(i, 100 + i), &table, &master_ctx, MASTER_BRANCH_ID).unwrap();
    }
    let b1 = db.create_branch("b1", MASTER_BRANCH_ID).unwrap();
    let ctx = ExecutionContext::new(&db, b1);
    update_tuple(3, &row(3, 333), &table, &ctx, b1).unwrap();
    update_tuple(7, &row(7, 777), &table, &ctx, b1).unwrap();
    delete_tuple(11, &table, &ctx, b1).unwrap();
    insert_tuple(&row(90, 90), &table, &ctx, b1).unwrap();
    insert_tuple(&row(91, 91), &table, &ctx, b1).unwrap();

    for branch in [MASTER_BRANCH_ID, b1] {
        let branch_ctx = ExecutionContext::new(&db, branch);
        let mut scanned = Vec::new();
        scan_relation(&table, &branch_ctx, branch, |tid, _| {
            scanned.push(tid);
            Ok(())
        })
        .unwrap();

        let mut expected = Vec::new();
        for tid in 0..table.size() as Tid {
            if get_latest_tuple(tid, &table, &branch_ctx, branch)
                .unwrap()
                .is_some()
            {
                expected.push(tid);
            }
        }
        for index in 0..table.dangling_size() as Tid {
            let tid = mark_dangling(index);
            if get_latest_tuple(tid, &table, &branch_ctx, branch)
                .unwrap()
                .is_some()
            {
                expected.push(tid);
            }
        }
        assert_eq!(scanned, expected, "scan/lookup divergence in branch {branch}");
    }
}

/// Property 3: an insert is immediately visible in its branch.
#[test]
fn insert_visible_in_every_target_branch() {
    let (db, table) = setup();
    let b1 = db.create_branch("b1", MASTER_BRANCH_ID).unwrap();
    let b2 = db.create_branch("b2", b1).unwrap();

    for branch in [MASTER_BRANCH_ID, b1, b2] {
        let ctx = ExecutionContext::new(&db, branch);
        let tuple = row(branch as i32, 1);
        let tid = insert_tuple(&tuple, &table, &ctx, branch).unwrap();
        assert_eq!(is_dangling(tid), branch != MASTER_BRANCH_ID);
        assert_eq!(
            get_latest_tuple(tid, &table, &ctx, branch).unwrap().unwrap(),
            tuple
        );
    }
}

/// Property 4: a non-master update is visible in its branch and invisible
/// in master.
#[test]
fn branch_update_preserves_master() {
    let (db, table) = setup();
    let ctx = ExecutionContext::new(&db, MASTER_BRANCH_ID);
    let tid = insert_tuple(&row(1, 2), &table, &ctx, MASTER_BRANCH_ID).unwrap();
    let b1 = db.create_branch("b1", MASTER_BRANCH_ID).unwrap();

    update_tuple(tid, &row(1, 3), &table, &ctx, b1).unwrap();

    assert_eq!(
        get_latest_tuple(tid, &table, &ctx, b1).unwrap().unwrap(),
        row(1, 3)
    );
    assert_eq!(
        get_latest_tuple(tid, &table, &ctx, MASTER_BRANCH_ID)
            .unwrap()
            .unwrap(),
        row(1, 2)
    );
}

/// Property 5: a delete tombstones one branch; siblings not descending from
/// the delete point keep their prior value.
#[test]
fn delete_is_local_to_the_branch() {
    let (db, table) = setup();
    let ctx = ExecutionContext::new(&db, MASTER_BRANCH_ID);
    let tid = insert_tuple(&row(1, 2), &table, &ctx, MASTER_BRANCH_ID).unwrap();
    let b1 = db.create_branch("b1", MASTER_BRANCH_ID).unwrap();
    let b2 = db.create_branch("b2", MASTER_BRANCH_ID).unwrap();
    let b3 = db.create_branch("b3", b1).unwrap();

    delete_tuple(tid, &table, &ctx, b1).unwrap();

    assert!(get_latest_tuple(tid, &table, &ctx, b1).unwrap().is_none());
    // a child of the deleting branch sees the tombstone through its lineage
    assert!(get_latest_tuple(tid, &table, &ctx, b3).unwrap().is_none());
    assert_eq!(
        get_latest_tuple(tid, &table, &ctx, b2).unwrap().unwrap(),
        row(1, 2)
    );
    assert_eq!(
        get_latest_tuple(tid, &table, &ctx, MASTER_BRANCH_ID)
            .unwrap()
            .unwrap(),
        row(1, 2)
    );
}

#[test]
fn revision_history_is_reachable_by_offset() {
    let (db, table) = setup();
    let master_ctx = ExecutionContext::new(&db, MASTER_BRANCH_ID);
    let tid = insert_tuple(&row(1, 0), &table, &master_ctx, MASTER_BRANCH_ID).unwrap();
    let b1 = db.create_branch("b1", MASTER_BRANCH_ID).unwrap();
    let ctx = ExecutionContext::new(&db, b1);

    for revision in 1..=3 {
        update_tuple(tid, &row(1, revision), &table, &ctx, b1).unwrap();
    }

    for offset in 0..3 {
        assert_eq!(
            get_tuple(tid, offset, &table, &ctx, b1).unwrap().unwrap(),
            row(1, 3 - offset as i32)
        );
    }
    assert_eq!(
        get_tuple(tid, 3, &table, &ctx, b1).unwrap().unwrap(),
        row(1, 0)
    );
    assert!(get_tuple(tid, 4, &table, &ctx, b1).unwrap().is_none());
    assert_eq!(
        get_earliest_tuple(tid, &table, &ctx, b1).unwrap().unwrap(),
        row(1, 0)
    );
}

/// Rows inserted into master after a branch was forked become visible in
/// that branch; master updates are shared until the branch diverges.
#[test]
fn destructive_master_semantics() {
    let (db, table) = setup();
    let ctx = ExecutionContext::new(&db, MASTER_BRANCH_ID);
    let tid = insert_tuple(&row(1, 10), &table, &ctx, MASTER_BRANCH_ID).unwrap();
    let b1 = db.create_branch("b1", MASTER_BRANCH_ID).unwrap();

    // in-place master rewrite is seen by the branch (no revision exists)
    update_tuple(tid, &row(1, 20), &table, &ctx, MASTER_BRANCH_ID).unwrap();
    assert_eq!(
        get_latest_tuple(tid, &table, &ctx, b1).unwrap().unwrap(),
        row(1, 20)
    );

    // after the branch diverges it is pinned to its own revision
    update_tuple(tid, &row(1, 30), &table, &ctx, b1).unwrap();
    update_tuple(tid, &row(1, 40), &table, &ctx, MASTER_BRANCH_ID).unwrap();
    assert_eq!(
        get_latest_tuple(tid, &table, &ctx, b1).unwrap().unwrap(),
        row(1, 30)
    );

    let late = insert_tuple(&row(2, 2), &table, &ctx, MASTER_BRANCH_ID).unwrap();
    assert_eq!(
        get_latest_tuple(late, &table, &ctx, b1).unwrap().unwrap(),
        row(2, 2)
    );
}

/// A lineage always starts at the branch itself and ends at master.
#[test]
fn lineage_shape() {
    let db = Database::new();
    let b1 = db.create_branch("b1", MASTER_BRANCH_ID).unwrap();
    let b2 = db.create_branch("b2", b1).unwrap();
    let ctx = ExecutionContext::new(&db, b2);
    let lineage = construct_branch_lineage(b2, &ctx);
    assert_eq!(lineage.as_slice(), &[b2, b1, MASTER_BRANCH_ID]);
}

#[test]
fn dangling_tids_round_trip_through_sql() {
    let db = Database::new();
    db.execute("CREATE TABLE t (a INTEGER NOT NULL);").unwrap();
    db.execute("CREATE BRANCH b1 FROM master;").unwrap();
    db.execute("INSERT INTO t VERSION b1 (a) VALUES (7);").unwrap();

    // update and delete must address the dangling row through its flagged tid
    db.execute("UPDATE t VERSION b1 SET a = 8 WHERE a = 7;").unwrap();
    let rows = db.query("SELECT a FROM t VERSION b1 x;").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values[0], Value::Integer(8));

    db.execute("DELETE FROM t VERSION b1 WHERE a = 8;").unwrap();
    assert!(db.query("SELECT a FROM t VERSION b1 x;").unwrap().is_empty());
}
