//! # Database: Catalog and Branch Tree
//!
//! [`Database`] owns the table catalog and the branch tree and is the public
//! entry point for SQL execution:
//!
//! ```ignore
//! use branchdb::Database;
//!
//! let db = Database::new();
//! db.execute("CREATE TABLE t (a INTEGER NOT NULL, b INTEGER NOT NULL);")?;
//! db.execute("INSERT INTO t (a, b) VALUES (1, 2);")?;
//! db.execute("CREATE BRANCH b1 FROM master;")?;
//! db.execute("UPDATE t VERSION b1 SET b = 3 WHERE a = 1;")?;
//!
//! let rows = db.query("SELECT b FROM t VERSION b1 x;")?;
//! ```
//!
//! ## Branch tree
//!
//! Branches form a tree rooted at `master` (id 0). Creating a branch
//! allocates the next id, records the parent, and widens every table's
//! branch-visibility bitmap by one column initialised from the parent's.
//! Branch ids double as bitmap column indexes, so ids are dense and never
//! reused.
//!
//! ## Locking
//!
//! One coarse mutex guards catalog and branch-tree mutation; statement
//! execution clones `Arc<Table>` handles out and runs without it. The engine
//! executes one statement at a time (single-writer invariant, see the
//! storage module).

use crate::error::{Result, SemanticError};
use crate::exec::{self, ExecuteResult, Row};
use crate::storage::Table;
use crate::types::{BranchId, SqlType, INVALID_BRANCH_ID, MASTER_BRANCH_ID};
use crate::version::Lineage;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One node of the branch tree.
#[derive(Debug, Clone)]
pub struct Branch {
    pub id: BranchId,
    pub parent_id: BranchId,
    pub name: String,
}

#[derive(Default)]
struct Catalog {
    tables: HashMap<String, Arc<Table>>,
    branches: HashMap<BranchId, Branch>,
    branch_names: HashMap<String, BranchId>,
    next_branch_id: BranchId,
}

pub struct Database {
    catalog: Mutex<Catalog>,
    next_ts: AtomicU64,
}

impl Database {
    pub fn new() -> Self {
        let mut catalog = Catalog::default();
        catalog.branches.insert(
            MASTER_BRANCH_ID,
            Branch {
                id: MASTER_BRANCH_ID,
                parent_id: INVALID_BRANCH_ID,
                name: "master".to_string(),
            },
        );
        catalog.branch_names.insert("master".to_string(), MASTER_BRANCH_ID);
        catalog.next_branch_id = 1;
        Self {
            catalog: Mutex::new(catalog),
            next_ts: AtomicU64::new(1),
        }
    }

    // ------------------------------------------------------------------
    // Tables

    /// Creates a table with the given columns; fails on duplicate table or
    /// column names.
    pub fn create_table(
        &self,
        name: &str,
        columns: &[(String, SqlType)],
    ) -> Result<Arc<Table>, SemanticError> {
        let mut catalog = self.catalog.lock();
        if catalog.tables.contains_key(name) {
            return Err(SemanticError::DuplicateTable(name.to_string()));
        }
        let mut table = Table::new(name, catalog.next_branch_id as usize);
        for (column_name, ty) in columns {
            table.add_column(column_name, *ty)?;
        }
        let table = Arc::new(table);
        catalog.tables.insert(name.to_string(), Arc::clone(&table));
        Ok(table)
    }

    pub fn get_table(&self, name: &str) -> Option<Arc<Table>> {
        self.catalog.lock().tables.get(name).cloned()
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.catalog.lock().tables.contains_key(name)
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.catalog.lock().tables.keys().cloned().collect();
        names.sort();
        names
    }

    // ------------------------------------------------------------------
    // Branches

    /// Creates a branch off `parent`; widens every table's visibility
    /// bitmap with a copy of the parent's column.
    pub fn create_branch(&self, name: &str, parent: BranchId) -> Result<BranchId, SemanticError> {
        let mut catalog = self.catalog.lock();
        if catalog.branch_names.contains_key(name) {
            return Err(SemanticError::DuplicateBranch(name.to_string()));
        }
        if !catalog.branches.contains_key(&parent) {
            return Err(SemanticError::UnknownBranch(format!("#{parent}")));
        }
        let id = catalog.next_branch_id;
        catalog.next_branch_id += 1;
        catalog.branches.insert(
            id,
            Branch {
                id,
                parent_id: parent,
                name: name.to_string(),
            },
        );
        catalog.branch_names.insert(name.to_string(), id);
        for table in catalog.tables.values() {
            table.create_branch(parent, id);
        }
        Ok(id)
    }

    pub fn branch_id(&self, name: &str) -> Option<BranchId> {
        self.catalog.lock().branch_names.get(name).copied()
    }

    pub fn branch(&self, id: BranchId) -> Option<Branch> {
        self.catalog.lock().branches.get(&id).cloned()
    }

    pub fn largest_branch_id(&self) -> BranchId {
        self.catalog.lock().next_branch_id - 1
    }

    pub fn branch_names(&self) -> Vec<String> {
        let mut catalog_names: Vec<_> = self
            .catalog
            .lock()
            .branches
            .values()
            .map(|b| b.name.clone())
            .collect();
        catalog_names.sort();
        catalog_names
    }

    /// The ordered path from `branch` up to master.
    pub fn construct_branch_lineage(&self, branch: BranchId) -> Lineage {
        let catalog = self.catalog.lock();
        let mut lineage = Lineage::new();
        let mut current = branch;
        while let Some(node) = catalog.branches.get(&current) {
            lineage.push(node.id);
            if node.id == MASTER_BRANCH_ID {
                break;
            }
            current = node.parent_id;
        }
        lineage
    }

    /// Every branch whose lineage passes through `ancestor` (the ancestor
    /// itself excluded).
    pub fn strict_descendants(&self, ancestor: BranchId) -> Vec<BranchId> {
        let catalog = self.catalog.lock();
        let mut result = Vec::new();
        for &id in catalog.branches.keys() {
            if id == ancestor {
                continue;
            }
            let mut current = id;
            while let Some(node) = catalog.branches.get(&current) {
                if node.id == ancestor {
                    result.push(id);
                    break;
                }
                if node.id == MASTER_BRANCH_ID {
                    break;
                }
                current = node.parent_id;
            }
        }
        result.sort_unstable();
        result
    }

    /// Monotonic logical timestamp for version-chain headers.
    pub fn next_timestamp(&self) -> u64 {
        self.next_ts.fetch_add(1, Ordering::Relaxed)
    }

    // ------------------------------------------------------------------
    // SQL entry points

    /// Parses, analyses, and executes one statement.
    pub fn execute(&self, sql: &str) -> eyre::Result<ExecuteResult> {
        exec::execute(self, sql).map_err(eyre::Report::new)
    }

    /// Executes a query and collects its rows.
    pub fn query(&self, sql: &str) -> eyre::Result<Vec<Row>> {
        exec::query(self, sql).map_err(eyre::Report::new)
    }

    /// Executes a query, returning projected column names with the rows.
    pub fn query_with_columns(&self, sql: &str) -> eyre::Result<(Vec<String>, Vec<Row>)> {
        exec::query_with_columns(self, sql).map_err(eyre::Report::new)
    }

    /// Executes a statement, printing query output to `writer`.
    pub fn execute_print<W: std::io::Write>(
        &self,
        sql: &str,
        writer: &mut W,
    ) -> eyre::Result<ExecuteResult> {
        exec::execute_print(self, sql, writer).map_err(eyre::Report::new)
    }

    /// Executes a query, streaming each row into `f`.
    pub fn query_with<F: FnMut(Row) -> Result<()>>(&self, sql: &str, f: F) -> eyre::Result<()> {
        exec::query_with(self, sql, f).map_err(eyre::Report::new)
    }

    /// Loads a `|`-separated table dump, one insert per line.
    pub fn load_table_dump<R: std::io::BufRead>(
        &self,
        table: &str,
        branch: BranchId,
        reader: R,
    ) -> eyre::Result<usize> {
        exec::load_table_dump(self, table, branch, reader)
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_branch_exists_from_the_start() {
        let db = Database::new();
        assert_eq!(db.branch_id("master"), Some(MASTER_BRANCH_ID));
        assert_eq!(db.largest_branch_id(), MASTER_BRANCH_ID);
    }

    #[test]
    fn branch_lineage_reaches_master() {
        let db = Database::new();
        let b1 = db.create_branch("b1", MASTER_BRANCH_ID).unwrap();
        let b2 = db.create_branch("b2", b1).unwrap();
        let lineage = db.construct_branch_lineage(b2);
        assert_eq!(lineage.as_slice(), &[b2, b1, MASTER_BRANCH_ID]);
        assert_eq!(
            db.construct_branch_lineage(MASTER_BRANCH_ID).as_slice(),
            &[MASTER_BRANCH_ID]
        );
    }

    #[test]
    fn duplicate_branch_rejected() {
        let db = Database::new();
        db.create_branch("b1", MASTER_BRANCH_ID).unwrap();
        let err = db.create_branch("b1", MASTER_BRANCH_ID).unwrap_err();
        assert_eq!(err, SemanticError::DuplicateBranch("b1".into()));
    }

    #[test]
    fn strict_descendants_follow_the_tree() {
        let db = Database::new();
        let b1 = db.create_branch("b1", MASTER_BRANCH_ID).unwrap();
        let b2 = db.create_branch("b2", b1).unwrap();
        let b3 = db.create_branch("b3", MASTER_BRANCH_ID).unwrap();
        assert_eq!(db.strict_descendants(b1), vec![b2]);
        assert_eq!(db.strict_descendants(MASTER_BRANCH_ID), vec![b1, b2, b3]);
        assert!(db.strict_descendants(b3).is_empty());
    }

    #[test]
    fn new_branch_widens_existing_tables() {
        let db = Database::new();
        let table = db
            .create_table("t", &[("a".to_string(), SqlType::integer(false))])
            .unwrap();
        assert_eq!(table.branch_bitmap().column_count(), 1);
        db.create_branch("b1", MASTER_BRANCH_ID).unwrap();
        assert_eq!(table.branch_bitmap().column_count(), 2);
    }

    #[test]
    fn tables_created_after_branches_cover_them() {
        let db = Database::new();
        db.create_branch("b1", MASTER_BRANCH_ID).unwrap();
        let table = db
            .create_table("t", &[("a".to_string(), SqlType::integer(false))])
            .unwrap();
        assert_eq!(table.branch_bitmap().column_count(), 2);
    }
}
