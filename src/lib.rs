//! # branchdb - Branch-Versioned Relational Engine
//!
//! An in-memory, column-oriented relational engine whose every row carries a
//! version chain indexed by a directed branch lineage. Branches are
//! first-class: any branch can be forked from any other, and statements read
//! and write a branch with `VERSION` clauses.
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
//! assert_eq!(db.query("SELECT b FROM t x;")?.len(), 1);          // b = 2
//! assert_eq!(db.query("SELECT b FROM t VERSION b1 x;")?.len(), 1); // b = 3
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Public API (Database)            │
//! ├─────────────────────────────────────────┤
//! │ SQL Layer (lexer / parser / analyser)   │
//! ├─────────────────────────────────────────┤
//! │ Algebra (logical tree → physical tree)  │
//! ├─────────────────────────────────────────┤
//! │ Version Manager (chains / lineages)     │
//! ├─────────────────────────────────────────┤
//! │ Columnar Store (vectors / bitmaps)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`types`]: SQL types, runtime values, tid/branch identifiers
//! - [`storage`]: column vectors, bitmap tables, tables, text pools
//! - [`version`]: version chains, branch visibility, the version manager
//! - [`plan`]: information units and expression trees
//! - [`algebra`]: logical and physical operators plus translation
//! - [`sql`]: tokenizer and statement state machine
//! - [`semantic`]: scope resolution, join graphs, plan assembly
//! - [`exec`]: execution contexts and the statement driver
//! - [`cli`]: interactive shell
//!
//! ## Execution model
//!
//! One statement at a time, one thread, push-style produce/consume through
//! the physical tree. No durability: the database lives and dies in memory.

pub mod algebra;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod exec;
pub mod plan;
pub mod semantic;
pub mod sql;
pub mod storage;
pub mod types;
pub mod version;

pub use database::{Branch, Database};
pub use error::{Error, RuntimeError, SemanticError, VersionError};
pub use exec::{ExecuteResult, Row};
pub use types::{BranchId, SqlType, Tid, Value, MASTER_BRANCH_ID};
