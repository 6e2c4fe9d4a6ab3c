//! # Engine Error Taxonomy
//!
//! Structured errors for every layer of the engine. Each failure class is a
//! dedicated enum so callers and tests can match on the exact variant:
//!
//! | Class | Raised by |
//! |-------|-----------|
//! | `Error::Syntax` | tokenizer and statement state machine |
//! | `Error::Semantic` | scope resolution, verification, plan assembly |
//! | `Error::Runtime` | expression evaluation and operator execution |
//! | `Error::Version` | version-chain splicing under contention |
//! | `Error::Cancelled` | cooperative cancellation via the execution context |
//!
//! All variants convert into `eyre::Report` at the public API boundary, so
//! application code keeps the usual `eyre::Result` plumbing while tests can
//! `downcast_ref` to the structured variant.
//!
//! Statements are not transactional: operator errors abort the statement, but
//! side effects that already reached the version manager stay visible.

use thiserror::Error;

/// Top-level error for a single statement.
#[derive(Debug, Error)]
pub enum Error {
    #[error("syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error(transparent)]
    Semantic(#[from] SemanticError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("statement cancelled")]
    Cancelled,

    #[error("result sink i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Statement rejected during analysis; carries the offending identifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SemanticError {
    #[error("unknown relation '{0}'")]
    UnknownRelation(String),

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("column '{0}' is ambiguous")]
    AmbiguousColumn(String),

    #[error("column '{0}' already exists")]
    DuplicateColumn(String),

    #[error("table '{0}' already exists")]
    DuplicateTable(String),

    #[error("branch '{0}' already exists")]
    DuplicateBranch(String),

    #[error("unknown branch '{0}'")]
    UnknownBranch(String),

    #[error("type mismatch for '{0}'")]
    TypeMismatch(String),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),
}

/// Failure while evaluating expressions or driving operators.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("division by zero in {0}")]
    DivisionByZero(&'static str),

    #[error("numeric overflow in {0}")]
    Overflow(&'static str),

    #[error("cannot cast '{value}' to {target}")]
    InvalidCast { value: String, target: String },

    #[error("no such tuple: {0}")]
    NotFound(u64),
}

/// Version-manager failures on contended chains.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("version chain busy, retry the statement")]
    Retry,

    #[error("conflicting revision on the version chain")]
    Conflict,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
