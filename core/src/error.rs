//! Error types for statement validation, statement building, engine calls,
//! and store operations.
//!
//! [`StoreError`] is what callers of [`Store`](crate::Store) see. Recoverable
//! engine failures (missing table, missing column) never reach it when the
//! corrective DDL succeeds.

use thiserror::Error;

use crate::context::Done;

/// A malformed [`InsertStatement`](crate::InsertStatement) or
/// [`QueryStatement`](crate::QueryStatement). Reported before any engine
/// interaction and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Table name is empty or whitespace-only.
    #[error("invalid insert statement: missing table name")]
    EmptyTable,
    /// The statement has no columns.
    #[error("invalid insert statement: no columns")]
    NoColumns,
    /// A column name is empty or whitespace-only.
    #[error("invalid insert statement: empty column name")]
    EmptyColumnName,
    /// A JSON row was not an object.
    #[error("invalid insert statement: row must be an object, got {0}")]
    NotAnObject(&'static str),
    /// Query text is empty or whitespace-only.
    #[error("invalid query statement: query empty")]
    EmptyQuery,
}

/// Failure to generate DDL for an insert statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A column's value has no storage type.
    #[error("{statement}: invalid data type for column ({column}): {kind}")]
    InvalidType {
        statement: &'static str,
        column: String,
        kind: &'static str,
    },
    /// The engine reported a missing column the statement does not contain.
    #[error("add column: column not present in insert statement: {0}")]
    UnknownColumn(String),
}

/// Failure reported by an [`Engine`](crate::Engine).
///
/// The `String` payloads carry the engine's own human-readable message,
/// which [`ErrorClassifier`](crate::ErrorClassifier)s match against.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A data or schema statement failed.
    #[error("{0}")]
    Execute(String),
    /// A read query failed before producing rows.
    #[error("{0}")]
    Query(String),
    /// Reading the next result row failed mid-iteration.
    #[error("scanning rows: {0}")]
    Scan(String),
    /// The caller's context was done before or during the call.
    #[error("{0}")]
    Cancelled(Done),
    /// The engine connection has been closed.
    #[error("engine closed")]
    Closed,
}

impl EngineError {
    /// The engine's message text, if this error carries one.
    pub fn message(&self) -> Option<&str> {
        match self {
            EngineError::Execute(msg) | EngineError::Query(msg) | EngineError::Scan(msg) => {
                Some(msg)
            }
            EngineError::Cancelled(_) | EngineError::Closed => None,
        }
    }
}

/// Errors returned by [`Store`](crate::Store) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Build(#[from] BuildError),

    /// The insert failed with an error that corrective DDL cannot fix.
    #[error("inserting values into {table}: {source}")]
    Insert { table: String, source: EngineError },

    #[error("creating table {table}: {source}")]
    CreateTable { table: String, source: EngineError },

    #[error("adding column {column} to {table}: {source}")]
    AddColumn {
        table: String,
        column: String,
        source: EngineError,
    },

    /// The insert kept failing with recoverable errors after `attempts`
    /// corrective statements.
    #[error("inserting values into {table}: schema still out of sync after {attempts} corrective statements: {last}")]
    RepairLimit {
        table: String,
        attempts: usize,
        last: EngineError,
    },

    #[error("query: {0}")]
    Query(#[source] EngineError),

    #[error("{operation}: {reason}")]
    Cancelled {
        operation: &'static str,
        reason: Done,
    },

    #[error("closing engine: {0}")]
    Close(#[source] EngineError),
}

impl StoreError {
    /// Returns `true` for errors caused by malformed input rather than the
    /// engine (validation and type inference failures).
    pub fn is_client_error(&self) -> bool {
        matches!(self, StoreError::Invalid(_) | StoreError::Build(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StoreError::Cancelled { .. })
    }
}
