//! The boundary to the SQL engine that holds the actual data and schema.
//!
//! The core never talks to a database directly. Everything goes through
//! [`Engine`], which the `autotable-sqlite` crate implements on top of
//! SQLite and the store tests implement with a scripted mock.

use crate::builder::Dialect;
use crate::context::Context;
use crate::error::EngineError;
use crate::types::{ColumnValue, Value};

/// Materialized result of a read query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Column names as reported by the engine, in result order.
    pub columns: Vec<String>,
    /// One entry per row, each holding one value per column in `columns`
    /// order.
    pub rows: Vec<Vec<Value>>,
}

/// A SQL-executing engine.
///
/// Implementations must be shareable across threads: reads may run
/// concurrently with each other and with a write. Every call receives the
/// caller's [`Context`] and should return [`EngineError::Cancelled`]
/// promptly once it is done.
pub trait Engine: Send + Sync {
    /// How column types are spelled in DDL for this engine.
    fn dialect(&self) -> Dialect;

    /// Runs a data or schema statement with positional parameters and
    /// returns the number of rows affected.
    ///
    /// Failures carry the engine's message in [`EngineError::Execute`].
    fn execute(
        &self,
        sql: &str,
        params: &[&ColumnValue],
        ctx: &Context,
    ) -> Result<usize, EngineError>;

    /// Runs a read query and collects every row.
    ///
    /// A query that cannot start fails with [`EngineError::Query`]; a
    /// failure while stepping through rows fails with [`EngineError::Scan`].
    fn query(&self, sql: &str, ctx: &Context) -> Result<QueryResult, EngineError>;

    /// Closes the underlying connection(s). Calls after the first are
    /// no-ops.
    fn close(&self) -> Result<(), EngineError>;
}
