//! The schema-synchronizing store.
//!
//! [`Store::insert`] runs the write path as a small state machine:
//!
//! 1. validate the statement and build the parameterized insert
//! 2. execute the insert
//! 3. on failure, classify the engine error:
//!    - missing table: `CREATE TABLE IF NOT EXISTS` with every column of
//!      the statement, then back to 2
//!    - missing column: `ALTER TABLE ... ADD COLUMN`, then back to 2
//!    - anything else: fail with the original engine error
//!
//! The whole sequence runs inside a single write section so two inserts can
//! never interleave their DDL. The number of corrective statements per
//! insert is bounded (see [`Store::with_repair_limit`]).
//!
//! [`Store::query`] is a pass-through: it does not take the write section,
//! so reads run concurrently with each other and with writes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::builder::{build_add_column, build_create_table, build_insert};
use crate::classify::{ErrorClassifier, PatternClassifier, Recovery};
use crate::context::Context;
use crate::engine::{Engine, QueryResult};
use crate::error::{EngineError, StoreError};
use crate::statement::{InsertStatement, QueryStatement};
use crate::types::Row;

const LOCK_POLL_MIN: Duration = Duration::from_micros(50);
const LOCK_POLL_MAX: Duration = Duration::from_millis(5);

/// Schema-synchronizing data store over an [`Engine`].
///
/// # Examples
///
/// ```no_run
/// use autotable_core::{Context, InsertStatement, QueryStatement, Store, PatternClassifier};
/// # fn demo<E: autotable_core::Engine>(engine: E) -> Result<(), autotable_core::StoreError> {
/// let store = Store::new(engine, PatternClassifier::sqlite());
/// let ctx = Context::background();
///
/// store.insert(&InsertStatement::new("events").with_column("kind", "click"), &ctx)?;
/// let rows = store.query(&QueryStatement::new("SELECT * FROM events"), &ctx)?;
/// assert_eq!(rows.len(), 1);
///
/// store.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Store<E, C = PatternClassifier> {
    engine: E,
    classifier: C,
    write_lock: Mutex<()>,
    repair_limit: Option<usize>,
    closed: AtomicBool,
}

impl<E: Engine, C: ErrorClassifier> Store<E, C> {
    /// Creates a store that owns `engine` and classifies its failures with
    /// `classifier`.
    pub fn new(engine: E, classifier: C) -> Self {
        Self {
            engine,
            classifier,
            write_lock: Mutex::new(()),
            repair_limit: None,
            closed: AtomicBool::new(false),
        }
    }

    /// Caps the number of corrective DDL statements a single insert may
    /// issue.
    ///
    /// Without a cap the limit is the statement's column count plus one:
    /// one `CREATE TABLE` and one `ADD COLUMN` per column is the most a
    /// consistent engine can ever ask for.
    pub fn with_repair_limit(mut self, limit: usize) -> Self {
        self.repair_limit = Some(limit);
        self
    }

    /// Returns a reference to the underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Inserts one row, creating the table or adding columns as needed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Invalid`] for a malformed statement (no engine call)
    /// - [`StoreError::Build`] if corrective DDL is needed for a column whose
    ///   value has no storage type
    /// - [`StoreError::Insert`] if the insert fails for any other reason
    /// - [`StoreError::CreateTable`] / [`StoreError::AddColumn`] if the DDL
    ///   itself fails
    /// - [`StoreError::RepairLimit`] if the schema is still out of sync
    ///   after the allowed number of corrective statements
    /// - [`StoreError::Cancelled`] if `ctx` is done
    #[instrument(skip_all, fields(table = %stmt.table))]
    pub fn insert(&self, stmt: &InsertStatement, ctx: &Context) -> Result<(), StoreError> {
        stmt.validate()?;
        let insert = build_insert(stmt)?;
        ctx.check().map_err(|reason| StoreError::Cancelled {
            operation: "insert",
            reason,
        })?;

        let _section = self.enter_write_section(ctx)?;

        let limit = self.repair_limit.unwrap_or(stmt.columns.len() + 1);
        let mut repairs = 0;
        loop {
            ctx.check().map_err(|reason| StoreError::Cancelled {
                operation: "insert",
                reason,
            })?;

            debug!(sql = %insert.sql, "executing insert");
            let err = match self.engine.execute(&insert.sql, &insert.params, ctx) {
                Ok(affected) => {
                    debug!(affected, repairs, "insert complete");
                    return Ok(());
                }
                Err(err) => err,
            };

            if let EngineError::Cancelled(reason) = err {
                return Err(StoreError::Cancelled {
                    operation: "insert",
                    reason,
                });
            }

            let recovery = self.classifier.classify(&err);
            if recovery == Recovery::Unrecoverable {
                return Err(StoreError::Insert {
                    table: stmt.table.clone(),
                    source: err,
                });
            }
            if repairs >= limit {
                warn!(repairs, error = %err, "repair limit reached");
                return Err(StoreError::RepairLimit {
                    table: stmt.table.clone(),
                    attempts: repairs,
                    last: err,
                });
            }

            repairs += 1;
            self.repair(stmt, recovery, ctx)?;
        }
    }

    /// Waits for the write section, giving up once `ctx` is done.
    fn enter_write_section(&self, ctx: &Context) -> Result<MutexGuard<'_, ()>, StoreError> {
        let mut backoff = LOCK_POLL_MIN;
        loop {
            match self.write_lock.try_lock() {
                Ok(guard) => return Ok(guard),
                // The section guards no in-memory state, so a poisoned lock
                // is still usable.
                Err(TryLockError::Poisoned(poisoned)) => return Ok(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => {
                    ctx.check().map_err(|reason| StoreError::Cancelled {
                        operation: "insert",
                        reason,
                    })?;
                    thread::sleep(backoff);
                    backoff = (backoff * 2).min(LOCK_POLL_MAX);
                }
            }
        }
    }

    /// Runs the corrective DDL for one classified failure.
    fn repair(
        &self,
        stmt: &InsertStatement,
        recovery: Recovery,
        ctx: &Context,
    ) -> Result<(), StoreError> {
        let dialect = self.engine.dialect();
        match recovery {
            Recovery::MissingTable => {
                let sql = build_create_table(stmt, &dialect)?;
                debug!(%sql, "creating table");
                self.engine
                    .execute(&sql, &[], ctx)
                    .map_err(|source| match source {
                        EngineError::Cancelled(reason) => StoreError::Cancelled {
                            operation: "create table",
                            reason,
                        },
                        source => StoreError::CreateTable {
                            table: stmt.table.clone(),
                            source,
                        },
                    })?;
                info!(columns = stmt.columns.len(), "created table");
            }
            Recovery::MissingColumn(column) => {
                let sql = build_add_column(stmt, &column, &dialect)?;
                debug!(%sql, "adding column");
                self.engine
                    .execute(&sql, &[], ctx)
                    .map_err(|source| match source {
                        EngineError::Cancelled(reason) => StoreError::Cancelled {
                            operation: "add column",
                            reason,
                        },
                        source => StoreError::AddColumn {
                            table: stmt.table.clone(),
                            column: column.clone(),
                            source,
                        },
                    })?;
                info!(%column, "added column");
            }
            Recovery::Unrecoverable => {}
        }
        Ok(())
    }

    /// Runs a read query verbatim and returns every row.
    ///
    /// Does not enter the write section.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for an empty query (no engine call),
    /// [`StoreError::Cancelled`] if `ctx` is done, and [`StoreError::Query`]
    /// for any engine failure.
    #[instrument(skip_all)]
    pub fn query(&self, stmt: &QueryStatement, ctx: &Context) -> Result<Vec<Row>, StoreError> {
        stmt.validate()?;
        ctx.check().map_err(|reason| StoreError::Cancelled {
            operation: "query",
            reason,
        })?;

        let QueryResult { columns, rows } =
            self.engine
                .query(&stmt.query, ctx)
                .map_err(|err| match err {
                    EngineError::Cancelled(reason) => StoreError::Cancelled {
                        operation: "query",
                        reason,
                    },
                    err => StoreError::Query(err),
                })?;

        let rows: Vec<Row> = rows
            .into_iter()
            .map(|values| Row::new(columns.iter().cloned().zip(values).collect()))
            .collect();
        debug!(rows = rows.len(), columns = columns.len(), "query complete");
        Ok(rows)
    }

    /// Closes the engine. Only the first call reaches the engine; later
    /// calls return `Ok(())`.
    pub fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.engine.close().map_err(StoreError::Close)
    }
}
