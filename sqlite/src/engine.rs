//! [`Engine`] implementation on SQLite.
//!
//! One dedicated writer connection executes inserts and DDL; reads run on a
//! small pool of reader connections so they are never queued behind the
//! writer. File databases use WAL so readers and the writer do not block
//! each other. In-memory databases use a uniquely named shared-cache URI so
//! every connection of an engine sees the same data. Shared-cache table
//! lock conflicts fail immediately rather than waiting, so both paths retry
//! them with backoff.
//!
//! Cancellation is delivered through SQLite's progress handler: while a
//! statement runs, the handler polls the caller's [`Context`] and interrupts
//! the statement once it is done.

use std::os::raw::c_int;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use autotable_core::{ColumnValue, Context, Dialect, Engine, EngineError, QueryResult, Value};
use rusqlite::types::{Null, ToSqlOutput, ValueRef};
use rusqlite::{Connection, ErrorCode, OpenFlags, ToSql, params_from_iter};
use tracing::{debug, instrument, warn};

use crate::config::EngineConfig;
use crate::error::Result;

/// Number of SQLite VM instructions between cancellation checks.
const PROGRESS_INTERVAL: c_int = 1000;

const LOCKED_BACKOFF_MIN: Duration = Duration::from_micros(100);
const LOCKED_BACKOFF_MAX: Duration = Duration::from_millis(10);

static MEMORY_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
enum Location {
    /// Shared-cache URI of a private in-memory database.
    Memory(String),
    File(PathBuf),
}

impl Location {
    fn open(&self) -> rusqlite::Result<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        match self {
            Location::Memory(uri) => Connection::open_with_flags(uri, flags),
            Location::File(path) => Connection::open_with_flags(path, flags),
        }
    }
}

/// SQLite-backed [`Engine`].
///
/// # Examples
///
/// ```
/// use autotable_core::{Context, Engine};
/// use autotable_sqlite::{EngineConfig, SqliteEngine};
///
/// let engine = SqliteEngine::open(&EngineConfig::default()).unwrap();
/// let result = engine.query("SELECT 1 AS one", &Context::background()).unwrap();
/// assert_eq!(result.columns, vec!["one"]);
/// engine.close().unwrap();
/// ```
pub struct SqliteEngine {
    location: Location,
    dialect: Dialect,
    busy_timeout: Duration,
    max_idle_readers: usize,
    writer: Mutex<Option<Connection>>,
    readers: Mutex<Vec<Connection>>,
    closed: AtomicBool,
}

impl SqliteEngine {
    /// Opens the database described by `config` and its writer connection.
    ///
    /// Reader connections are opened lazily on the first queries.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::DatabaseError`](crate::SqliteError::DatabaseError)
    /// if the database cannot be opened or configured.
    #[instrument(skip_all, fields(path = ?config.path))]
    pub fn open(config: &EngineConfig) -> Result<Self> {
        let location = match &config.path {
            Some(path) => Location::File(path.clone()),
            None => Location::Memory(format!(
                "file:autotable-mem-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                MEMORY_DB_COUNTER.fetch_add(1, Ordering::Relaxed)
            )),
        };
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);

        let writer = location.open()?;
        writer.busy_timeout(busy_timeout)?;
        if let Location::File(_) = location {
            let mode: String =
                writer.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
            debug!(journal_mode = %mode, "configured journal mode");
        }

        let dialect = if config.strict_tables {
            Dialect::SQLITE_STRICT
        } else {
            Dialect::SQLITE
        };

        debug!(?location, strict = config.strict_tables, "opened engine");
        Ok(Self {
            location,
            dialect,
            busy_timeout,
            max_idle_readers: config.max_idle_readers,
            writer: Mutex::new(Some(writer)),
            readers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Number of reader connections currently idle in the pool.
    pub fn idle_readers(&self) -> usize {
        self.readers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Runs `op`, retrying while the database reports a locked table.
    ///
    /// Shared-cache connections lock individual tables (including
    /// `sqlite_master` during DDL) and report conflicts immediately instead
    /// of waiting. Retries back off exponentially and stop once `ctx` is
    /// done or the busy timeout has elapsed.
    fn retry_locked<T>(
        &self,
        ctx: &Context,
        mut op: impl FnMut() -> std::result::Result<T, Failure>,
    ) -> std::result::Result<T, EngineError> {
        let give_up = Instant::now() + self.busy_timeout;
        let mut backoff = LOCKED_BACKOFF_MIN;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(failure)
                    if failure.is_locked() && !ctx.is_done() && Instant::now() < give_up =>
                {
                    debug!(error = %failure.err, ?backoff, "table locked, retrying");
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(LOCKED_BACKOFF_MAX);
                }
                Err(failure) => return Err(failure.into_engine_error(ctx)),
            }
        }
    }

    fn open_reader(&self) -> rusqlite::Result<Connection> {
        let conn = self.location.open()?;
        conn.busy_timeout(self.busy_timeout)?;
        if let Location::Memory(_) = self.location {
            // Skips read locks on data tables. Conflicts on the schema
            // table remain and are retried.
            conn.execute_batch("PRAGMA read_uncommitted = true;")?;
        }
        Ok(conn)
    }

    fn checkout_reader(&self) -> std::result::Result<Connection, EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        let idle = self
            .readers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        match idle {
            Some(conn) => Ok(conn),
            None => self
                .open_reader()
                .map_err(|err| EngineError::Query(err.to_string())),
        }
    }

    fn checkin_reader(&self, conn: Connection) {
        let mut idle = self.readers.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.closed.load(Ordering::SeqCst) && idle.len() < self.max_idle_readers {
            idle.push(conn);
        }
    }
}

impl Engine for SqliteEngine {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn execute(
        &self,
        sql: &str,
        params: &[&ColumnValue],
        ctx: &Context,
    ) -> std::result::Result<usize, EngineError> {
        ctx.check().map_err(EngineError::Cancelled)?;
        let guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let conn = guard.as_ref().ok_or(EngineError::Closed)?;

        let _watch = CancelWatch::install(conn, ctx);
        let affected = self.retry_locked(ctx, || {
            let mut stmt = conn.prepare(sql).map_err(Failure::execute)?;
            stmt.execute(params_from_iter(params.iter().copied().map(Bind)))
                .map_err(Failure::execute)
        })?;
        debug!(affected, "executed statement");
        Ok(affected)
    }

    fn query(&self, sql: &str, ctx: &Context) -> std::result::Result<QueryResult, EngineError> {
        ctx.check().map_err(EngineError::Cancelled)?;
        let conn = self.checkout_reader()?;
        let result = {
            let _watch = CancelWatch::install(&conn, ctx);
            self.retry_locked(ctx, || read_all(&conn, sql))
        };
        self.checkin_reader(conn);
        result
    }

    fn close(&self) -> std::result::Result<(), EngineError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let readers = std::mem::take(
            &mut *self.readers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for conn in readers {
            if let Err((_, err)) = conn.close() {
                warn!(error = %err, "closing reader connection");
            }
        }

        let writer = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match writer {
            Some(conn) => conn
                .close()
                .map_err(|(_, err)| EngineError::Execute(err.to_string())),
            None => Ok(()),
        }
    }
}

/// Runs `sql` on a reader connection and materializes every row.
fn read_all(conn: &Connection, sql: &str) -> std::result::Result<QueryResult, Failure> {
    let mut stmt = conn.prepare(sql).map_err(Failure::query)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let mut rows = stmt.query([]).map_err(Failure::query)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(Failure::scan)? {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(decode(row.get_ref(idx).map_err(Failure::scan)?));
        }
        out.push(values);
    }

    debug!(rows = out.len(), "read rows");
    Ok(QueryResult { columns, rows: out })
}

fn decode(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

/// A rusqlite failure tagged with the stage it happened in.
struct Failure {
    err: rusqlite::Error,
    wrap: fn(String) -> EngineError,
}

impl Failure {
    fn execute(err: rusqlite::Error) -> Self {
        Self {
            err,
            wrap: EngineError::Execute,
        }
    }

    fn query(err: rusqlite::Error) -> Self {
        Self {
            err,
            wrap: EngineError::Query,
        }
    }

    fn scan(err: rusqlite::Error) -> Self {
        Self {
            err,
            wrap: EngineError::Scan,
        }
    }

    /// `SQLITE_LOCKED`, including its shared-cache variant. Unlike
    /// `SQLITE_BUSY` it is not retried by the busy timeout.
    fn is_locked(&self) -> bool {
        matches!(
            &self.err,
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::DatabaseLocked
        )
    }

    /// Converts to an [`EngineError`], turning interrupts caused by a done
    /// context into [`EngineError::Cancelled`].
    fn into_engine_error(self, ctx: &Context) -> EngineError {
        let interrupted = matches!(
            &self.err,
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::OperationInterrupted
        );
        if interrupted {
            if let Some(reason) = ctx.done() {
                return EngineError::Cancelled(reason);
            }
        }
        (self.wrap)(self.err.to_string())
    }
}

/// Binds a [`ColumnValue`] as a SQLite parameter. Booleans bind as 0/1.
struct Bind<'a>(&'a ColumnValue);

impl ToSql for Bind<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self.0 {
            ColumnValue::Float(f) => ToSqlOutput::from(*f),
            ColumnValue::Integer(i) => ToSqlOutput::from(*i),
            ColumnValue::Text(s) => ToSqlOutput::from(s.as_str()),
            ColumnValue::Boolean(b) => ToSqlOutput::from(*b),
            ColumnValue::Null => ToSqlOutput::from(Null),
            ColumnValue::Unsupported(kind) => {
                return Err(rusqlite::Error::ToSqlConversionFailure(
                    format!("unsupported value: {kind}").into(),
                ));
            }
        })
    }
}

/// Installs a progress handler that interrupts the running statement once
/// the context is done, and removes it on drop.
struct CancelWatch<'c> {
    conn: &'c Connection,
}

impl<'c> CancelWatch<'c> {
    fn install(conn: &'c Connection, ctx: &Context) -> Self {
        let ctx = ctx.clone();
        conn.progress_handler(PROGRESS_INTERVAL, Some(move || ctx.is_done()));
        Self { conn }
    }
}

impl Drop for CancelWatch<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}
