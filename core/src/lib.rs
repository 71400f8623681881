//! Schema-synchronizing writes and pass-through reads over a SQL engine.
//!
//! Callers insert rows as a table name plus a column-to-value map, without
//! declaring any schema. The [`Store`] tries the insert and, when the engine
//! reports that the table or a column does not exist, issues the corrective
//! DDL and retries:
//!
//! - [`infer_type`] maps each [`ColumnValue`] to a [`StorageType`]
//! - [`build_insert`], [`build_create_table`] and [`build_add_column`]
//!   generate SQL text for a [`Dialect`]
//! - an [`ErrorClassifier`] (by default [`PatternClassifier`]) turns engine
//!   failures into a [`Recovery`]
//! - the [`Engine`] trait is the only way the core reaches the database
//!
//! All writes run inside one write section, so concurrent inserts never
//! race each other's DDL. Reads bypass it.
//!
//! # Example
//!
//! ```no_run
//! use autotable_core::*;
//!
//! # fn demo(engine: impl Engine) -> Result<(), StoreError> {
//! let store = Store::new(engine, PatternClassifier::sqlite());
//! let ctx = Context::background();
//!
//! // Creates `events` on first use, adds `size` later.
//! store.insert(&InsertStatement::new("events").with_column("kind", "click"), &ctx)?;
//! store.insert(
//!     &InsertStatement::new("events")
//!         .with_column("kind", "resize")
//!         .with_column("size", 1.5),
//!     &ctx,
//! )?;
//!
//! for row in store.query(&QueryStatement::new("SELECT * FROM events"), &ctx)? {
//!     println!("{:?}", row.get("size"));
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod classify;
mod context;
mod engine;
mod error;
mod statement;
mod store;
mod types;

pub use builder::{
    Dialect, InsertQuery, build_add_column, build_create_table, build_insert, quote_ident,
};
pub use classify::{ErrorClassifier, PatternClassifier, PatternError, Recovery};
pub use context::{Context, Done};
pub use engine::{Engine, QueryResult};
pub use error::{BuildError, EngineError, StoreError, ValidationError};
pub use statement::{InsertStatement, QueryStatement};
pub use store::Store;
pub use types::{ColumnValue, Row, StorageType, Value, infer_type};
