//! SQLite engine for the autotable store.
//!
//! [`SqliteEngine`] implements [`autotable_core::Engine`] on rusqlite with a
//! bundled SQLite. Tables are created `STRICT` by default, so a value whose
//! type does not match its column is rejected instead of silently stored.
//!
//! # Architecture
//!
//! - **`engine`**: writer connection and pooled readers
//! - **`config`**: YAML configuration with defaults for every section
//! - **`error`**: failures while opening or configuring the store
//!
//! # Quick start
//!
//! ```
//! use autotable_core::{Context, InsertStatement, QueryStatement};
//! use autotable_sqlite::{StoreConfig, open_store};
//!
//! let store = open_store(&StoreConfig::default()).unwrap();
//! let ctx = Context::background();
//!
//! store
//!     .insert(&InsertStatement::new("events").with_column("kind", "click"), &ctx)
//!     .unwrap();
//! let rows = store
//!     .query(&QueryStatement::new("SELECT kind FROM events"), &ctx)
//!     .unwrap();
//! assert_eq!(rows[0].get("kind").and_then(|v| v.as_str()), Some("click"));
//! store.close().unwrap();
//! ```

mod config;
mod engine;
mod error;

pub use config::{EngineConfig, ErrorPatterns, StoreConfig, WriteConfig};
pub use engine::SqliteEngine;
pub use error::{Result, SqliteError};

use autotable_core::{PatternClassifier, Store};
use tracing::info;

/// A [`Store`] backed by SQLite.
pub type SqliteStore = Store<SqliteEngine, PatternClassifier>;

/// Opens the engine and assembles a store from `config`.
///
/// # Errors
///
/// Returns [`SqliteError::Config`] for unusable error patterns, or
/// [`SqliteError::DatabaseError`] if the database cannot be opened.
pub fn open_store(config: &StoreConfig) -> Result<SqliteStore> {
    let classifier = config.errors.classifier()?;
    let engine = SqliteEngine::open(&config.engine)?;
    let mut store = Store::new(engine, classifier);
    if let Some(limit) = config.write.max_repairs {
        store = store.with_repair_limit(limit);
    }
    info!(path = ?config.engine.path, "opened store");
    Ok(store)
}
