//! Per-request statement objects.
//!
//! Statements are built from external input, validated, consumed once by
//! the [`Store`](crate::Store), and discarded.

use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::types::ColumnValue;

/// A single-row insert into a table whose schema may not exist yet.
///
/// Column names are unique within a statement. Values are not type-checked
/// here: the engine accepts or rejects them when the insert runs, and types
/// are only inferred when the table or a column has to be created.
///
/// # Examples
///
/// ```
/// use autotable_core::InsertStatement;
///
/// let stmt = InsertStatement::new("events")
///     .with_column("kind", "click")
///     .with_column("count", 3);
/// assert!(stmt.validate().is_ok());
/// assert_eq!(stmt.columns.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InsertStatement {
    /// Target table.
    pub table: String,
    /// Column name to value.
    pub columns: BTreeMap<String, ColumnValue>,
}

impl InsertStatement {
    /// Creates an insert with no columns.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: BTreeMap::new(),
        }
    }

    /// Adds or replaces a column value.
    pub fn with_column(mut self, name: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        self.columns.insert(name.into(), value.into());
        self
    }

    /// Builds an insert from a decoded JSON object, converting each field
    /// with [`ColumnValue::from`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NotAnObject`] if `row` is not a JSON
    /// object. The result is not validated otherwise.
    pub fn from_json(
        table: impl Into<String>,
        row: &serde_json::Value,
    ) -> Result<Self, ValidationError> {
        let object = row.as_object().ok_or_else(|| {
            ValidationError::NotAnObject(match row {
                serde_json::Value::Null => "null",
                serde_json::Value::Bool(_) => "boolean",
                serde_json::Value::Number(_) => "number",
                serde_json::Value::String(_) => "string",
                serde_json::Value::Array(_) => "array",
                serde_json::Value::Object(_) => "object",
            })
        })?;

        let columns = object
            .iter()
            .map(|(name, value)| (name.clone(), ColumnValue::from(value)))
            .collect();

        Ok(Self {
            table: table.into(),
            columns,
        })
    }

    /// Checks the structural invariants: a non-blank table name and at least
    /// one non-blank column name.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.table.trim().is_empty() {
            return Err(ValidationError::EmptyTable);
        }
        if self.columns.is_empty() {
            return Err(ValidationError::NoColumns);
        }
        if self.columns.keys().any(|name| name.trim().is_empty()) {
            return Err(ValidationError::EmptyColumnName);
        }
        Ok(())
    }
}

/// A read query passed through to the engine verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryStatement {
    pub query: String,
}

impl QueryStatement {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.query.trim().is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        Ok(())
    }
}
