//! SQL generation for inserts and corrective DDL.
//!
//! Three pure builders turn an [`InsertStatement`] into SQL text:
//!
//! - [`build_insert`]: `INSERT INTO t ("a", "b") VALUES (?, ?)` plus the
//!   positional parameters in the same order
//! - [`build_create_table`]: `CREATE TABLE IF NOT EXISTS` covering every
//!   column of the statement, so one failed insert materializes the whole
//!   table in a single statement
//! - [`build_add_column`]: `ALTER TABLE t ADD COLUMN "c" TYPE` for one
//!   column the engine reported missing
//!
//! Column types come from [`infer_type`](crate::infer_type) and are spelled
//! by a [`Dialect`]. Identifiers are double-quoted with embedded quotes
//! doubled.

use crate::error::{BuildError, ValidationError};
use crate::statement::InsertStatement;
use crate::types::{ColumnValue, StorageType};

/// Engine-specific spelling of column types and table options.
///
/// # Examples
///
/// ```
/// use autotable_core::{Dialect, StorageType};
///
/// assert_eq!(Dialect::SQLITE_STRICT.type_name(StorageType::Float64), Some("REAL"));
/// assert_eq!(Dialect::STANDARD.type_name(StorageType::Boolean), Some("BOOLEAN"));
/// assert_eq!(Dialect::STANDARD.type_name(StorageType::Invalid), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub text: &'static str,
    pub float64: &'static str,
    pub integer: &'static str,
    pub boolean: &'static str,
    /// Appended after the closing parenthesis of `CREATE TABLE`, if any.
    pub table_options: Option<&'static str>,
}

impl Dialect {
    /// ANSI-style type names with no table options.
    pub const STANDARD: Dialect = Dialect {
        text: "TEXT",
        float64: "DOUBLE",
        integer: "INTEGER",
        boolean: "BOOLEAN",
        table_options: None,
    };

    /// SQLite with type affinities only; mismatched values are coerced or
    /// stored as-is.
    pub const SQLITE: Dialect = Dialect {
        text: "TEXT",
        float64: "REAL",
        integer: "INTEGER",
        boolean: "BOOLEAN",
        table_options: None,
    };

    /// SQLite `STRICT` tables. Booleans are stored as 0/1 integers and
    /// values of the wrong family are rejected by the engine.
    pub const SQLITE_STRICT: Dialect = Dialect {
        text: "TEXT",
        float64: "REAL",
        integer: "INTEGER",
        boolean: "INTEGER",
        table_options: Some("STRICT"),
    };

    /// Column type for `ty`, or `None` for [`StorageType::Invalid`].
    pub fn type_name(&self, ty: StorageType) -> Option<&'static str> {
        match ty {
            StorageType::Invalid => None,
            StorageType::Text => Some(self.text),
            StorageType::Float64 => Some(self.float64),
            StorageType::Integer => Some(self.integer),
            StorageType::Boolean => Some(self.boolean),
        }
    }
}

/// Parameterized insert produced by [`build_insert`].
#[derive(Debug, Clone, PartialEq)]
pub struct InsertQuery<'a> {
    pub sql: String,
    /// One parameter per placeholder, in column-list order.
    pub params: Vec<&'a ColumnValue>,
}

/// Quotes an identifier for use in generated SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Builds the parameterized insert for `stmt`.
///
/// Values are not type-checked; the engine accepts or rejects them.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the statement is malformed.
pub fn build_insert(stmt: &InsertStatement) -> Result<InsertQuery<'_>, ValidationError> {
    stmt.validate()?;

    let mut names = Vec::with_capacity(stmt.columns.len());
    let mut params = Vec::with_capacity(stmt.columns.len());
    for (name, value) in &stmt.columns {
        names.push(quote_ident(name));
        params.push(value);
    }
    let placeholders = vec!["?"; params.len()].join(", ");

    Ok(InsertQuery {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&stmt.table),
            names.join(", "),
            placeholders
        ),
        params,
    })
}

/// Builds `CREATE TABLE IF NOT EXISTS` with a column for every value in the
/// statement.
///
/// # Errors
///
/// Returns [`BuildError::InvalidType`] naming the first column whose value
/// has no storage type. No partial statement is produced.
pub fn build_create_table(stmt: &InsertStatement, dialect: &Dialect) -> Result<String, BuildError> {
    let mut defs = Vec::with_capacity(stmt.columns.len());
    for (name, value) in &stmt.columns {
        let ty = column_type(dialect, "create table", name, value)?;
        defs.push(format!("{} {}", quote_ident(name), ty));
    }

    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(&stmt.table),
        defs.join(", ")
    );
    if let Some(options) = dialect.table_options {
        sql.push(' ');
        sql.push_str(options);
    }
    Ok(sql)
}

/// Builds `ALTER TABLE ... ADD COLUMN` for `column`, typed from its value in
/// the statement.
///
/// # Errors
///
/// Returns [`BuildError::UnknownColumn`] if the statement has no such
/// column, or [`BuildError::InvalidType`] if its value has no storage type.
pub fn build_add_column(
    stmt: &InsertStatement,
    column: &str,
    dialect: &Dialect,
) -> Result<String, BuildError> {
    let value = stmt
        .columns
        .get(column)
        .ok_or_else(|| BuildError::UnknownColumn(column.to_string()))?;
    let ty = column_type(dialect, "add column", column, value)?;

    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(&stmt.table),
        quote_ident(column),
        ty
    ))
}

fn column_type(
    dialect: &Dialect,
    statement: &'static str,
    column: &str,
    value: &ColumnValue,
) -> Result<&'static str, BuildError> {
    dialect
        .type_name(value.storage_type())
        .ok_or_else(|| BuildError::InvalidType {
            statement,
            column: column.to_string(),
            kind: value.kind(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InsertStatement {
        InsertStatement::new("test_table")
            .with_column("str", "str test")
            .with_column("bool", false)
            .with_column("float", 1.2458)
            .with_column("int", 9123)
    }

    #[test]
    fn test_build_insert_params_follow_column_order() {
        let stmt = sample();
        let insert = build_insert(&stmt).unwrap();
        assert_eq!(
            insert.sql,
            r#"INSERT INTO "test_table" ("bool", "float", "int", "str") VALUES (?, ?, ?, ?)"#
        );
        assert_eq!(
            insert.params,
            vec![
                &ColumnValue::Boolean(false),
                &ColumnValue::Float(1.2458),
                &ColumnValue::Integer(9123),
                &ColumnValue::Text("str test".into()),
            ]
        );
    }

    #[test]
    fn test_build_insert_does_not_type_check() {
        let stmt = InsertStatement::new("t").with_column("tags", ColumnValue::Unsupported("array"));
        let insert = build_insert(&stmt).unwrap();
        assert_eq!(insert.params.len(), 1);
    }

    #[test]
    fn test_build_insert_rejects_invalid_statement() {
        assert_eq!(
            build_insert(&InsertStatement::new("t")),
            Err(ValidationError::NoColumns)
        );
    }

    #[test]
    fn test_build_create_table_covers_all_columns() {
        let sql = build_create_table(&sample(), &Dialect::STANDARD).unwrap();
        assert_eq!(
            sql,
            r#"CREATE TABLE IF NOT EXISTS "test_table" ("bool" BOOLEAN, "float" DOUBLE, "int" INTEGER, "str" TEXT)"#
        );
    }

    #[test]
    fn test_build_create_table_appends_table_options() {
        let stmt = InsertStatement::new("t").with_column("a", 1);
        let sql = build_create_table(&stmt, &Dialect::SQLITE_STRICT).unwrap();
        assert_eq!(sql, r#"CREATE TABLE IF NOT EXISTS "t" ("a" INTEGER) STRICT"#);
    }

    #[test]
    fn test_build_create_table_rejects_invalid_type() {
        let stmt = InsertStatement::new("t")
            .with_column("a", 1)
            .with_column("b", ColumnValue::Null);
        let err = build_create_table(&stmt, &Dialect::STANDARD).unwrap_err();
        assert_eq!(
            err,
            BuildError::InvalidType {
                statement: "create table",
                column: "b".to_string(),
                kind: "null",
            }
        );
    }

    #[test]
    fn test_build_add_column() {
        let sql = build_add_column(&sample(), "float", &Dialect::SQLITE_STRICT).unwrap();
        assert_eq!(sql, r#"ALTER TABLE "test_table" ADD COLUMN "float" REAL"#);

        let sql = build_add_column(&sample(), "bool", &Dialect::SQLITE_STRICT).unwrap();
        assert_eq!(sql, r#"ALTER TABLE "test_table" ADD COLUMN "bool" INTEGER"#);
    }

    #[test]
    fn test_build_add_column_unknown_column() {
        assert_eq!(
            build_add_column(&sample(), "missing", &Dialect::STANDARD),
            Err(BuildError::UnknownColumn("missing".to_string()))
        );
    }

    #[test]
    fn test_build_add_column_invalid_type() {
        let stmt = InsertStatement::new("t").with_column("obj", ColumnValue::Unsupported("object"));
        let err = build_add_column(&stmt, "obj", &Dialect::STANDARD).unwrap_err();
        assert!(matches!(err, BuildError::InvalidType { statement: "add column", .. }));
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_ident("order"), "\"order\"");
    }
}
