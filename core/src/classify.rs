//! Classification of engine failures into schema repairs.
//!
//! The write path only knows how to fix two problems: a table that does not
//! exist and a column that does not exist. [`ErrorClassifier`] decides which
//! (if either) an [`EngineError`] describes. [`PatternClassifier`] does this
//! by matching the engine's message text, which is the only signal engines
//! such as SQLite provide; an engine with structured error codes can supply
//! its own classifier without touching the write path.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::error::EngineError;

/// What the write path should do about a failed insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// Create the table, then retry.
    MissingTable,
    /// Add the named column, then retry.
    MissingColumn(String),
    /// Give up and report the original error.
    Unrecoverable,
}

/// Maps engine failures to a [`Recovery`].
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: &EngineError) -> Recovery;
}

/// Error building a [`PatternClassifier`] from user-supplied patterns.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// The missing-column pattern must capture the column name.
    #[error("pattern '{0}' has no capture group for the column name")]
    MissingCaptureGroup(String),
}

static SQLITE_MISSING_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"no such table: (\S+)").expect("static regex must compile"));
static SQLITE_MISSING_COLUMN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"table .+ has no column named (.+)$").expect("static regex must compile")
});

/// Regex-based classifier over engine error messages.
///
/// The missing-column pattern's first capture group is taken as the column
/// name. Errors without a message (cancellation, closed engine) are always
/// [`Recovery::Unrecoverable`].
///
/// # Examples
///
/// ```
/// use autotable_core::{EngineError, ErrorClassifier, PatternClassifier, Recovery};
///
/// let classifier = PatternClassifier::sqlite();
/// let err = EngineError::Execute("table events has no column named size".into());
/// assert_eq!(classifier.classify(&err), Recovery::MissingColumn("size".into()));
/// ```
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    missing_table: Regex,
    missing_column: Regex,
}

impl PatternClassifier {
    /// Compiles a classifier from custom patterns.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::Regex`] if either pattern fails to compile,
    /// or [`PatternError::MissingCaptureGroup`] if `missing_column` has no
    /// capture group.
    pub fn new(missing_table: &str, missing_column: &str) -> Result<Self, PatternError> {
        let missing_table = Regex::new(missing_table)?;
        let missing_column_re = Regex::new(missing_column)?;
        if missing_column_re.captures_len() < 2 {
            return Err(PatternError::MissingCaptureGroup(missing_column.to_string()));
        }
        Ok(Self {
            missing_table,
            missing_column: missing_column_re,
        })
    }

    /// Rules for SQLite's `no such table: t` and
    /// `table t has no column named c` messages.
    pub fn sqlite() -> Self {
        Self {
            missing_table: SQLITE_MISSING_TABLE.clone(),
            missing_column: SQLITE_MISSING_COLUMN.clone(),
        }
    }

    /// Replaces the missing-table pattern, keeping the column pattern.
    pub fn with_missing_table(mut self, pattern: &str) -> Result<Self, PatternError> {
        self.missing_table = Regex::new(pattern)?;
        Ok(self)
    }

    /// Replaces the missing-column pattern, keeping the table pattern.
    pub fn with_missing_column(self, pattern: &str) -> Result<Self, PatternError> {
        Self::new(self.missing_table.as_str(), pattern)
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::sqlite()
    }
}

impl ErrorClassifier for PatternClassifier {
    fn classify(&self, error: &EngineError) -> Recovery {
        let Some(message) = error.message() else {
            return Recovery::Unrecoverable;
        };
        if self.missing_table.is_match(message) {
            return Recovery::MissingTable;
        }
        if let Some(column) = self
            .missing_column
            .captures(message)
            .and_then(|caps| caps.get(1))
        {
            return Recovery::MissingColumn(column.as_str().to_string());
        }
        Recovery::Unrecoverable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Done;

    fn exec(msg: &str) -> EngineError {
        EngineError::Execute(msg.to_string())
    }

    #[test]
    fn test_sqlite_missing_table() {
        let c = PatternClassifier::sqlite();
        assert_eq!(c.classify(&exec("no such table: test_table")), Recovery::MissingTable);
        assert_eq!(
            c.classify(&exec("no such table: main.test_table")),
            Recovery::MissingTable
        );
    }

    #[test]
    fn test_sqlite_missing_column_captures_name() {
        let c = PatternClassifier::sqlite();
        assert_eq!(
            c.classify(&exec("table test_table has no column named column_c")),
            Recovery::MissingColumn("column_c".to_string())
        );
        assert_eq!(
            c.classify(&exec("table t has no column named two words")),
            Recovery::MissingColumn("two words".to_string())
        );
    }

    #[test]
    fn test_sqlite_missing_column_table_with_spaces() {
        let c = PatternClassifier::sqlite();
        assert_eq!(
            c.classify(&exec("table my events has no column named b")),
            Recovery::MissingColumn("b".to_string())
        );
    }

    #[test]
    fn test_sqlite_other_errors_are_unrecoverable() {
        let c = PatternClassifier::sqlite();
        assert_eq!(
            c.classify(&exec("cannot store TEXT value in INTEGER column t.bool")),
            Recovery::Unrecoverable
        );
        assert_eq!(c.classify(&exec("near \"VALUES\": syntax error")), Recovery::Unrecoverable);
        assert_eq!(c.classify(&EngineError::Closed), Recovery::Unrecoverable);
        assert_eq!(
            c.classify(&EngineError::Cancelled(Done::Cancelled)),
            Recovery::Unrecoverable
        );
    }

    #[test]
    fn test_custom_patterns() {
        let c = PatternClassifier::new(
            r"Catalog Error: Table with name [a-zA-Z_]+ does not exist!",
            r#"Binder Error: Table "[a-zA-Z_]+" does not have a column with name "([a-zA-Z_]+)""#,
        )
        .unwrap();
        assert_eq!(
            c.classify(&exec("Catalog Error: Table with name t does not exist!")),
            Recovery::MissingTable
        );
        assert_eq!(
            c.classify(&exec(
                r#"Binder Error: Table "t" does not have a column with name "col""#
            )),
            Recovery::MissingColumn("col".to_string())
        );
        assert_eq!(
            c.classify(&exec("no such table: t")),
            Recovery::Unrecoverable
        );
    }

    #[test]
    fn test_column_pattern_requires_capture_group() {
        let err = PatternClassifier::new("missing table", "missing column").unwrap_err();
        assert!(matches!(err, PatternError::MissingCaptureGroup(_)));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(
            PatternClassifier::new("(", "(x)"),
            Err(PatternError::Regex(_))
        ));
    }

    #[test]
    fn test_override_single_pattern() {
        let c = PatternClassifier::sqlite()
            .with_missing_table(r"unknown relation \S+")
            .unwrap();
        assert_eq!(c.classify(&exec("unknown relation t")), Recovery::MissingTable);
        assert_eq!(
            c.classify(&exec("table t has no column named x")),
            Recovery::MissingColumn("x".to_string())
        );

        let c = PatternClassifier::sqlite()
            .with_missing_column(r"unknown column (\w+)")
            .unwrap();
        assert_eq!(
            c.classify(&exec("unknown column x")),
            Recovery::MissingColumn("x".to_string())
        );
        assert_eq!(c.classify(&exec("no such table: t")), Recovery::MissingTable);
    }
}
