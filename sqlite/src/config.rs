//! YAML configuration for a SQLite-backed store.
//!
//! Every section has defaults, so an empty file (or none at all) yields a
//! private in-memory database with strict tables.
//!
//! # Example YAML
//!
//! ```yaml
//! engine:
//!   path: data.db
//!   busy_timeout_ms: 5000
//!   max_idle_readers: 4
//!   strict_tables: true
//! write:
//!   max_repairs: null
//! errors:
//!   missing_table: null
//!   missing_column: null
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use autotable_core::PatternClassifier;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SqliteError};

/// Settings for [`SqliteEngine`](crate::SqliteEngine).
///
/// # Examples
///
/// ```
/// # use autotable_sqlite::EngineConfig;
/// let config = EngineConfig::default();
/// assert!(config.path.is_none());
/// assert!(config.strict_tables);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Reader connections kept open between queries.
    pub max_idle_readers: usize,
    /// Create tables as `STRICT` so mistyped values are rejected.
    pub strict_tables: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5000,
            max_idle_readers: 4,
            strict_tables: true,
        }
    }
}

/// Settings for the write path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteConfig {
    /// Corrective DDL steps allowed per insert. `None` uses the column
    /// count plus one.
    pub max_repairs: Option<usize>,
}

/// Overrides for the error-classification regexes.
///
/// `missing_column` must capture the column name in its first group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorPatterns {
    pub missing_table: Option<String>,
    pub missing_column: Option<String>,
}

impl ErrorPatterns {
    /// Builds the classifier, starting from the SQLite rules.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Config`] if an override does not compile or
    /// has no capture group.
    pub fn classifier(&self) -> Result<PatternClassifier> {
        let mut classifier = PatternClassifier::sqlite();
        if let Some(pattern) = &self.missing_table {
            classifier = classifier
                .with_missing_table(pattern)
                .map_err(|err| SqliteError::Config(format!("errors.missing_table: {err}")))?;
        }
        if let Some(pattern) = &self.missing_column {
            classifier = classifier
                .with_missing_column(pattern)
                .map_err(|err| SqliteError::Config(format!("errors.missing_column: {err}")))?;
        }
        Ok(classifier)
    }
}

/// Top-level store configuration.
///
/// # Examples
///
/// ```no_run
/// use autotable_sqlite::{StoreConfig, open_store};
///
/// let config = StoreConfig::load("autotable.yml").unwrap();
/// let store = open_store(&config).unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub engine: EngineConfig,
    pub write: WriteConfig,
    pub errors: ErrorPatterns,
}

impl StoreConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::SqliteError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::SqliteError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::SqliteError::IoError) if the file cannot
    /// be written, or [`YamlError`](crate::SqliteError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
engine:
  path: /tmp/rows.db
  busy_timeout_ms: 250
  max_idle_readers: 2
  strict_tables: false
write:
  max_repairs: 10
errors:
  missing_table: 'Table with name (\S+) does not exist'
  missing_column: 'does not have a column with name "(\S+)"'
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: StoreConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.engine.path, Some(PathBuf::from("/tmp/rows.db")));
        assert_eq!(config.engine.busy_timeout_ms, 250);
        assert_eq!(config.engine.max_idle_readers, 2);
        assert!(!config.engine.strict_tables);
        assert_eq!(config.write.max_repairs, Some(10));
        assert!(config.errors.missing_table.is_some());
        assert!(config.errors.missing_column.is_some());
    }

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let config: StoreConfig = serde_yaml::from_str("engine:\n  path: x.db\n").unwrap();
        assert_eq!(config.engine.path, Some(PathBuf::from("x.db")));
        assert_eq!(config.engine.busy_timeout_ms, 5000);
        assert_eq!(config.engine.max_idle_readers, 4);
        assert!(config.engine.strict_tables);
        assert_eq!(config.write, WriteConfig::default());
        assert_eq!(config.errors, ErrorPatterns::default());
    }

    #[test]
    fn test_deserialize_empty_document() {
        let config: StoreConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autotable.yml");
        let config: StoreConfig = serde_yaml::from_str(sample_yaml()).unwrap();

        config.save(&path).unwrap();
        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = StoreConfig::load(dir.path().join("absent.yml")).unwrap_err();
        assert!(matches!(err, SqliteError::IoError(_)));
    }

    #[test]
    fn test_custom_patterns_build_classifier() {
        let config: StoreConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert!(config.errors.classifier().is_ok());
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let patterns = ErrorPatterns {
            missing_table: Some("no such table: (".into()),
            missing_column: None,
        };
        let err = patterns.classifier().unwrap_err();
        assert!(matches!(err, SqliteError::Config(_)));
        assert!(err.to_string().contains("errors.missing_table"));
    }

    #[test]
    fn test_pattern_without_group_is_config_error() {
        let patterns = ErrorPatterns {
            missing_table: None,
            missing_column: Some("has no column named".into()),
        };
        assert!(matches!(
            patterns.classifier().unwrap_err(),
            SqliteError::Config(_)
        ));
    }
}
