//! Connection-related data models.
//!
//! This module defines the dialect tag and the read-only summary of an open
//! engine.

use serde::{Deserialize, Serialize};

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

/// Tuning options accepted by every dialect.
const COMMON_OPTIONS: &[&str] = &[
    "max_connections",
    "min_connections",
    "idle_timeout",
    "acquire_timeout",
    "max_lifetime",
    "test_before_acquire",
];

const POSTGRES_OPTIONS: &[&str] = &["application_name", "statement_cache_capacity", "search_path"];

const MYSQL_OPTIONS: &[&str] = &["charset", "statement_cache_capacity"];

const SQLITE_OPTIONS: &[&str] = &[
    "busy_timeout",
    "foreign_keys",
    "create_if_missing",
    "read_only",
    "journal_mode",
];

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Option keys that only this dialect understands.
    pub fn dialect_options(&self) -> &'static [&'static str] {
        match self {
            Self::PostgreSQL => POSTGRES_OPTIONS,
            Self::MySQL => MYSQL_OPTIONS,
            Self::SQLite => SQLITE_OPTIONS,
        }
    }

    /// Check whether an option key is valid for this dialect.
    pub fn supports_option(&self, key: &str) -> bool {
        COMMON_OPTIONS.contains(&key) || self.dialect_options().contains(&key)
    }

    /// Every option key valid for this dialect, pool options first.
    pub fn supported_options(&self) -> Vec<&'static str> {
        COMMON_OPTIONS
            .iter()
            .chain(self.dialect_options())
            .copied()
            .collect()
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Information about an open engine (no secrets exposed).
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub database_type: DatabaseType,
    /// Connection string with the password masked.
    pub connection_string: String,
    pub server_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_from_connection_string() {
        assert_eq!(
            DatabaseType::from_connection_string("postgres://localhost/db"),
            Some(DatabaseType::PostgreSQL)
        );
        assert_eq!(
            DatabaseType::from_connection_string("postgresql://localhost/db"),
            Some(DatabaseType::PostgreSQL)
        );
        assert_eq!(
            DatabaseType::from_connection_string("mysql://localhost/db"),
            Some(DatabaseType::MySQL)
        );
        assert_eq!(
            DatabaseType::from_connection_string("mariadb://localhost/db"),
            Some(DatabaseType::MySQL)
        );
        assert_eq!(
            DatabaseType::from_connection_string("sqlite:test.db"),
            Some(DatabaseType::SQLite)
        );
        assert_eq!(
            DatabaseType::from_connection_string("sqlite://path/to/db"),
            Some(DatabaseType::SQLite)
        );
        assert_eq!(
            DatabaseType::from_connection_string("unknown://localhost"),
            None
        );
    }

    #[test]
    fn test_common_options_supported_everywhere() {
        for db in [
            DatabaseType::PostgreSQL,
            DatabaseType::MySQL,
            DatabaseType::SQLite,
        ] {
            assert!(db.supports_option("max_connections"));
            assert!(db.supports_option("acquire_timeout"));
        }
    }

    #[test]
    fn test_dialect_options_are_not_shared() {
        assert!(DatabaseType::SQLite.supports_option("busy_timeout"));
        assert!(!DatabaseType::PostgreSQL.supports_option("busy_timeout"));
        assert!(DatabaseType::PostgreSQL.supports_option("application_name"));
        assert!(!DatabaseType::MySQL.supports_option("application_name"));
        assert!(DatabaseType::MySQL.supports_option("charset"));
        assert!(!DatabaseType::SQLite.supports_option("charset"));
    }

    #[test]
    fn test_supported_options_lists_pool_options_first() {
        let opts = DatabaseType::MySQL.supported_options();
        assert_eq!(opts[0], "max_connections");
        assert!(opts.contains(&"charset"));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(DatabaseType::PostgreSQL.to_string(), "PostgreSQL");
        assert_eq!(DatabaseType::SQLite.to_string(), "SQLite");
    }
}
