//! Internal error types for the data-access layer.
//!
//! `DbError` is what the engine, sessions and statement compiler return among
//! themselves. It never crosses the public runner/repository boundary: every
//! public operation routes it through [`crate::db::classifier`] and hands the
//! caller a [`crate::models::StructuredError`] instead.

use crate::config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {0}")]
    Backend(#[from] sqlx::Error),

    /// A driver failure raised while executing a specific statement.
    /// The statement text is kept after the marker so it can be stripped.
    #[error("Database error: {source} [statement: {sql}]")]
    Statement {
        #[source]
        source: sqlx::Error,
        sql: String,
    },

    #[error("Schema error: {message} (object: {object})")]
    Schema { message: String, object: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Entity mapping failed for '{entity}': {message}")]
    Entity { entity: String, message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Attach the statement text to a driver error.
    pub fn statement(source: sqlx::Error, sql: impl Into<String>) -> Self {
        Self::Statement {
            source,
            sql: sql.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            object: object.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an entity (de)serialization error.
    pub fn entity(entity: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Entity {
            entity: entity.into(),
            message: message.to_string(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// The underlying driver error, if this failure came from the driver.
    pub fn driver_error(&self) -> Option<&sqlx::Error> {
        match self {
            Self::Backend(err) | Self::Statement { source: err, .. } => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = DbError::connection("refused", "Check that the server is running");
        assert_eq!(err.suggestion(), Some("Check that the server is running"));
        assert_eq!(DbError::internal("boom").suggestion(), None);
    }

    #[test]
    fn test_statement_error_carries_marker() {
        let err = DbError::statement(sqlx::Error::RowNotFound, "SELECT secret FROM vault");
        let text = err.to_string();
        assert!(text.contains("[statement: SELECT secret FROM vault]"));
        assert!(err.driver_error().is_some());
    }

    #[test]
    fn test_non_driver_errors_have_no_driver_source() {
        assert!(DbError::invalid_input("bad").driver_error().is_none());
        assert!(DbError::schema("missing", "users").driver_error().is_none());
    }
}
