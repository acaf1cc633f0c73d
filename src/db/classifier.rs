//! Error classification.
//!
//! Maps every internal failure onto the three-kind [`ErrorKind`] taxonomy.
//! Driver messages are cut at the statement marker so statement text and
//! bound values never reach the caller.

use crate::error::DbError;
use crate::models::{ErrorKind, StructuredError};
use sqlx::error::ErrorKind as DriverErrorKind;
use tracing::error;

/// Marker that precedes the statement text in execution errors.
pub const STATEMENT_MARKER: &str = "[statement:";

/// SQLSTATE class for integrity constraint violations.
const INTEGRITY_SQLSTATE_CLASS: &str = "23";

/// Drop everything from the first statement marker on.
pub fn strip_statement_fragment(message: &str) -> &str {
    match message.find(STATEMENT_MARKER) {
        Some(idx) => message[..idx].trim_end(),
        None => message,
    }
}

fn kind_of_driver(err: &sqlx::Error) -> ErrorKind {
    match err {
        sqlx::Error::Database(db_err) => match db_err.kind() {
            DriverErrorKind::UniqueViolation
            | DriverErrorKind::ForeignKeyViolation
            | DriverErrorKind::NotNullViolation
            | DriverErrorKind::CheckViolation => ErrorKind::IntegrityError,
            _ if db_err
                .code()
                .is_some_and(|code| code.starts_with(INTEGRITY_SQLSTATE_CLASS)) =>
            {
                ErrorKind::IntegrityError
            }
            _ => ErrorKind::BackendError,
        },
        sqlx::Error::RowNotFound
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::Encode(_) => ErrorKind::GeneralError,
        _ => ErrorKind::BackendError,
    }
}

/// The taxonomy kind of an internal error.
pub fn kind_of(err: &DbError) -> ErrorKind {
    match err {
        DbError::Backend(source) | DbError::Statement { source, .. } => kind_of_driver(source),
        DbError::Connection { .. } => ErrorKind::BackendError,
        DbError::Configuration(_)
        | DbError::Schema { .. }
        | DbError::InvalidInput { .. }
        | DbError::Entity { .. }
        | DbError::Internal { .. } => ErrorKind::GeneralError,
    }
}

/// Classify and log a failure.
pub fn classify(err: &DbError) -> StructuredError {
    let kind = kind_of(err);
    let message = err.to_string();
    // Execution errors always carry the statement text; other general
    // errors keep their full message.
    let strip = kind != ErrorKind::GeneralError || matches!(err, DbError::Statement { .. });
    let details = if strip {
        strip_statement_fragment(&message).to_string()
    } else {
        message
    };
    error!(kind = %kind, details = %details, "Database operation failed");
    StructuredError::new(kind, details)
}

impl From<DbError> for StructuredError {
    fn from(err: DbError) -> Self {
        classify(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_statement_fragment() {
        assert_eq!(
            strip_statement_fragment("boom [statement: SELECT 1] trailing"),
            "boom"
        );
        assert_eq!(strip_statement_fragment("no marker"), "no marker");
    }

    #[test]
    fn test_io_failure_is_backend_error() {
        let err = DbError::statement(
            sqlx::Error::Io(std::io::Error::other("connection reset")),
            "INSERT INTO t VALUES ('secret')",
        );
        let classified = classify(&err);
        assert_eq!(classified.kind(), ErrorKind::BackendError);
        assert!(classified.details().contains("connection reset"));
        assert!(!classified.details().contains("secret"));
        assert!(!classified.details().contains(STATEMENT_MARKER));
    }

    #[test]
    fn test_pool_errors_are_backend_errors() {
        assert_eq!(
            kind_of(&DbError::Backend(sqlx::Error::PoolTimedOut)),
            ErrorKind::BackendError
        );
        assert_eq!(
            kind_of(&DbError::Backend(sqlx::Error::PoolClosed)),
            ErrorKind::BackendError
        );
        assert_eq!(
            kind_of(&DbError::connection("refused", "start the server")),
            ErrorKind::BackendError
        );
    }

    #[test]
    fn test_decode_failure_is_general_error() {
        let err = DbError::Backend(sqlx::Error::ColumnNotFound("missing".into()));
        assert_eq!(classify(&err).kind(), ErrorKind::GeneralError);
    }

    #[test]
    fn test_statement_decode_failure_hides_statement() {
        let err = DbError::statement(
            sqlx::Error::Decode("invalid utf-8".into()),
            "SELECT secret FROM vault WHERE token = 'abc'",
        );
        let classified = classify(&err);
        assert_eq!(classified.kind(), ErrorKind::GeneralError);
        assert!(classified.details().contains("invalid utf-8"));
        assert!(!classified.details().contains("vault"));
        assert!(!classified.details().contains(STATEMENT_MARKER));
    }

    #[test]
    fn test_general_errors_keep_full_message() {
        let err = DbError::invalid_input("bad [statement: kept]");
        let classified = classify(&err);
        assert_eq!(classified.kind(), ErrorKind::GeneralError);
        assert!(classified.details().contains("[statement: kept]"));

        let err = DbError::schema("Column 'nope' not found", "users");
        assert_eq!(StructuredError::from(err).kind(), ErrorKind::GeneralError);
    }
}
