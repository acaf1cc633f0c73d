//! Result and error shapes returned by the runner and the repository.
//!
//! Every public operation hands back exactly one of these shapes. Failures are
//! always a [`StructuredError`]; a missing record is a [`RecordOutcome::NotFound`]
//! value, not an error.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// One shaped row.
///
/// Which variant a result uses is decided once per result set from its column
/// cardinality, so all rows of a result share the same variant (entities and
/// opaque rows excepted, which pass through individually).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ShapedValue<E = JsonMap<String, JsonValue>> {
    /// The only column of a single-column row.
    Scalar(JsonValue),
    /// A name-keyed row, keys in select order.
    Record(JsonMap<String, JsonValue>),
    /// A typed entity passed through unchanged.
    Entity(E),
    /// A row that has no name-keyed form (e.g. duplicate column names).
    Opaque(JsonValue),
}

/// An ordered list of shaped rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ShapedRows<E = JsonMap<String, JsonValue>>(pub Vec<ShapedValue<E>>);

impl<E> ShapedRows<E> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ShapedValue<E>> {
        self.0.iter()
    }

    /// Row values as plain scalars; records, entities and opaque rows are skipped.
    pub fn into_scalars(self) -> Vec<JsonValue> {
        self.0
            .into_iter()
            .filter_map(|v| match v {
                ShapedValue::Scalar(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Rows as name-keyed records; other shapes are skipped.
    pub fn into_records(self) -> Vec<JsonMap<String, JsonValue>> {
        self.0
            .into_iter()
            .filter_map(|v| match v {
                ShapedValue::Record(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// Typed entities; other shapes are skipped.
    pub fn into_entities(self) -> Vec<E> {
        self.0
            .into_iter()
            .filter_map(|v| match v {
                ShapedValue::Entity(e) => Some(e),
                _ => None,
            })
            .collect()
    }
}

impl<E> IntoIterator for ShapedRows<E> {
    type Item = ShapedValue<E>;
    type IntoIter = std::vec::IntoIter<ShapedValue<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Metadata describing a statement's effect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementMetadata {
    /// Rows affected, or rows returned for row-producing statements.
    pub rowcount: u64,
    /// Generated identity of an inserted row, when the driver reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inserted_key: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<ShapedRows>,
}

/// Result of a single statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatementResult {
    Rows(ShapedRows),
    Metadata(StatementMetadata),
}

impl StatementResult {
    /// Shaped rows, whether returned bare or inside metadata.
    pub fn rows(&self) -> Option<&ShapedRows> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Metadata(meta) => meta.rows.as_ref(),
        }
    }

    pub fn metadata(&self) -> Option<&StatementMetadata> {
        match self {
            Self::Metadata(meta) => Some(meta),
            Self::Rows(_) => None,
        }
    }
}

/// Result of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchResult {
    /// Every statement ran and the batch committed.
    Completed,
    /// Per-statement results, in input order.
    Results(Vec<StatementResult>),
}

impl Serialize for BatchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Completed => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("success", &true)?;
                map.end()
            }
            Self::Results(results) => results.serialize(serializer),
        }
    }
}

/// Error taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// A constraint violation (unique, foreign key, not-null, check).
    IntegrityError,
    /// Any other failure reported by the backend or its driver.
    BackendError,
    /// Everything else.
    GeneralError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntegrityError => "IntegrityError",
            Self::BackendError => "BackendError",
            Self::GeneralError => "GeneralError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure. Only the classifier constructs these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuredError {
    kind: ErrorKind,
    details: String,
}

impl StructuredError {
    pub(crate) fn new(kind: ErrorKind, details: impl Into<String>) -> Self {
        Self {
            kind,
            details: details.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn is_integrity(&self) -> bool {
        self.kind == ErrorKind::IntegrityError
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.details)
    }
}

impl std::error::Error for StructuredError {}

/// Result type for public runner and repository operations.
pub type DalResult<T> = Result<T, StructuredError>;

/// Marker returned when a lookup by primary key matched nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordNotFound {
    pub details: String,
}

impl RecordNotFound {
    pub fn new(details: impl Into<String>) -> Self {
        Self {
            details: details.into(),
        }
    }
}

impl Serialize for RecordNotFound {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("error", "Record not found")?;
        map.serialize_entry("details", &self.details)?;
        map.end()
    }
}

/// Outcome of an operation addressing one record by primary key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordOutcome<T> {
    Found(T),
    NotFound(RecordNotFound),
}

impl<T> RecordOutcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            Self::NotFound(_) => None,
        }
    }
}

/// Confirmation of a single-record delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deleted;

impl Serialize for Deleted {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("success", "Record deleted successfully")?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shaped_rows_serialize_flat() {
        let rows: ShapedRows = ShapedRows(vec![
            ShapedValue::Scalar(json!("Alice")),
            ShapedValue::Scalar(json!("Bob")),
        ]);
        assert_eq!(serde_json::to_value(&rows).unwrap(), json!(["Alice", "Bob"]));
    }

    #[test]
    fn test_shaped_rows_accessors() {
        let mut record = JsonMap::new();
        record.insert("id".into(), json!(1));
        let rows: ShapedRows = ShapedRows(vec![ShapedValue::Record(record.clone())]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.clone().into_records(), vec![record]);
        assert!(rows.into_scalars().is_empty());
    }

    #[test]
    fn test_batch_result_serialization() {
        assert_eq!(
            serde_json::to_value(BatchResult::Completed).unwrap(),
            json!({"success": true})
        );
        let results = BatchResult::Results(vec![StatementResult::Metadata(StatementMetadata {
            rowcount: 1,
            inserted_key: Some(json!(7)),
            rows: None,
        })]);
        assert_eq!(
            serde_json::to_value(results).unwrap(),
            json!([{"rowcount": 1, "inserted_key": 7}])
        );
    }

    #[test]
    fn test_not_found_serialization() {
        let outcome: RecordOutcome<JsonValue> =
            RecordOutcome::NotFound(RecordNotFound::new("No record with id 9"));
        assert_eq!(
            serde_json::to_value(outcome).unwrap(),
            json!({"error": "Record not found", "details": "No record with id 9"})
        );
    }

    #[test]
    fn test_deleted_serialization() {
        assert_eq!(
            serde_json::to_value(Deleted).unwrap(),
            json!({"success": "Record deleted successfully"})
        );
    }

    #[test]
    fn test_structured_error_display_and_serialize() {
        let err = StructuredError::new(ErrorKind::IntegrityError, "UNIQUE constraint failed");
        assert_eq!(err.to_string(), "IntegrityError: UNIQUE constraint failed");
        assert!(err.is_integrity());
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"kind": "IntegrityError", "details": "UNIQUE constraint failed"})
        );
    }
}
