//! Row shaping.
//!
//! Normalizes driver results into [`ShapedRows`]. The shape of a result set
//! depends only on its column cardinality:
//!
//! - one column: a flat list of scalars, one per row
//! - several columns: one record per row, keys in select order
//!
//! Typed entities pass through untouched and rows without a name-keyed form
//! are kept as opaque values. Cardinality comes from the column descriptor
//! when the result carries one, otherwise from the first row.

use crate::models::{ShapedRows, ShapedValue};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// One row as produced by a session, before shaping.
#[derive(Debug, Clone, PartialEq)]
pub enum RowRepr<E = JsonMap<String, JsonValue>> {
    /// Name-keyed row, keys in select order.
    Record(JsonMap<String, JsonValue>),
    /// A typed entity decoded from a row.
    Entity(E),
    /// Anything else, e.g. a positional array for rows with duplicate names.
    Opaque(JsonValue),
}

/// Rows returned by one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRows<E = JsonMap<String, JsonValue>> {
    /// Column descriptor, when the driver reported one.
    pub columns: Option<Vec<String>>,
    pub rows: Vec<RowRepr<E>>,
}

impl<E> RawRows<E> {
    pub fn new(columns: Option<Vec<String>>, rows: Vec<RowRepr<E>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Effect of a statement that returned no rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutcome {
    pub rows_affected: u64,
    /// Generated identity of an inserted row, if the driver reports one.
    pub inserted_key: Option<JsonValue>,
}

/// Raw result of executing one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult<E = JsonMap<String, JsonValue>> {
    Rows(RawRows<E>),
    Command(CommandOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cardinality {
    Single,
    Multi,
}

/// Decide the cardinality of a result set.
///
/// The descriptor wins when present; otherwise the first row decides. An empty
/// result without a descriptor is treated as multi-column, which is moot since
/// there is nothing to shape.
fn cardinality<E>(columns: Option<&[String]>, first: Option<&RowRepr<E>>) -> Cardinality {
    let width = match (columns, first) {
        (Some(cols), _) => Some(cols.len()),
        (None, Some(RowRepr::Record(map))) => Some(map.len()),
        (None, Some(RowRepr::Opaque(JsonValue::Array(values)))) => Some(values.len()),
        (None, _) => None,
    };
    match width {
        Some(1) => Cardinality::Single,
        _ => Cardinality::Multi,
    }
}

fn shape_row<E>(row: RowRepr<E>, cardinality: Cardinality) -> ShapedValue<E> {
    match (cardinality, row) {
        (_, RowRepr::Entity(entity)) => ShapedValue::Entity(entity),
        (Cardinality::Single, RowRepr::Record(map)) if map.len() == 1 => {
            ShapedValue::Scalar(map.into_iter().next().map(|(_, v)| v).unwrap_or_default())
        }
        (Cardinality::Single, RowRepr::Opaque(JsonValue::Array(mut values)))
            if values.len() == 1 =>
        {
            ShapedValue::Scalar(values.pop().unwrap_or_default())
        }
        (Cardinality::Multi, RowRepr::Record(map)) => ShapedValue::Record(map),
        (_, RowRepr::Record(map)) => ShapedValue::Opaque(JsonValue::Object(map)),
        (_, RowRepr::Opaque(value)) => ShapedValue::Opaque(value),
    }
}

/// Shape a row set. Deterministic and free of side effects.
pub fn shape_rows<E>(raw: RawRows<E>) -> ShapedRows<E> {
    let cardinality = cardinality(raw.columns.as_deref(), raw.rows.first());
    ShapedRows(
        raw.rows
            .into_iter()
            .map(|row| shape_row(row, cardinality))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: JsonValue) -> RowRepr {
        match value {
            JsonValue::Object(map) => RowRepr::Record(map),
            other => RowRepr::Opaque(other),
        }
    }

    fn cols(names: &[&str]) -> Option<Vec<String>> {
        Some(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_single_column_flattens_to_scalars() {
        let raw = RawRows::new(
            cols(&["name"]),
            vec![record(json!({"name": "Alice"})), record(json!({"name": "Bob"}))],
        );
        let shaped = shape_rows(raw);
        assert_eq!(shaped.into_scalars(), vec![json!("Alice"), json!("Bob")]);
    }

    #[test]
    fn test_multi_column_yields_records_in_select_order() {
        let raw = RawRows::new(
            cols(&["name", "id"]),
            vec![record(json!({"name": "Alice", "id": 1}))],
        );
        let shaped = shape_rows(raw);
        let records = shaped.into_records();
        assert_eq!(records.len(), 1);
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, vec!["name", "id"]);
    }

    #[test]
    fn test_cardinality_from_first_row_without_descriptor() {
        let single = RawRows::new(None, vec![record(json!({"n": 1})), record(json!({"n": 2}))]);
        assert_eq!(shape_rows(single).into_scalars(), vec![json!(1), json!(2)]);

        let multi = RawRows::new(None, vec![record(json!({"a": 1, "b": 2}))]);
        assert_eq!(shape_rows(multi).into_records().len(), 1);
    }

    #[test]
    fn test_descriptor_and_fallback_agree() {
        let rows = vec![record(json!({"a": 1, "b": "x"})), record(json!({"a": 2, "b": "y"}))];
        let with = shape_rows(RawRows::new(cols(&["a", "b"]), rows.clone()));
        let without = shape_rows(RawRows::new(None, rows));
        assert_eq!(with, without);
    }

    #[test]
    fn test_duplicate_column_rows_stay_opaque() {
        let raw: RawRows = RawRows::new(
            cols(&["id", "id"]),
            vec![RowRepr::Opaque(json!([1, 2]))],
        );
        let shaped = shape_rows(raw);
        assert_eq!(shaped.0, vec![ShapedValue::Opaque(json!([1, 2]))]);
    }

    #[test]
    fn test_single_column_positional_row_unwraps() {
        let raw: RawRows = RawRows::new(None, vec![RowRepr::Opaque(json!(["only"]))]);
        assert_eq!(shape_rows(raw).into_scalars(), vec![json!("only")]);
    }

    #[test]
    fn test_entities_pass_through() {
        let raw: RawRows<String> = RawRows::new(
            cols(&["id", "name"]),
            vec![RowRepr::Entity("user-1".to_string())],
        );
        assert_eq!(shape_rows(raw).into_entities(), vec!["user-1".to_string()]);

        let single: RawRows<String> =
            RawRows::new(cols(&["id"]), vec![RowRepr::Entity("user-2".to_string())]);
        assert_eq!(shape_rows(single).into_entities(), vec!["user-2".to_string()]);
    }

    #[test]
    fn test_shaping_is_idempotent() {
        let raw = RawRows::new(
            cols(&["a", "b"]),
            vec![record(json!({"a": 1, "b": null}))],
        );
        let once = shape_rows(raw.clone());
        let reshaped = shape_rows(RawRows::<JsonMap<String, JsonValue>>::new(
            raw.columns.clone(),
            once.clone().into_records().into_iter().map(RowRepr::Record).collect(),
        ));
        assert_eq!(once, reshaped);
        assert_eq!(once, shape_rows(raw));
    }

    #[test]
    fn test_empty_result() {
        let raw: RawRows = RawRows::new(cols(&["a"]), vec![]);
        assert!(shape_rows(raw).is_empty());
    }
}
