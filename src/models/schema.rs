//! Schema-related data models.
//!
//! This module defines the column and table descriptions served from the
//! engine's in-memory schema catalog.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDetail {
    pub name: String,
    /// Full type as reported by the backend (e.g., `varchar(30)`, `INTEGER`)
    pub data_type: String,
    pub nullable: bool,
    /// Default value with appropriate JSON type based on column data type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    pub primary_key: bool,
}

impl ColumnDetail {
    /// Create a new column detail.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default_value: None,
            primary_key: false,
        }
    }

    /// Set whether this is a primary key column.
    pub fn with_primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }

    /// Set the default value from its catalog text, converting to the JSON
    /// type matching the column's data_type.
    pub fn with_default_str(mut self, default_str: &str) -> Self {
        self.default_value = Some(parse_default_value(default_str, &self.data_type));
        self
    }
}

/// A table and its columns in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,
    pub columns: Vec<ColumnDetail>,
}

impl TableMetadata {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDetail>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Declared type of `column`, when the table has it.
    pub fn column_type(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.data_type.as_str())
    }

    /// Primary-key column names in declaration order.
    pub fn primary_keys(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect()
    }
}

/// Strip a quoted literal and any trailing `::type` cast
/// (e.g. `'draft'::character varying` → `draft`).
fn unquote_literal(default_str: &str) -> Option<&str> {
    let trimmed = default_str.trim();
    let literal = match trimmed.rfind("::") {
        Some(idx) if trimmed.starts_with('\'') => &trimmed[..idx],
        _ => trimmed,
    };
    literal
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
}

/// Parse a default value string into the appropriate JSON type based on column data type.
///
/// - Integer types (int, bigint, smallint, tinyint) → JSON Number
/// - Float types (float, double, real) → JSON Number
/// - Boolean types → JSON Boolean
/// - JSON/JSONB types → Parsed JSON value
/// - Decimal/numeric → JSON String (preserve precision)
/// - Quoted literals → their unquoted text
/// - Expressions (CURRENT_TIMESTAMP, nextval, etc.) → JSON String
pub fn parse_default_value(default_str: &str, data_type: &str) -> serde_json::Value {
    let dt_lower = data_type.to_lowercase();
    let value = unquote_literal(default_str).unwrap_or(default_str);

    if dt_lower.contains("int") || dt_lower.contains("serial") {
        if let Ok(n) = value.parse::<i64>() {
            return serde_json::Value::Number(n.into());
        }
    }

    if (dt_lower.contains("float") || dt_lower.contains("double") || dt_lower == "real")
        && !dt_lower.contains("decimal")
        && !dt_lower.contains("numeric")
    {
        if let Ok(n) = value.parse::<f64>() {
            if let Some(num) = serde_json::Number::from_f64(n) {
                return serde_json::Value::Number(num);
            }
        }
    }

    if dt_lower.contains("bool") {
        match value.to_lowercase().as_str() {
            "true" | "1" | "t" => return serde_json::Value::Bool(true),
            "false" | "0" | "f" => return serde_json::Value::Bool(false),
            _ => {}
        }
    }

    if dt_lower == "json" || dt_lower == "jsonb" {
        if let Ok(parsed) = serde_json::from_str(value) {
            return parsed;
        }
    }

    serde_json::Value::String(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_metadata_primary_keys() {
        let table = TableMetadata::new(
            "memberships",
            vec![
                ColumnDetail::new("user_id", "bigint", false).with_primary_key(true),
                ColumnDetail::new("group_id", "bigint", false).with_primary_key(true),
                ColumnDetail::new("role", "text", true),
            ],
        );
        assert_eq!(table.primary_keys(), vec!["user_id", "group_id"]);
        assert_eq!(table.column_type("role"), Some("text"));
        assert_eq!(table.column_type("missing"), None);
    }

    #[test]
    fn test_column_detail_serialization_skips_missing_default() {
        let json = serde_json::to_string(&ColumnDetail::new("name", "TEXT", true)).unwrap();
        assert!(!json.contains("default_value"));
        assert!(json.contains("\"primary_key\":false"));
    }

    #[test]
    fn test_parse_default_value_integer_types() {
        assert_eq!(
            parse_default_value("0", "tinyint unsigned"),
            serde_json::Value::Number(0.into())
        );
        assert_eq!(
            parse_default_value("-100", "bigint"),
            serde_json::Value::Number((-100).into())
        );
        assert_eq!(
            parse_default_value("5", "INTEGER"),
            serde_json::Value::Number(5.into())
        );
    }

    #[test]
    fn test_parse_default_value_float_types() {
        assert_eq!(parse_default_value("1.5", "float"), serde_json::json!(1.5));
        assert_eq!(parse_default_value("2.25", "REAL"), serde_json::json!(2.25));
    }

    #[test]
    fn test_parse_default_value_decimal_stays_string() {
        assert_eq!(
            parse_default_value("99.99", "numeric(5,2)"),
            serde_json::Value::String("99.99".to_string())
        );
    }

    #[test]
    fn test_parse_default_value_boolean() {
        assert_eq!(
            parse_default_value("true", "boolean"),
            serde_json::Value::Bool(true)
        );
        assert_eq!(
            parse_default_value("0", "bool"),
            serde_json::Value::Bool(false)
        );
    }

    #[test]
    fn test_parse_default_value_quoted_literals() {
        assert_eq!(
            parse_default_value("'draft'", "TEXT"),
            serde_json::Value::String("draft".to_string())
        );
        assert_eq!(
            parse_default_value("'draft'::character varying", "character varying"),
            serde_json::Value::String("draft".to_string())
        );
        assert_eq!(
            parse_default_value("'{}'::jsonb", "jsonb"),
            serde_json::json!({})
        );
    }

    #[test]
    fn test_parse_default_value_expressions() {
        assert_eq!(
            parse_default_value("CURRENT_TIMESTAMP", "timestamp"),
            serde_json::Value::String("CURRENT_TIMESTAMP".to_string())
        );
        assert_eq!(
            parse_default_value("nextval('users_id_seq'::regclass)", "bigint"),
            serde_json::Value::String("nextval('users_id_seq'::regclass)".to_string())
        );
    }
}
