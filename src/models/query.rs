//! Statement-related data models.
//!
//! A [`Statement`] is either raw SQL text with optional bound parameters or a
//! structured [`Select`] built with the small builder below. Statements are
//! immutable inputs: compiling one never mutates it.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// A parameter value for parameterized statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Binary data (base64 encoded in JSON)
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
    /// Structured JSON document
    Json(JsonValue),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
        }
    }
}

impl std::fmt::Display for QueryParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{}", v),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Self::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for QueryParam {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for QueryParam {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// JSON scalars map onto their natural parameter type; arrays and objects
/// are bound as JSON documents.
impl From<JsonValue> for QueryParam {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Null),
            },
            JsonValue::String(s) => Self::String(s),
            other => Self::Json(other),
        }
    }
}

impl From<&JsonValue> for QueryParam {
    fn from(v: &JsonValue) -> Self {
        Self::from(v.clone())
    }
}

/// Custom serialization for binary data as base64.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Bound parameters for a raw statement.
///
/// Positional parameters are passed to the driver as-is, so the SQL must use
/// the dialect's own placeholders (`$1` or `?`). Named parameters use `:name`
/// placeholders and are rewritten for the dialect at compile time.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    Positional(Vec<QueryParam>),
    Named(BTreeMap<String, QueryParam>),
}

impl Params {
    pub fn len(&self) -> usize {
        match self {
            Self::Positional(p) => p.len(),
            Self::Named(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::Positional(Vec::new())
    }
}

/// Raw SQL text with optional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatement {
    pub sql: String,
    pub params: Params,
}

impl RawStatement {
    /// Create a raw statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Params::default(),
        }
    }

    /// Append a positional parameter.
    ///
    /// Switching from named to positional binding discards the named values.
    pub fn bind(mut self, value: impl Into<QueryParam>) -> Self {
        match &mut self.params {
            Params::Positional(values) => values.push(value.into()),
            Params::Named(_) => self.params = Params::Positional(vec![value.into()]),
        }
        self
    }

    /// Set a named parameter, referenced as `:name` in the SQL text.
    pub fn bind_named(mut self, name: impl Into<String>, value: impl Into<QueryParam>) -> Self {
        match &mut self.params {
            Params::Named(values) => {
                values.insert(name.into(), value.into());
            }
            Params::Positional(_) => {
                let mut values = BTreeMap::new();
                values.insert(name.into(), value.into());
                self.params = Params::Named(values);
            }
        }
        self
    }

    /// Bind every entry of a JSON object as a named parameter.
    pub fn with_named_params(mut self, params: serde_json::Map<String, JsonValue>) -> Self {
        for (name, value) in params {
            self = self.bind_named(name, value);
        }
        self
    }
}

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl Comparison {
    pub fn operator(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "LIKE",
        }
    }
}

/// A single WHERE condition; conditions on a [`Select`] are joined with AND.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        column: String,
        op: Comparison,
        value: QueryParam,
    },
    In {
        column: String,
        values: Vec<QueryParam>,
    },
    IsNull(String),
    IsNotNull(String),
}

impl Filter {
    fn compare(column: impl Into<String>, op: Comparison, value: impl Into<QueryParam>) -> Self {
        Self::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<QueryParam>) -> Self {
        Self::compare(column, Comparison::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<QueryParam>) -> Self {
        Self::compare(column, Comparison::Ne, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<QueryParam>) -> Self {
        Self::compare(column, Comparison::Lt, value)
    }

    pub fn le(column: impl Into<String>, value: impl Into<QueryParam>) -> Self {
        Self::compare(column, Comparison::Le, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<QueryParam>) -> Self {
        Self::compare(column, Comparison::Gt, value)
    }

    pub fn ge(column: impl Into<String>, value: impl Into<QueryParam>) -> Self {
        Self::compare(column, Comparison::Ge, value)
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(column, Comparison::Like, QueryParam::String(pattern.into()))
    }

    pub fn is_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<QueryParam>,
    {
        Self::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull(column.into())
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::IsNotNull(column.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Structured SELECT over a single table.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: String,
    /// Empty means every column.
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order_by: Vec<(String, SortOrder)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Select {
    /// Select every column of `table`.
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Restrict the projection to the given columns, in order.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// An executable unit: structured query or raw SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Raw(RawStatement),
    Select(Select),
}

impl Statement {
    /// Shorthand for a raw statement without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(RawStatement::new(sql))
    }
}

impl From<RawStatement> for Statement {
    fn from(raw: RawStatement) -> Self {
        Self::Raw(raw)
    }
}

impl From<Select> for Statement {
    fn from(select: Select) -> Self {
        Self::Select(select)
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::raw(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Self::raw(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_param_types() {
        assert!(QueryParam::Null.is_null());
        assert!(!QueryParam::Bool(true).is_null());
        assert_eq!(QueryParam::Int(42).type_name(), "int");
        assert_eq!(
            QueryParam::String("hello".to_string()).type_name(),
            "string"
        );
    }

    #[test]
    fn test_query_param_from_json() {
        assert_eq!(QueryParam::from(json!(7)), QueryParam::Int(7));
        assert_eq!(QueryParam::from(json!(1.5)), QueryParam::Float(1.5));
        assert_eq!(QueryParam::from(json!("a")), QueryParam::String("a".into()));
        assert_eq!(QueryParam::from(json!(null)), QueryParam::Null);
        assert_eq!(
            QueryParam::from(json!({"k": 1})),
            QueryParam::Json(json!({"k": 1}))
        );
    }

    #[test]
    fn test_query_param_from_option() {
        assert_eq!(QueryParam::from(None::<i64>), QueryParam::Null);
        assert_eq!(QueryParam::from(Some("x")), QueryParam::String("x".into()));
    }

    #[test]
    fn test_bytes_serialize_as_base64() {
        let value = serde_json::to_value(QueryParam::Bytes(b"hello".to_vec())).unwrap();
        assert_eq!(value, json!("aGVsbG8="));
    }

    #[test]
    fn test_raw_statement_binding_modes() {
        let positional = RawStatement::new("SELECT ?").bind(1).bind("a");
        assert_eq!(positional.params.len(), 2);
        assert!(matches!(positional.params, Params::Positional(_)));

        let named = RawStatement::new("SELECT :a").bind_named("a", 1);
        assert!(matches!(named.params, Params::Named(_)));
        assert_eq!(named.params.len(), 1);
    }

    #[test]
    fn test_with_named_params_from_json_object() {
        let params = json!({"name": "A", "age": 3});
        let stmt = RawStatement::new("INSERT INTO t (name, age) VALUES (:name, :age)")
            .with_named_params(params.as_object().unwrap().clone());
        match stmt.params {
            Params::Named(values) => {
                assert_eq!(values["name"], QueryParam::String("A".into()));
                assert_eq!(values["age"], QueryParam::Int(3));
            }
            _ => panic!("expected named params"),
        }
    }

    #[test]
    fn test_select_builder() {
        let select = Select::from("users")
            .columns(["id", "name"])
            .filter(Filter::eq("name", "Alice"))
            .order_by("id", SortOrder::Desc)
            .limit(10)
            .offset(5);
        assert_eq!(select.columns, vec!["id", "name"]);
        assert_eq!(select.filters.len(), 1);
        assert_eq!(select.limit, Some(10));
        assert_eq!(select.offset, Some(5));
    }

    #[test]
    fn test_statement_conversions() {
        assert!(matches!(Statement::from("SELECT 1"), Statement::Raw(_)));
        assert!(matches!(
            Statement::from(Select::from("t")),
            Statement::Select(_)
        ));
    }
}
