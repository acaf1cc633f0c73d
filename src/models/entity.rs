//! Typed entities.
//!
//! An entity is any serde type mapped to one table. The repository reads and
//! writes its attributes by name through its JSON form, so no reflection or
//! generated code is involved.

use crate::error::{DbError, DbResult};
use crate::models::query::{Filter, QueryParam, Select, SortOrder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::marker::PhantomData;

/// A serde type stored as one row of [`Entity::TABLE`].
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct User {
///     #[serde(default, skip_serializing_if = "Option::is_none")]
///     pkid: Option<i64>,
///     name: String,
/// }
///
/// impl Entity for User {
///     const TABLE: &'static str = "users";
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: &'static str;

    /// Primary-key attribute and column name.
    const PRIMARY_KEY: &'static str = "pkid";

    /// Attributes never overwritten by an update. The primary key is always
    /// protected, whether listed here or not.
    const PROTECTED_FIELDS: &'static [&'static str] = &["pkid", "date_created"];

    /// Start a typed query over this entity's table.
    fn query() -> TypedQuery<Self> {
        TypedQuery::new()
    }

    /// Whether `field` must be dropped from update values.
    fn is_protected(field: &str) -> bool {
        field == Self::PRIMARY_KEY || Self::PROTECTED_FIELDS.contains(&field)
    }
}

/// A [`Select`] whose rows decode as `E`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedQuery<E> {
    select: Select,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> TypedQuery<E> {
    pub fn new() -> Self {
        Self {
            select: Select::from(E::TABLE),
            _entity: PhantomData,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.select = self.select.filter(filter);
        self
    }

    /// Match the row whose primary key equals `id`.
    pub fn by_id(self, id: impl Into<QueryParam>) -> Self {
        self.filter(Filter::eq(E::PRIMARY_KEY, id))
    }

    pub fn order_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.select = self.select.order_by(column, order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.select = self.select.limit(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.select = self.select.offset(offset);
        self
    }

    pub fn select(&self) -> &Select {
        &self.select
    }

    pub fn into_select(self) -> Select {
        self.select
    }
}

impl<E: Entity> Default for TypedQuery<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode an entity as a column → value record.
pub fn entity_to_record<E: Entity>(entity: &E) -> DbResult<JsonMap<String, JsonValue>> {
    match serde_json::to_value(entity).map_err(|e| DbError::entity(E::TABLE, e))? {
        JsonValue::Object(map) => Ok(map),
        other => Err(DbError::entity(
            E::TABLE,
            format!("expected a JSON object, got {}", json_kind(&other)),
        )),
    }
}

/// Decode a column → value record into an entity.
pub fn record_to_entity<E: Entity>(record: JsonMap<String, JsonValue>) -> DbResult<E> {
    serde_json::from_value(JsonValue::Object(record)).map_err(|e| DbError::entity(E::TABLE, e))
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Note {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pkid: Option<i64>,
        body: String,
    }

    impl Entity for Note {
        const TABLE: &'static str = "notes";
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Account {
        account_id: i64,
        owner: String,
    }

    impl Entity for Account {
        const TABLE: &'static str = "accounts";
        const PRIMARY_KEY: &'static str = "account_id";
        const PROTECTED_FIELDS: &'static [&'static str] = &["owner"];
    }

    #[test]
    fn test_default_protected_fields() {
        assert!(Note::is_protected("pkid"));
        assert!(Note::is_protected("date_created"));
        assert!(!Note::is_protected("body"));
    }

    #[test]
    fn test_overridden_protected_fields_keep_primary_key() {
        assert!(Account::is_protected("account_id"));
        assert!(Account::is_protected("owner"));
        assert!(!Account::is_protected("date_created"));
    }

    #[test]
    fn test_typed_query_by_id() {
        let query = Account::query().by_id(5);
        assert_eq!(query.select().table, "accounts");
        assert_eq!(query.select().filters, vec![Filter::eq("account_id", 5)]);
    }

    #[test]
    fn test_record_conversion() {
        let note = Note {
            pkid: None,
            body: "hi".into(),
        };
        let record = entity_to_record(&note).unwrap();
        assert_eq!(JsonValue::Object(record), json!({"body": "hi"}));

        let decoded: Note =
            record_to_entity(json!({"pkid": 3, "body": "hi"}).as_object().unwrap().clone())
                .unwrap();
        assert_eq!(decoded.pkid, Some(3));
    }

    #[test]
    fn test_record_to_entity_reports_table() {
        let err = record_to_entity::<Note>(JsonMap::new()).unwrap_err();
        assert!(err.to_string().contains("notes"));
    }
}
