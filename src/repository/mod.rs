//! CRUD façade.
//!
//! [`Repository`] wraps an [`Engine`] with record-level operations over typed
//! entities and raw statements. Each public operation opens one scoped
//! session, commits on success and rolls back on failure. Failures come back
//! classified; a primary-key lookup that matches nothing comes back as
//! [`RecordOutcome::NotFound`].

pub mod mutate;

use crate::db::classifier::classify;
use crate::db::pool::Engine;
use crate::db::session::ScopedSession;
use crate::db::shaper::{RawResult, RawRows, RowRepr, shape_rows};
use crate::db::statement::{CompiledStatement, compile, compile_select, wrap_count};
use crate::error::{DbError, DbResult};
use crate::models::{
    ColumnDetail, DalResult, Deleted, Entity, QueryParam, RecordNotFound, RecordOutcome, Select,
    ShapedRows, Statement, TableMetadata, TypedQuery, entity_to_record, record_to_entity,
};
use mutate::{delete_statement, insert_statement, select_by_key_statement, update_statement};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;
use tracing::debug;

/// Record-level operations over one engine.
#[derive(Debug, Clone)]
pub struct Repository {
    engine: Engine,
}

impl Repository {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Insert one entity and return it reloaded with its generated key and
    /// column defaults.
    pub async fn create_one<E: Entity>(&self, entity: &E) -> DalResult<E> {
        let mut created = self.create_many(std::slice::from_ref(entity)).await?;
        created
            .pop()
            .ok_or_else(|| classify(&DbError::internal("Insert returned no entity")))
    }

    /// Insert entities in one session that commits once.
    pub async fn create_many<E: Entity>(&self, entities: &[E]) -> DalResult<Vec<E>> {
        self.try_create_many(entities)
            .await
            .map_err(|e| classify(&e))
    }

    /// Fetch the single entity matching `query`.
    ///
    /// No match is `Ok(None)`. More than one match is an error.
    pub async fn read_one_record<E: Entity>(&self, query: TypedQuery<E>) -> DalResult<Option<E>> {
        let mut select = query.into_select();
        if select.limit.is_none() {
            select = select.limit(2);
        }
        let mut entities = self.read_entities_from::<E>(select).await?;
        if entities.len() > 1 {
            return Err(classify(&DbError::invalid_input(format!(
                "Expected at most one '{}' record, query matched several",
                E::TABLE
            ))));
        }
        Ok(entities.pop())
    }

    /// Run a read statement and return its shaped rows.
    pub async fn read_query(&self, statement: impl Into<Statement>) -> DalResult<ShapedRows> {
        let mut results = self.read_multi_query([("", statement.into())]).await?;
        Ok(results.remove("").unwrap_or_else(|| ShapedRows(Vec::new())))
    }

    /// Run several named read statements in one session.
    pub async fn read_multi_query<I, K, S>(
        &self,
        queries: I,
    ) -> DalResult<BTreeMap<String, ShapedRows>>
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<Statement>,
    {
        let queries: Vec<(String, Statement)> = queries
            .into_iter()
            .map(|(name, stmt)| (name.into(), stmt.into()))
            .collect();
        self.try_read_multi(&queries)
            .await
            .map_err(|e| classify(&e))
    }

    /// Fetch every entity matching `query`.
    pub async fn read_entities<E: Entity>(&self, query: TypedQuery<E>) -> DalResult<Vec<E>> {
        self.read_entities_from(query.into_select()).await
    }

    async fn read_entities_from<E: Entity>(&self, select: Select) -> DalResult<Vec<E>> {
        self.try_read_entities(&select)
            .await
            .map_err(|e| classify(&e))
    }

    /// Apply `new_values` to the entity with primary key `id`.
    ///
    /// Protected attributes are dropped from `new_values` without error.
    pub async fn update_one<E: Entity>(
        &self,
        id: impl Into<QueryParam>,
        new_values: JsonMap<String, JsonValue>,
    ) -> DalResult<RecordOutcome<E>> {
        self.try_update_one(id.into(), new_values)
            .await
            .map_err(|e| classify(&e))
    }

    /// Delete the entity with primary key `id`.
    pub async fn delete_one<E: Entity>(
        &self,
        id: impl Into<QueryParam>,
    ) -> DalResult<RecordOutcome<Deleted>> {
        let id = id.into();
        let metadata = self.engine.table_metadata(E::TABLE).await;
        let stmt = delete_statement(
            E::TABLE,
            E::PRIMARY_KEY,
            vec![id.clone()],
            metadata.as_ref(),
            self.engine.db_type(),
        );
        let deleted = self
            .try_run_command(&stmt)
            .await
            .map_err(|e| classify(&e))?;
        if deleted == 0 {
            return Ok(not_found::<E, _>(&id));
        }
        debug!(table = E::TABLE, id = %id, "Deleted record");
        Ok(RecordOutcome::Found(Deleted))
    }

    /// Delete every row of `table` whose `id_column` is in `id_values`.
    ///
    /// Returns the number of rows deleted. The column must exist in the
    /// schema catalog, which is reloaded once when it does not know the column.
    pub async fn delete_many<I, V>(&self, table: &str, id_column: &str, id_values: I) -> DalResult<u64>
    where
        I: IntoIterator<Item = V>,
        V: Into<QueryParam>,
    {
        let ids: Vec<QueryParam> = id_values.into_iter().map(Into::into).collect();
        self.try_delete_many(table, id_column, ids)
            .await
            .map_err(|e| classify(&e))
    }

    /// Count the rows a read statement yields.
    pub async fn count_query(&self, statement: impl Into<Statement>) -> DalResult<u64> {
        self.try_count(&statement.into())
            .await
            .map_err(|e| classify(&e))
    }

    /// Table names from the schema catalog, sorted.
    pub async fn get_table_names(&self) -> DalResult<Vec<String>> {
        Ok(self.engine.catalog().await.table_names())
    }

    /// Column details of `table` from the schema catalog, in declaration order.
    pub async fn get_columns_details(&self, table: &str) -> DalResult<Vec<ColumnDetail>> {
        let catalog = self.engine.catalog().await;
        catalog
            .require_table(table)
            .map(|t| t.columns.clone())
            .map_err(|e| classify(&e))
    }

    /// Primary-key column names of `table` from the schema catalog.
    pub async fn get_primary_keys(&self, table: &str) -> DalResult<Vec<String>> {
        let catalog = self.engine.catalog().await;
        catalog
            .require_table(table)
            .map(|t| t.primary_keys())
            .map_err(|e| classify(&e))
    }

    /// Reload the schema catalog, e.g. after DDL.
    pub async fn refresh_schema(&self) -> DalResult<()> {
        self.engine.refresh_schema().await.map_err(|e| classify(&e))
    }

    async fn try_create_many<E: Entity>(&self, entities: &[E]) -> DbResult<Vec<E>> {
        let metadata = self.engine.table_metadata(E::TABLE).await;
        let mut session = self.engine.open_session().await?;
        let result = insert_entities(&self.engine, &mut session, entities, metadata.as_ref()).await;
        let created = session.finish(result).await?;
        debug!(table = E::TABLE, count = created.len(), "Created records");
        Ok(created)
    }

    async fn try_read_multi(
        &self,
        queries: &[(String, Statement)],
    ) -> DbResult<BTreeMap<String, ShapedRows>> {
        let compiled = queries
            .iter()
            .map(|(name, stmt)| Ok((name.clone(), compile(stmt, self.engine.db_type())?)))
            .collect::<DbResult<Vec<_>>>()?;

        let mut session = self.engine.open_session().await?;
        let result = read_all(&mut session, &compiled).await;
        session.finish(result).await
    }

    async fn try_read_entities<E: Entity>(&self, select: &Select) -> DbResult<Vec<E>> {
        let compiled = compile_select(select, self.engine.db_type())?;
        let mut session = self.engine.open_session().await?;
        let result = fetch_rows(&mut session, &compiled).await;
        let RawRows { columns, rows } = session.finish(result).await?;

        let entities = rows
            .into_iter()
            .map(|row| match row {
                RowRepr::Record(record) => record_to_entity::<E>(record).map(RowRepr::Entity),
                _ => Err(DbError::entity(E::TABLE, "row has no name-keyed form")),
            })
            .collect::<DbResult<Vec<_>>>()?;
        Ok(shape_rows(RawRows::new(columns, entities)).into_entities())
    }

    async fn try_update_one<E: Entity>(
        &self,
        id: QueryParam,
        new_values: JsonMap<String, JsonValue>,
    ) -> DbResult<RecordOutcome<E>> {
        let values: JsonMap<String, JsonValue> = new_values
            .into_iter()
            .filter(|(field, _)| !E::is_protected(field))
            .collect();

        let metadata = self.engine.table_metadata(E::TABLE).await;
        let mut session = self.engine.open_session().await?;
        let result =
            update_entity::<E>(&self.engine, &mut session, &id, &values, metadata.as_ref()).await;
        let updated = session.finish(result).await?;

        Ok(match updated {
            Some(entity) => {
                debug!(table = E::TABLE, id = %id, fields = values.len(), "Updated record");
                RecordOutcome::Found(entity)
            }
            None => not_found::<E, _>(&id),
        })
    }

    async fn try_delete_many(
        &self,
        table: &str,
        id_column: &str,
        ids: Vec<QueryParam>,
    ) -> DbResult<u64> {
        let mut catalog = self.engine.catalog().await;
        if !catalog.has_column(table, id_column) {
            // The table or column may postdate the last catalog load.
            debug!(table, id_column, "Not in schema catalog, refreshing");
            self.engine.refresh_schema().await?;
            catalog = self.engine.catalog().await;
        }
        catalog.require_table(table)?;
        if !catalog.has_column(table, id_column) {
            return Err(DbError::schema(
                format!("Column '{}' not found", id_column),
                table,
            ));
        }
        if ids.is_empty() {
            return Ok(0);
        }

        let stmt = delete_statement(
            table,
            id_column,
            ids,
            catalog.table(table),
            self.engine.db_type(),
        );
        let deleted = self.try_run_command(&stmt).await?;
        debug!(table, deleted, "Deleted records");
        Ok(deleted)
    }

    async fn try_count(&self, statement: &Statement) -> DbResult<u64> {
        let counted = wrap_count(&compile(statement, self.engine.db_type())?)?;
        let mut session = self.engine.open_session().await?;
        let result = fetch_rows(&mut session, &counted).await;
        let rows = session.finish(result).await?;

        rows.rows
            .into_iter()
            .next()
            .and_then(|row| match row {
                RowRepr::Record(record) => record.into_iter().next().map(|(_, v)| v),
                _ => None,
            })
            .and_then(|value| as_count(&value))
            .ok_or_else(|| DbError::internal("COUNT(*) returned no usable value"))
    }

    /// Run one statement in its own session and return the rows it affected.
    async fn try_run_command(&self, stmt: &CompiledStatement) -> DbResult<u64> {
        let mut session = self.engine.open_session().await?;
        let result = session.run(stmt).await.map(rows_affected);
        session.finish(result).await
    }
}

fn not_found<E: Entity, T>(id: &QueryParam) -> RecordOutcome<T> {
    RecordOutcome::NotFound(RecordNotFound::new(format!(
        "No '{}' record with {} = {}",
        E::TABLE,
        E::PRIMARY_KEY,
        id
    )))
}

/// Run a statement that must return rows.
async fn fetch_rows(session: &mut ScopedSession, stmt: &CompiledStatement) -> DbResult<RawRows> {
    if !stmt.returns_rows() {
        return Err(DbError::invalid_input(
            "Read operations require a row-returning statement",
        ));
    }
    match session.run(stmt).await? {
        RawResult::Rows(rows) => Ok(rows),
        RawResult::Command(_) => Err(DbError::internal("Query produced no row set")),
    }
}

fn rows_affected(result: RawResult) -> u64 {
    match result {
        RawResult::Command(outcome) => outcome.rows_affected,
        RawResult::Rows(rows) => rows.len() as u64,
    }
}

async fn read_all(
    session: &mut ScopedSession,
    compiled: &[(String, CompiledStatement)],
) -> DbResult<BTreeMap<String, ShapedRows>> {
    let mut results = BTreeMap::new();
    for (name, stmt) in compiled {
        let rows = fetch_rows(session, stmt).await?;
        results.insert(name.clone(), shape_rows(rows));
    }
    Ok(results)
}

/// Load one record by key, `None` when nothing matches.
async fn load_by_key(
    engine: &Engine,
    session: &mut ScopedSession,
    table: &str,
    key_column: &str,
    key: &QueryParam,
    metadata: Option<&TableMetadata>,
) -> DbResult<Option<JsonMap<String, JsonValue>>> {
    let compiled = select_by_key_statement(table, key_column, key, metadata, engine.db_type());
    let rows = fetch_rows(session, &compiled).await?;
    match rows.rows.into_iter().next() {
        Some(RowRepr::Record(record)) => Ok(Some(record)),
        Some(_) => Err(DbError::schema("Row has duplicate column names", table)),
        None => Ok(None),
    }
}

/// Insert one entity and reload it by its key.
async fn insert_entity<E: Entity>(
    engine: &Engine,
    session: &mut ScopedSession,
    entity: &E,
    metadata: Option<&TableMetadata>,
) -> DbResult<E> {
    let record = entity_to_record(entity)?;
    let provided_key = record
        .get(E::PRIMARY_KEY)
        .filter(|v| !v.is_null())
        .cloned();

    let stmt = insert_statement(E::TABLE, &record, E::PRIMARY_KEY, metadata, engine.db_type());
    let key = match session.run(&stmt).await? {
        RawResult::Rows(rows) => rows.rows.into_iter().next().and_then(|row| match row {
            RowRepr::Record(mut returned) => returned.remove(E::PRIMARY_KEY),
            _ => None,
        }),
        RawResult::Command(outcome) => provided_key.or(outcome.inserted_key),
    }
    .filter(|v| !v.is_null())
    .ok_or_else(|| DbError::entity(E::TABLE, "insert did not report a primary key"))?;

    let key = QueryParam::from(key);
    let reloaded = load_by_key(engine, session, E::TABLE, E::PRIMARY_KEY, &key, metadata)
        .await?
        .ok_or_else(|| DbError::internal(format!("Inserted '{}' record not found", E::TABLE)))?;
    record_to_entity(reloaded)
}

async fn insert_entities<E: Entity>(
    engine: &Engine,
    session: &mut ScopedSession,
    entities: &[E],
    metadata: Option<&TableMetadata>,
) -> DbResult<Vec<E>> {
    let mut created = Vec::with_capacity(entities.len());
    for entity in entities {
        created.push(insert_entity(engine, session, entity, metadata).await?);
    }
    Ok(created)
}

/// Update one entity in place; `None` when no row has that key.
async fn update_entity<E: Entity>(
    engine: &Engine,
    session: &mut ScopedSession,
    id: &QueryParam,
    values: &JsonMap<String, JsonValue>,
    metadata: Option<&TableMetadata>,
) -> DbResult<Option<E>> {
    if load_by_key(engine, session, E::TABLE, E::PRIMARY_KEY, id, metadata)
        .await?
        .is_none()
    {
        return Ok(None);
    }

    if !values.is_empty() {
        let stmt = update_statement(E::TABLE, values, E::PRIMARY_KEY, id, metadata, engine.db_type());
        session.run(&stmt).await?;
    }

    let record = load_by_key(engine, session, E::TABLE, E::PRIMARY_KEY, id, metadata)
        .await?
        .ok_or_else(|| DbError::internal(format!("Updated '{}' record vanished", E::TABLE)))?;
    record_to_entity(record).map(Some)
}

/// COUNT(*) arrives as an integer, or as text over some text protocols.
fn as_count(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_count() {
        assert_eq!(as_count(&json!(10)), Some(10));
        assert_eq!(as_count(&json!("42")), Some(42));
        assert_eq!(as_count(&json!(-1)), None);
        assert_eq!(as_count(&json!(null)), None);
    }

    #[test]
    fn test_not_found_details() {
        #[derive(serde::Serialize, serde::Deserialize)]
        struct Widget {
            pkid: i64,
        }
        impl Entity for Widget {
            const TABLE: &'static str = "widgets";
        }

        let outcome: RecordOutcome<Deleted> = not_found::<Widget, _>(&QueryParam::Int(7));
        assert_eq!(
            serde_json::to_value(outcome).unwrap(),
            json!({"error": "Record not found", "details": "No 'widgets' record with pkid = 7"})
        );
    }
}
