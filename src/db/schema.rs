//! Schema introspection module.
//!
//! Loads the tables of the connected database into a [`SchemaCatalog`] that
//! the engine keeps in memory. Introspection operations read the catalog, not
//! the backend, until [`crate::db::Engine::refresh_schema`] reloads it.
//!
//! # Architecture
//!
//! SQL queries are organized in the `queries` submodule with constants for each
//! database type. Database-specific implementations are in their respective
//! submodules (postgres, mysql, sqlite), each providing the same interface.

use crate::db::pool::DbPool;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnDetail, TableMetadata};
use std::collections::BTreeMap;
use tracing::debug;

/// In-memory snapshot of the tables in the current schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaCatalog {
    tables: BTreeMap<String, TableMetadata>,
}

impl SchemaCatalog {
    pub fn new(tables: impl IntoIterator<Item = TableMetadata>) -> Self {
        Self {
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Table names, sorted.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn table(&self, name: &str) -> Option<&TableMetadata> {
        self.tables.get(name)
    }

    /// Look up a table, failing with a schema error when it is not cataloged.
    pub fn require_table(&self, name: &str) -> DbResult<&TableMetadata> {
        self.table(name)
            .ok_or_else(|| DbError::schema(format!("Table '{}' not found", name), name))
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.table(table)
            .is_some_and(|t| t.columns.iter().any(|c| c.name == column))
    }
}

/// Schema inspector for database introspection.
pub struct SchemaInspector;

impl SchemaInspector {
    /// Load every base table of the current schema with its columns.
    pub async fn load_catalog(pool: &DbPool) -> DbResult<SchemaCatalog> {
        let tables = match pool {
            DbPool::Postgres(p) => postgres::load_tables(p).await?,
            DbPool::MySql(p) => mysql::load_tables(p).await?,
            DbPool::SQLite(p) => sqlite::load_tables(p).await?,
        };
        debug!(count = tables.len(), "Loaded schema catalog");
        Ok(SchemaCatalog::new(tables))
    }
}

/// Group `(table, column)` rows, already ordered by table then position.
fn group_columns(rows: Vec<(String, ColumnDetail)>) -> Vec<TableMetadata> {
    let mut tables: Vec<TableMetadata> = Vec::new();
    for (table, column) in rows {
        match tables.last_mut() {
            Some(last) if last.name == table => last.columns.push(column),
            _ => tables.push(TableMetadata::new(table, vec![column])),
        }
    }
    tables
}

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    pub mod postgres {
        // information_schema identifiers are sql_identifier domains; cast to text.
        pub const CATALOG_COLUMNS: &str = r#"
        SELECT
            c.table_name::text AS table_name,
            c.column_name::text AS column_name,
            format_type(a.atttypid, a.atttypmod) AS column_type,
            c.is_nullable::text AS is_nullable,
            c.column_default::text AS column_default,
            (pk.column_name IS NOT NULL) AS is_primary_key
        FROM information_schema.columns c
        JOIN information_schema.tables t
            ON t.table_schema = c.table_schema
            AND t.table_name = c.table_name
            AND t.table_type = 'BASE TABLE'
        JOIN pg_namespace n ON n.nspname = c.table_schema
        JOIN pg_class cl ON cl.relname = c.table_name AND cl.relnamespace = n.oid
        JOIN pg_attribute a ON a.attrelid = cl.oid AND a.attname = c.column_name
        LEFT JOIN (
            SELECT kcu.table_name, kcu.column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
                AND tc.table_name = kcu.table_name
            WHERE tc.constraint_type = 'PRIMARY KEY'
            AND tc.table_schema = current_schema()
        ) pk ON pk.table_name = c.table_name AND pk.column_name = c.column_name
        WHERE c.table_schema = current_schema()
        ORDER BY c.table_name, c.ordinal_position
        "#;
    }

    pub mod mysql {
        pub const CATALOG_COLUMNS: &str = r#"
        SELECT
            CONVERT(c.TABLE_NAME USING utf8) AS TABLE_NAME,
            CONVERT(c.COLUMN_NAME USING utf8) AS COLUMN_NAME,
            CONVERT(c.COLUMN_TYPE USING utf8) AS COLUMN_TYPE,
            CONVERT(c.IS_NULLABLE USING utf8) AS IS_NULLABLE,
            CONVERT(c.COLUMN_DEFAULT USING utf8) AS COLUMN_DEFAULT,
            CONVERT(c.COLUMN_KEY USING utf8) AS COLUMN_KEY
        FROM information_schema.COLUMNS c
        JOIN information_schema.TABLES t
            ON t.TABLE_SCHEMA = c.TABLE_SCHEMA
            AND t.TABLE_NAME = c.TABLE_NAME
        WHERE c.TABLE_SCHEMA = DATABASE()
        AND t.TABLE_TYPE = 'BASE TABLE'
        ORDER BY c.TABLE_NAME, c.ORDINAL_POSITION
        "#;
    }

    pub mod sqlite {
        pub const LIST_TABLES: &str = r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table'
            AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#;
    }
}

// =============================================================================
// PostgreSQL Implementation
// =============================================================================

mod postgres {
    use super::*;
    use sqlx::{PgPool, Row};

    pub async fn load_tables(pool: &PgPool) -> DbResult<Vec<TableMetadata>> {
        let rows = sqlx::query(queries::postgres::CATALOG_COLUMNS)
            .fetch_all(pool)
            .await?;

        let columns = rows
            .iter()
            .map(|row| {
                let table: String = row.try_get("table_name")?;
                let name: String = row.try_get("column_name")?;
                let column_type: String = row.try_get("column_type")?;
                let nullable: String = row.try_get("is_nullable")?;
                let default_value: Option<String> = row.try_get("column_default")?;
                let is_pk: bool = row.try_get("is_primary_key")?;

                let mut col =
                    ColumnDetail::new(name, column_type, nullable == "YES").with_primary_key(is_pk);
                if let Some(ref def) = default_value {
                    col = col.with_default_str(def);
                }
                Ok((table, col))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(group_columns(columns))
    }
}

// =============================================================================
// MySQL Implementation
// =============================================================================

mod mysql {
    use super::*;
    use sqlx::mysql::MySqlRow;
    use sqlx::{MySqlPool, Row};

    /// Safely get a string from a MySQL row.
    /// MySQL may return VARBINARY instead of VARCHAR depending on charset configuration.
    fn get_string(row: &MySqlRow, column: &str) -> String {
        row.try_get::<String, _>(column)
            .ok()
            .or_else(|| {
                row.try_get::<Vec<u8>, _>(column)
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            })
            .unwrap_or_default()
    }

    /// Safely get an optional string from a MySQL row.
    fn get_optional_string(row: &MySqlRow, column: &str) -> Option<String> {
        row.try_get::<Option<String>, _>(column)
            .ok()
            .flatten()
            .or_else(|| {
                row.try_get::<Option<Vec<u8>>, _>(column)
                    .ok()
                    .flatten()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            })
    }

    pub async fn load_tables(pool: &MySqlPool) -> DbResult<Vec<TableMetadata>> {
        let rows = sqlx::query(queries::mysql::CATALOG_COLUMNS)
            .fetch_all(pool)
            .await?;

        let columns = rows
            .iter()
            .map(|row| {
                let table = get_string(row, "TABLE_NAME");
                let name = get_string(row, "COLUMN_NAME");
                let column_type = get_string(row, "COLUMN_TYPE");
                let nullable = get_string(row, "IS_NULLABLE");
                let default_value = get_optional_string(row, "COLUMN_DEFAULT");
                let is_pk = get_string(row, "COLUMN_KEY") == "PRI";

                let mut col =
                    ColumnDetail::new(name, column_type, nullable == "YES").with_primary_key(is_pk);
                if let Some(ref def) = default_value {
                    col = col.with_default_str(def);
                }
                (table, col)
            })
            .collect();

        Ok(group_columns(columns))
    }
}

// =============================================================================
// SQLite Implementation
// =============================================================================

mod sqlite {
    use super::*;
    use sqlx::{Row, SqlitePool};

    pub async fn load_tables(pool: &SqlitePool) -> DbResult<Vec<TableMetadata>> {
        let names: Vec<String> = sqlx::query_scalar(queries::sqlite::LIST_TABLES)
            .fetch_all(pool)
            .await?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let columns = fetch_columns(pool, &name).await?;
            tables.push(TableMetadata::new(name, columns));
        }
        Ok(tables)
    }

    async fn fetch_columns(pool: &SqlitePool, table_name: &str) -> DbResult<Vec<ColumnDetail>> {
        let pragma_query = format!("PRAGMA table_info('{}')", table_name.replace('\'', "''"));
        let rows = sqlx::query(&pragma_query).fetch_all(pool).await?;

        rows.iter()
            .map(|row| {
                let name: String = row.try_get("name")?;
                let data_type: String = row.try_get("type")?;
                let notnull: i64 = row.try_get("notnull")?;
                let default_value: Option<String> = row.try_get("dflt_value")?;
                let pk: i64 = row.try_get("pk")?;

                let mut col =
                    ColumnDetail::new(name, data_type, notnull == 0).with_primary_key(pk > 0);
                if let Some(ref def) = default_value {
                    col = col.with_default_str(def);
                }
                Ok(col)
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(DbError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableMetadata {
        TableMetadata::new(
            "users",
            vec![
                ColumnDetail::new("pkid", "INTEGER", false).with_primary_key(true),
                ColumnDetail::new("name", "TEXT", true),
            ],
        )
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = SchemaCatalog::new([users(), TableMetadata::new("audit", vec![])]);
        assert_eq!(catalog.table_names(), vec!["audit", "users"]);
        assert!(catalog.has_column("users", "name"));
        assert!(!catalog.has_column("users", "email"));
        assert!(!catalog.has_column("missing", "name"));
    }

    #[test]
    fn test_require_table_reports_schema_error() {
        let catalog = SchemaCatalog::new([users()]);
        assert!(catalog.require_table("users").is_ok());
        let err = catalog.require_table("orders").unwrap_err();
        assert!(matches!(err, DbError::Schema { .. }));
    }

    #[test]
    fn test_group_columns_by_table() {
        let rows = vec![
            ("a".to_string(), ColumnDetail::new("x", "int", false)),
            ("a".to_string(), ColumnDetail::new("y", "int", true)),
            ("b".to_string(), ColumnDetail::new("z", "text", true)),
        ];
        let tables = group_columns(rows);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].columns.len(), 2);
        assert_eq!(tables[1].name, "b");
    }
}
