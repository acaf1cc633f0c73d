//! SQL builders for the write operations of the repository.
//!
//! Values are always bound as parameters; only identifiers are spliced into
//! the SQL text, quoted for the dialect. When the table is in the schema
//! catalog its declared column types shape the placeholders (see
//! [`typed_placeholder`]).

use crate::db::statement::{CompiledStatement, quote_identifier, typed_placeholder};
use crate::models::{DatabaseType, QueryParam, TableMetadata};
use serde_json::{Map as JsonMap, Value as JsonValue};

fn column_type<'a>(table: Option<&'a TableMetadata>, column: &str) -> Option<&'a str> {
    table.and_then(|t| t.column_type(column))
}

/// Build an INSERT for one record.
///
/// Null attributes are left out so column defaults apply. On PostgreSQL and
/// SQLite the primary key comes back through RETURNING.
pub fn insert_statement(
    table: &str,
    record: &JsonMap<String, JsonValue>,
    primary_key: &str,
    metadata: Option<&TableMetadata>,
    db_type: DatabaseType,
) -> CompiledStatement {
    let quoted_table = quote_identifier(table, db_type);
    let mut columns = Vec::with_capacity(record.len());
    let mut placeholders = Vec::with_capacity(record.len());
    let mut params = Vec::with_capacity(record.len());
    for (column, value) in record.iter().filter(|(_, value)| !value.is_null()) {
        params.push(QueryParam::from(value));
        columns.push(quote_identifier(column, db_type));
        placeholders.push(typed_placeholder(
            params.len(),
            column_type(metadata, column),
            db_type,
        ));
    }

    let mut sql = if columns.is_empty() {
        match db_type {
            DatabaseType::MySQL => format!("INSERT INTO {} () VALUES ()", quoted_table),
            DatabaseType::PostgreSQL | DatabaseType::SQLite => {
                format!("INSERT INTO {} DEFAULT VALUES", quoted_table)
            }
        }
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quoted_table,
            columns.join(", "),
            placeholders.join(", ")
        )
    };

    if db_type != DatabaseType::MySQL {
        sql.push_str(" RETURNING ");
        sql.push_str(&quote_identifier(primary_key, db_type));
    }

    CompiledStatement::raw(sql, params, db_type)
}

/// Build an UPDATE of `values` for the row whose `key_column` equals `key`.
pub fn update_statement(
    table: &str,
    values: &JsonMap<String, JsonValue>,
    key_column: &str,
    key: &QueryParam,
    metadata: Option<&TableMetadata>,
    db_type: DatabaseType,
) -> CompiledStatement {
    let mut params: Vec<QueryParam> = Vec::with_capacity(values.len() + 1);
    let assignments: Vec<String> = values
        .iter()
        .map(|(column, value)| {
            params.push(QueryParam::from(value));
            format!(
                "{} = {}",
                quote_identifier(column, db_type),
                typed_placeholder(params.len(), column_type(metadata, column), db_type)
            )
        })
        .collect();
    params.push(key.clone());

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quote_identifier(table, db_type),
        assignments.join(", "),
        quote_identifier(key_column, db_type),
        typed_placeholder(params.len(), column_type(metadata, key_column), db_type)
    );
    CompiledStatement::raw(sql, params, db_type)
}

/// Build a SELECT of the single row whose `key_column` equals `key`.
pub fn select_by_key_statement(
    table: &str,
    key_column: &str,
    key: &QueryParam,
    metadata: Option<&TableMetadata>,
    db_type: DatabaseType,
) -> CompiledStatement {
    let sql = format!(
        "SELECT * FROM {} WHERE {} = {} LIMIT 1",
        quote_identifier(table, db_type),
        quote_identifier(key_column, db_type),
        typed_placeholder(1, column_type(metadata, key_column), db_type)
    );
    CompiledStatement::raw(sql, vec![key.clone()], db_type)
}

/// Build a DELETE of every row whose `column` is one of `keys`.
pub fn delete_statement(
    table: &str,
    column: &str,
    keys: Vec<QueryParam>,
    metadata: Option<&TableMetadata>,
    db_type: DatabaseType,
) -> CompiledStatement {
    let ty = column_type(metadata, column);
    let condition = if keys.len() == 1 {
        format!(
            "{} = {}",
            quote_identifier(column, db_type),
            typed_placeholder(1, ty, db_type)
        )
    } else {
        let placeholders: Vec<String> = (1..=keys.len())
            .map(|n| typed_placeholder(n, ty, db_type))
            .collect();
        format!(
            "{} IN ({})",
            quote_identifier(column, db_type),
            placeholders.join(", ")
        )
    };
    let sql = format!(
        "DELETE FROM {} WHERE {}",
        quote_identifier(table, db_type),
        condition
    );
    CompiledStatement::raw(sql, keys, db_type)
}
