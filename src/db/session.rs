//! Scoped sessions.
//!
//! A [`ScopedSession`] is one driver transaction held for one logical
//! operation. It is released on every exit path: [`ScopedSession::finish`]
//! commits on `Ok` and rolls back on `Err`, and a session dropped before it
//! finished rolls back when its connection returns to the pool.

use crate::db::params::{bind_mysql_param, bind_postgres_param, bind_sqlite_param};
use crate::db::pool::Engine;
use crate::db::shaper::{CommandOutcome, RawResult, RawRows, RowRepr};
use crate::db::statement::{CompiledStatement, StatementKind};
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use serde_json::Value as JsonValue;
use sqlx::{MySql, Postgres, Sqlite, Transaction};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Database-specific transaction.
enum DbTransaction {
    MySql(Transaction<'static, MySql>),
    Postgres(Transaction<'static, Postgres>),
    SQLite(Transaction<'static, Sqlite>),
}

impl DbTransaction {
    async fn commit(self) -> Result<(), sqlx::Error> {
        match self {
            DbTransaction::MySql(tx) => tx.commit().await,
            DbTransaction::Postgres(tx) => tx.commit().await,
            DbTransaction::SQLite(tx) => tx.commit().await,
        }
    }

    async fn rollback(self) -> Result<(), sqlx::Error> {
        match self {
            DbTransaction::MySql(tx) => tx.rollback().await,
            DbTransaction::Postgres(tx) => tx.rollback().await,
            DbTransaction::SQLite(tx) => tx.rollback().await,
        }
    }
}

impl Engine {
    /// Begin a transaction on a pooled connection.
    pub async fn open_session(&self) -> DbResult<ScopedSession> {
        let tx = impl_db_dispatch!(self.pool(), {
            MySql(p) => DbTransaction::MySql(p.begin().await?),
            Postgres(p) => DbTransaction::Postgres(p.begin().await?),
            SQLite(p) => DbTransaction::SQLite(p.begin().await?),
        });
        debug!(db_type = %self.db_type(), "Session opened");
        Ok(ScopedSession {
            tx: Some(tx),
            db_type: self.db_type(),
        })
    }
}

/// One transaction owned by one operation. Never shared.
pub struct ScopedSession {
    tx: Option<DbTransaction>,
    db_type: DatabaseType,
}

impl std::fmt::Debug for ScopedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedSession")
            .field("db_type", &self.db_type)
            .field("active", &self.tx.is_some())
            .finish()
    }
}

impl ScopedSession {
    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    /// Execute one compiled statement inside this transaction.
    ///
    /// Driver failures carry the statement text behind the statement marker.
    pub async fn run(&mut self, stmt: &CompiledStatement) -> DbResult<RawResult> {
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| DbError::internal("Session already finished"))?;

        debug!(
            dialect = %self.db_type,
            kind = ?stmt.kind,
            params = stmt.params.len(),
            "Executing statement"
        );

        let result = match tx {
            DbTransaction::MySql(tx) => mysql::run(tx, stmt).await,
            DbTransaction::Postgres(tx) => postgres::run(tx, stmt).await,
            DbTransaction::SQLite(tx) => sqlite::run(tx, stmt).await,
        };
        result.map_err(|e| DbError::statement(e, &stmt.sql))
    }

    /// Commit the transaction.
    pub async fn commit(mut self) -> DbResult<()> {
        match self.tx.take() {
            Some(tx) => {
                tx.commit().await?;
                debug!(db_type = %self.db_type, "Session committed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Roll back the transaction.
    pub async fn rollback(mut self) -> DbResult<()> {
        match self.tx.take() {
            Some(tx) => {
                tx.rollback().await?;
                debug!(db_type = %self.db_type, "Session rolled back");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Commit on `Ok`, roll back on `Err`, and hand `result` back.
    ///
    /// A failed commit replaces the value with the commit error. A failed
    /// rollback is logged and the original error is kept.
    pub async fn finish<T>(self, result: DbResult<T>) -> DbResult<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        if self.tx.is_some() {
            warn!(
                db_type = %self.db_type,
                "Session dropped without commit, rolling back"
            );
        }
    }
}

/// Convert driver rows into raw rows for the shaper.
///
/// Rows whose column names repeat have no faithful name-keyed form and are
/// kept as positional arrays.
fn to_raw_rows<R: RowToJson>(rows: &[R]) -> RawRows {
    let columns = rows.first().map(|r| r.column_names());
    let duplicated = columns.as_ref().is_some_and(|names| {
        let mut seen = HashSet::with_capacity(names.len());
        !names.iter().all(|n| seen.insert(n))
    });

    let rows = rows
        .iter()
        .map(|row| {
            if duplicated {
                RowRepr::Opaque(JsonValue::Array(row.to_json_values()))
            } else {
                RowRepr::Record(row.to_json_map())
            }
        })
        .collect();
    RawRows::new(columns, rows)
}

// =============================================================================
// Database-Specific Execution
// =============================================================================
//
// Statements without parameters go through the executor as plain text, which
// lets callers run multi-statement scripts. Parameterized statements are
// prepared and bound.

mod mysql {
    use super::*;
    use sqlx::Executor;

    pub async fn run(
        tx: &mut Transaction<'static, MySql>,
        stmt: &CompiledStatement,
    ) -> Result<RawResult, sqlx::Error> {
        if stmt.returns_rows() {
            let rows = if stmt.params.is_empty() {
                (&mut **tx).fetch_all(stmt.sql.as_str()).await?
            } else {
                let mut query = sqlx::query(&stmt.sql);
                for param in &stmt.params {
                    query = bind_mysql_param(query, param);
                }
                query.fetch_all(&mut **tx).await?
            };
            return Ok(RawResult::Rows(to_raw_rows(&rows)));
        }

        let result = if stmt.params.is_empty() {
            (&mut **tx).execute(stmt.sql.as_str()).await?
        } else {
            let mut query = sqlx::query(&stmt.sql);
            for param in &stmt.params {
                query = bind_mysql_param(query, param);
            }
            query.execute(&mut **tx).await?
        };

        // LAST_INSERT_ID() is 0 when the table has no auto-increment column.
        let inserted_key = (stmt.kind == StatementKind::Insert && result.last_insert_id() > 0)
            .then(|| JsonValue::from(result.last_insert_id()));
        Ok(RawResult::Command(CommandOutcome {
            rows_affected: result.rows_affected(),
            inserted_key,
        }))
    }
}

mod postgres {
    use super::*;
    use sqlx::Executor;

    pub async fn run(
        tx: &mut Transaction<'static, Postgres>,
        stmt: &CompiledStatement,
    ) -> Result<RawResult, sqlx::Error> {
        if stmt.returns_rows() {
            let rows = if stmt.params.is_empty() {
                (&mut **tx).fetch_all(stmt.sql.as_str()).await?
            } else {
                let mut query = sqlx::query(&stmt.sql);
                for param in &stmt.params {
                    query = bind_postgres_param(query, param);
                }
                query.fetch_all(&mut **tx).await?
            };
            return Ok(RawResult::Rows(to_raw_rows(&rows)));
        }

        let result = if stmt.params.is_empty() {
            (&mut **tx).execute(stmt.sql.as_str()).await?
        } else {
            let mut query = sqlx::query(&stmt.sql);
            for param in &stmt.params {
                query = bind_postgres_param(query, param);
            }
            query.execute(&mut **tx).await?
        };

        // PostgreSQL reports generated keys only through RETURNING.
        Ok(RawResult::Command(CommandOutcome {
            rows_affected: result.rows_affected(),
            inserted_key: None,
        }))
    }
}

mod sqlite {
    use super::*;
    use sqlx::Executor;

    pub async fn run(
        tx: &mut Transaction<'static, Sqlite>,
        stmt: &CompiledStatement,
    ) -> Result<RawResult, sqlx::Error> {
        if stmt.returns_rows() {
            let rows = if stmt.params.is_empty() {
                (&mut **tx).fetch_all(stmt.sql.as_str()).await?
            } else {
                let mut query = sqlx::query(&stmt.sql);
                for param in &stmt.params {
                    query = bind_sqlite_param(query, param);
                }
                query.fetch_all(&mut **tx).await?
            };
            return Ok(RawResult::Rows(to_raw_rows(&rows)));
        }

        let result = if stmt.params.is_empty() {
            (&mut **tx).execute(stmt.sql.as_str()).await?
        } else {
            let mut query = sqlx::query(&stmt.sql);
            for param in &stmt.params {
                query = bind_sqlite_param(query, param);
            }
            query.execute(&mut **tx).await?
        };

        // last_insert_rowid() is stale when the insert wrote nothing.
        let inserted_key = (stmt.kind == StatementKind::Insert && result.rows_affected() > 0)
            .then(|| JsonValue::from(result.last_insert_rowid()));
        Ok(RawResult::Command(CommandOutcome {
            rows_affected: result.rows_affected(),
            inserted_key,
        }))
    }
}
