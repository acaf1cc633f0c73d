//! Statement execution.
//!
//! [`StatementRunner`] runs caller statements inside scoped sessions:
//! `execute_one` for a single statement, `execute_many` for an ordered batch
//! that commits once or not at all. Every failure leaves through the error
//! classifier.

use crate::db::classifier::classify;
use crate::db::pool::Engine;
use crate::db::session::ScopedSession;
use crate::db::shaper::{RawResult, shape_rows};
use crate::db::statement::{CompiledStatement, compile};
use crate::error::DbResult;
use crate::models::{BatchResult, DalResult, Statement, StatementMetadata, StatementResult};
use tracing::debug;

/// Runs statements against one engine.
#[derive(Debug, Clone)]
pub struct StatementRunner {
    engine: Engine,
}

impl StatementRunner {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Run one statement in its own session and commit.
    ///
    /// Row-returning statements yield shaped rows, or metadata wrapping them
    /// when `return_metadata` is set. Other statements always yield metadata.
    /// A multi-statement script without parameters runs in full and is shaped
    /// by its last statement.
    pub async fn execute_one(
        &self,
        statement: impl Into<Statement>,
        return_metadata: bool,
    ) -> DalResult<StatementResult> {
        self.try_execute_one(statement.into(), return_metadata)
            .await
            .map_err(|e| classify(&e))
    }

    /// Run statements in order inside one session.
    ///
    /// The batch commits once after the last statement. Any failure rolls the
    /// whole batch back. With `return_results` the per-statement results come
    /// back in input order, otherwise a success marker.
    pub async fn execute_many<I, S>(
        &self,
        statements: I,
        return_results: bool,
    ) -> DalResult<BatchResult>
    where
        I: IntoIterator<Item = S>,
        S: Into<Statement>,
    {
        let statements: Vec<Statement> = statements.into_iter().map(Into::into).collect();
        self.try_execute_many(&statements, return_results)
            .await
            .map_err(|e| classify(&e))
    }

    async fn try_execute_one(
        &self,
        statement: Statement,
        return_metadata: bool,
    ) -> DbResult<StatementResult> {
        let compiled = compile(&statement, self.engine.db_type())?;
        let mut session = self.engine.open_session().await?;
        let result = session.run(&compiled).await;
        let raw = session.finish(result).await?;
        Ok(to_statement_result(raw, return_metadata))
    }

    async fn try_execute_many(
        &self,
        statements: &[Statement],
        return_results: bool,
    ) -> DbResult<BatchResult> {
        // Compile everything up front so a malformed statement touches nothing.
        let compiled = statements
            .iter()
            .map(|s| compile(s, self.engine.db_type()))
            .collect::<DbResult<Vec<_>>>()?;

        debug!(count = compiled.len(), "Executing batch");

        let mut session = self.engine.open_session().await?;
        let result = run_batch(&mut session, &compiled, return_results).await;
        let results = session.finish(result).await?;

        Ok(if return_results {
            BatchResult::Results(results)
        } else {
            BatchResult::Completed
        })
    }
}

async fn run_batch(
    session: &mut ScopedSession,
    compiled: &[CompiledStatement],
    return_results: bool,
) -> DbResult<Vec<StatementResult>> {
    let mut results = Vec::with_capacity(if return_results { compiled.len() } else { 0 });
    for (index, stmt) in compiled.iter().enumerate() {
        let raw = session.run(stmt).await.inspect_err(|_| {
            debug!(index, "Batch statement failed, rolling back");
        })?;
        if return_results {
            results.push(to_statement_result(raw, false));
        }
    }
    Ok(results)
}

/// Shape a raw result into what the runner returns.
pub(crate) fn to_statement_result(raw: RawResult, return_metadata: bool) -> StatementResult {
    match raw {
        RawResult::Rows(rows) => {
            let shaped = shape_rows(rows);
            if return_metadata {
                StatementResult::Metadata(StatementMetadata {
                    rowcount: shaped.len() as u64,
                    inserted_key: None,
                    rows: Some(shaped),
                })
            } else {
                StatementResult::Rows(shaped)
            }
        }
        RawResult::Command(outcome) => StatementResult::Metadata(StatementMetadata {
            rowcount: outcome.rows_affected,
            inserted_key: outcome.inserted_key,
            rows: None,
        }),
    }
}
